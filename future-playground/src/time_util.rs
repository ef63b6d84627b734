use time::OffsetDateTime;

pub fn get_epoch_ms() -> u128 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u128
}
