use std::{io, time::Duration};

use thiserror::Error;

/// Why a result could not be read from a future.
///
/// The work function's own error is never turned into a `WaitError`; it is
/// handed back untouched inside the inner `Result`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    #[error("timed out after {0:?} waiting for the future")]
    Timeout(Duration),
    #[error("future was cancelled")]
    Cancelled,
    #[error("work panicked: {0}")]
    Panicked(String),
    #[error("worker thread could not be spawned: {0}")]
    Spawn(String),
}

impl WaitError {
    /// A timeout only ends the call that hit it; the future itself may still
    /// resolve, so waiting again can succeed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("work was already submitted to this future")]
    AlreadySubmitted,
    #[error("future was cancelled before work was submitted")]
    Cancelled,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}
