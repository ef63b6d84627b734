mod time_util;

use std::{
    error::Error,
    future::Future as StdFuture,
    pin::Pin,
    sync::mpsc,
    task::{Context, Poll},
    thread,
    time::Duration,
};

use futures::{executor::block_on, future::join};
use rand::Rng;
use time_util::get_epoch_ms;
use tracing::info;
use tracing_subscriber::EnvFilter;
use worker_future::{Builder, Future, State, WaitError};

type PlaygroundResult = Result<(), Box<dyn Error>>;

/// Reports how long the wrapped future took to resolve.
struct TimedWrapper<Fut>
where
    Fut: StdFuture,
{
    fut: Pin<Box<Fut>>,
    start_time: u128,
}

impl<Fut> TimedWrapper<Fut>
where
    Fut: StdFuture,
{
    pub fn new(fut: Fut) -> Self {
        TimedWrapper {
            fut: Box::pin(fut),
            start_time: get_epoch_ms(),
        }
    }
}

impl<Fut> StdFuture for TimedWrapper<Fut>
where
    Fut: StdFuture,
{
    type Output = (Fut::Output, u128);

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let start_time = self.start_time;
        match self.fut.as_mut().poll(cx) {
            Poll::Ready(output) => Poll::Ready((output, get_epoch_ms() - start_time)),
            Poll::Pending => Poll::Pending,
        }
    }
}

fn sleepy_work(millis: u64, label: &'static str) -> impl FnOnce() -> Result<String, String> {
    move || {
        thread::sleep(Duration::from_millis(millis));
        Ok(format!("{label} after {millis}ms"))
    }
}

fn blocking_get() -> PlaygroundResult {
    let future = Future::new();
    future.submit(sleepy_work(1000, "done"))?;

    let start = get_epoch_ms();
    let outcome = future.get()?;
    info!(?outcome, elapsed_ms = get_epoch_ms() - start, "get returned");
    Ok(())
}

fn timeout_then_success() -> PlaygroundResult {
    let future = Future::new();
    future.submit(sleepy_work(1000, "slow"))?;

    match future.get_timeout(Duration::from_millis(100)) {
        Err(WaitError::Timeout(after)) => {
            info!(?after, done = future.is_done(), "first wait timed out")
        }
        other => info!(?other, "first wait resolved early"),
    }
    let outcome = future.get_timeout(Duration::from_secs(5))?;
    info!(?outcome, "second wait resolved");
    Ok(())
}

fn cancel_before_submit() -> PlaygroundResult {
    let future: Future<String, String> = Future::new();
    future.on_complete(|state| info!(%state, "callback fired"));

    info!(cancelled = future.cancel(), "cancel requested");
    if let Err(err) = future.submit(sleepy_work(10, "never")) {
        info!(%err, "submit refused");
    }
    info!(outcome = ?future.get(), "get after cancel");
    Ok(())
}

fn cancel_while_running() -> PlaygroundResult {
    let (started_tx, started_rx) = mpsc::channel();
    let future = Future::new();
    future.submit(move || {
        let _ = started_tx.send(());
        sleepy_work(300, "unstoppable")()
    })?;
    started_rx.recv()?;

    info!(cancelled = future.cancel(), state = %future.state(), "cancel while running");
    let outcome = future.get()?;
    info!(?outcome, "running work still finished");
    Ok(())
}

fn concurrent_readers() -> PlaygroundResult {
    let future = Future::new();
    let millis = rand::thread_rng().gen_range(100..400);
    future.submit(sleepy_work(millis, "shared"))?;

    let readers: Vec<_> = (0..4)
        .map(|reader| {
            let future = future.clone();
            thread::spawn(move || (reader, future.get()))
        })
        .collect();
    for handle in readers {
        if let Ok((reader, outcome)) = handle.join() {
            info!(reader, ?outcome, "reader resolved");
        }
    }
    Ok(())
}

fn failing_work() -> PlaygroundResult {
    let future: Future<u32, String> = Future::new();
    future.on_complete(|state| info!(%state, "failing work settled"));
    future.submit(|| Err("connection refused".to_string()))?;

    match future.get()? {
        Ok(value) => info!(value, "unexpected success"),
        Err(err) => info!(%err, state = %future.state(), "work reported an error"),
    }
    debug_assert_eq!(future.state(), State::Finished);
    Ok(())
}

async fn awaited() -> PlaygroundResult {
    let fast = Builder::new().name_prefix("awaited-").create();
    let slow = Builder::new().name_prefix("awaited-").create();
    fast.submit(sleepy_work(200, "fast"))?;
    slow.submit(sleepy_work(500, "slow"))?;

    let ((fast_outcome, fast_ms), (slow_outcome, slow_ms)) = join(
        TimedWrapper::new(fast.wait()),
        TimedWrapper::new(slow.wait()),
    )
    .await;
    let (fast_outcome, slow_outcome) = (fast_outcome?, slow_outcome?);
    info!(outcome = ?fast_outcome, elapsed_ms = fast_ms, "fast await resolved");
    info!(outcome = ?slow_outcome, elapsed_ms = slow_ms, "slow await resolved");
    Ok(())
}

fn main() -> PlaygroundResult {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    blocking_get()?;
    timeout_then_success()?;
    cancel_before_submit()?;
    cancel_while_running()?;
    concurrent_readers()?;
    failing_work()?;
    block_on(awaited())?;
    Ok(())
}
