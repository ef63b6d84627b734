use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::Waker,
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    config::Config,
    error::{SubmitError, WaitError},
    signal::Signal,
    state::{AtomicState, State},
    wait::Wait,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type Callback = Box<dyn FnOnce(State) + Send + 'static>;

/// What the worker left behind when it finished.
enum Outcome<T, E> {
    Completed(Result<T, E>),
    Panicked(String),
    Unspawned(String),
}

struct Slot<T, E> {
    outcome: Option<Outcome<T, E>>,
    callback: Option<Callback>,
}

pub(crate) struct Shared<T, E> {
    id: u64,
    config: Config,
    state: AtomicState,
    // fires on Running -> Finished and on Pending -> Cancelled; only one of
    // the two can ever happen, `state` tells which
    signal: Signal,
    slot: Mutex<Slot<T, E>>,
}

impl<T, E> Shared<T, E> {
    fn run<F>(&self, work: F)
    where
        F: FnOnce() -> Result<T, E>,
    {
        trace!(future.id = self.id, "worker started");
        let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(result) => Outcome::Completed(result),
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!(future.id = self.id, %message, "work panicked");
                Outcome::Panicked(message)
            }
        };
        self.finish(outcome);
    }

    /// Commits the outcome, then the state, then fires.
    fn finish(&self, outcome: Outcome<T, E>) {
        self.slot.lock().outcome = Some(outcome);
        let committed = self.state.transition(State::Running, State::Finished);
        debug_assert!(committed.is_ok(), "only the worker leaves running");
        self.settle(State::Finished);
    }

    /// Runs once per future, from whichever path won the terminal transition.
    fn settle(&self, terminal: State) {
        let fired = self.signal.fire();
        debug_assert!(fired, "future {} settled twice", self.id);
        debug!(future.id = self.id, state = %terminal, "future settled");
        self.run_callback(terminal);
    }

    fn run_callback(&self, terminal: State) {
        let callback = self.slot.lock().callback.take();
        if let Some(callback) = callback {
            trace!(future.id = self.id, "running completion callback");
            callback(terminal);
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.signal.is_fired()
    }

    pub(crate) fn poll_settled(&self, wait_key: &mut usize, waker: &Waker) -> bool {
        self.signal.poll_fired(wait_key, waker)
    }

    pub(crate) fn remove_waker(&self, wait_key: usize) {
        self.signal.remove_waker(wait_key)
    }

    #[cfg(test)]
    pub(crate) fn registered_wakers(&self) -> usize {
        self.signal.registered_wakers()
    }

    /// Reads the outcome of a settled future.
    pub(crate) fn resolve(&self) -> Result<Result<T, E>, WaitError>
    where
        T: Clone,
        E: Clone,
    {
        match self.state.load() {
            State::Cancelled => Err(WaitError::Cancelled),
            State::Finished => match &self.slot.lock().outcome {
                Some(Outcome::Completed(result)) => Ok(result.clone()),
                Some(Outcome::Panicked(message)) => Err(WaitError::Panicked(message.clone())),
                Some(Outcome::Unspawned(message)) => Err(WaitError::Spawn(message.clone())),
                None => unreachable!("future {} finished without an outcome", self.id),
            },
            state => unreachable!("future {} resolved while {state}", self.id),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The eventual result of work running on its own thread.
///
/// A future is created `Pending`, receives its work once through
/// [`submit`](Future::submit), and ends either `Finished` (the work
/// returned, successfully or not) or `Cancelled` (it was cancelled before the
/// work started). Handles are cheap to clone and all clones observe the same
/// future.
///
/// ```
/// use std::{thread, time::Duration};
/// use worker_future::Future;
///
/// let future: Future<&str, String> = Future::new();
/// future
///     .submit(|| {
///         thread::sleep(Duration::from_millis(10));
///         Ok("done")
///     })
///     .unwrap();
///
/// assert_eq!(future.get(), Ok(Ok("done")));
/// assert!(future.is_done());
/// ```
pub struct Future<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Future<T, E> {
    pub fn new() -> Self {
        Future::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(future.id = id, "future created");
        Future {
            shared: Arc::new(Shared {
                id,
                config,
                state: AtomicState::new(),
                signal: Signal::new(),
                slot: Mutex::new(Slot {
                    outcome: None,
                    callback: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn state(&self) -> State {
        self.shared.state.load()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == State::Cancelled
    }

    /// True once the future is either finished or cancelled.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Starts `work` on a new worker thread and returns without waiting.
    ///
    /// Work is accepted once. A future that was cancelled first never runs
    /// it and reports [`SubmitError::Cancelled`]; any later call reports
    /// [`SubmitError::AlreadySubmitted`].
    ///
    /// If `work` panics the future still finishes and readers get
    /// [`WaitError::Panicked`].
    pub fn submit<F>(&self, work: F) -> Result<(), SubmitError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let shared = &self.shared;
        if let Err(actual) = shared.state.transition(State::Pending, State::Running) {
            return Err(match actual {
                State::Cancelled => {
                    debug!(future.id = shared.id, "submit after cancel, work dropped");
                    SubmitError::Cancelled
                }
                state => {
                    warn!(future.id = shared.id, %state, "work submitted twice");
                    SubmitError::AlreadySubmitted
                }
            });
        }

        let config = &shared.config;
        let mut builder = thread::Builder::new().name(config.thread_name(shared.id));
        if config.stack_size() > 0 {
            builder = builder.stack_size(config.stack_size());
        }

        let worker = Arc::clone(shared);
        match builder.spawn(move || worker.run(work)) {
            Ok(_) => {
                debug!(future.id = shared.id, "work submitted");
                Ok(())
            }
            Err(err) => {
                warn!(future.id = shared.id, error = %err, "failed to spawn worker");
                shared.finish(Outcome::Unspawned(err.to_string()));
                Err(SubmitError::Spawn(err))
            }
        }
    }

    /// Cancels a future whose work has not started yet.
    ///
    /// Returns true if the future is cancelled after this call, whether this
    /// call or an earlier one did it. Work that is already running is never
    /// interrupted; cancelling it returns false.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        match shared.state.transition(State::Pending, State::Cancelled) {
            Ok(()) => {
                shared.settle(State::Cancelled);
                true
            }
            Err(State::Cancelled) => true,
            Err(state) => {
                trace!(future.id = shared.id, %state, "cancel refused");
                false
            }
        }
    }

    /// Registers the completion callback, replacing any earlier one that has
    /// not run yet.
    ///
    /// The callback runs once with the terminal state. If the future has
    /// already settled it runs right away, on the calling thread.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(State) + Send + 'static,
    {
        let shared = &self.shared;
        {
            let mut slot = shared.slot.lock();
            // settle() fires before it takes the callback: an occupied slot
            // after the fire will still be read, so the newest one goes there
            if !shared.is_settled() || slot.callback.is_some() {
                slot.callback = Some(Box::new(callback));
                return;
            }
        }
        callback(shared.state.load());
    }

    /// Waits for this future through `.await` instead of blocking a thread.
    pub fn wait(&self) -> Wait<T, E> {
        Wait::new(Arc::clone(&self.shared))
    }
}

impl<T: Clone, E: Clone> Future<T, E> {
    /// Blocks until the future settles.
    ///
    /// A finished future yields the work's own `Result`; a cancelled one
    /// yields [`WaitError::Cancelled`]. Every caller sees the same outcome.
    pub fn get(&self) -> Result<Result<T, E>, WaitError> {
        self.shared.signal.wait();
        self.shared.resolve()
    }

    /// Like [`get`](Future::get) but gives up after `timeout`.
    ///
    /// Timing out leaves the future untouched. A future that has already
    /// settled is reported even when `timeout` is zero.
    pub fn get_timeout(&self, timeout: Duration) -> Result<Result<T, E>, WaitError> {
        if self.shared.signal.wait_timeout(timeout) {
            self.shared.resolve()
        } else {
            trace!(future.id = self.shared.id, ?timeout, "wait timed out");
            Err(WaitError::Timeout(timeout))
        }
    }

    /// [`get_timeout`](Future::get_timeout) bounded by the configured
    /// default timeout.
    pub fn get_default_timeout(&self) -> Result<Result<T, E>, WaitError> {
        self.get_timeout(self.shared.config.default_timeout())
    }
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Default for Future<T, E> {
    fn default() -> Self {
        Future::new()
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}
