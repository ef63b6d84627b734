use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

/// Lifecycle of a [`Future`](crate::Future).
///
/// A future starts out `Pending` and moves either to `Running` and then
/// `Finished`, or straight to `Cancelled`. The last two are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    Pending,
    Running,
    Cancelled,
    Finished,
}

impl State {
    /// Returns true for `Cancelled` and `Finished`.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Cancelled | State::Finished)
    }

    fn into_raw(self) -> u8 {
        match self {
            State::Pending => 0,
            State::Running => 1,
            State::Cancelled => 2,
            State::Finished => 3,
        }
    }

    fn from_raw(raw: u8) -> State {
        match raw {
            0 => State::Pending,
            1 => State::Running,
            2 => State::Cancelled,
            3 => State::Finished,
            _ => unreachable!("invalid future state {raw}"),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Pending => "pending",
            State::Running => "running",
            State::Cancelled => "cancelled",
            State::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// State cell shared by the submitter, the worker and every reader.
///
/// All writes go through [`AtomicState::transition`], so two parties racing
/// out of `Pending` (submit vs. cancel) always produce exactly one winner.
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new() -> Self {
        AtomicState(AtomicU8::new(State::Pending.into_raw()))
    }

    pub(crate) fn load(&self) -> State {
        State::from_raw(self.0.load(Ordering::Acquire))
    }

    /// Moves from `from` to `to`, or returns the state that was actually
    /// observed when the swap lost.
    pub(crate) fn transition(&self, from: State, to: State) -> Result<(), State> {
        debug_assert!(!from.is_terminal(), "no transition leaves {from}");
        self.0
            .compare_exchange(
                from.into_raw(),
                to.into_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(State::from_raw)
    }
}

impl fmt::Debug for AtomicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicState").field(&self.load()).finish()
    }
}
