//! A future backed by its own worker thread.
//!
//! [`Future`] holds the eventual outcome of a piece of work. The work is
//! handed over once with [`Future::submit`] and runs on a fresh thread while
//! any number of readers wait for it with [`Future::get`],
//! [`Future::get_timeout`] or `.await` on [`Future::wait`]. Work that has not
//! started can be cancelled, and a single completion callback can be attached
//! with [`Future::on_complete`].
//!
//! ```
//! use std::time::Duration;
//! use worker_future::{Future, State, WaitError};
//!
//! let future: Future<u64, String> = Future::new();
//! assert!(future.cancel());
//! assert!(future.submit(|| Ok(42)).is_err());
//!
//! assert_eq!(future.state(), State::Cancelled);
//! assert_eq!(future.get_timeout(Duration::ZERO), Err(WaitError::Cancelled));
//! ```

mod config;
mod error;
mod future;
mod signal;
mod state;
mod wait;

pub use crate::{
    config::{Builder, Config},
    error::{SubmitError, WaitError},
    future::Future,
    state::State,
    wait::Wait,
};
