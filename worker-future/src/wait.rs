use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::future::FusedFuture;

use crate::{error::WaitError, future::Shared, signal::WAIT_KEY_NONE};

/// Resolves to the same outcome as [`get`](crate::Future::get) without
/// blocking the polling thread.
///
/// Created by [`Future::wait`](crate::Future::wait).
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait<T, E> {
    // `None` once the outcome has been returned
    shared: Option<Arc<Shared<T, E>>>,
    wait_key: usize,
}

impl<T, E> Wait<T, E> {
    pub(crate) fn new(shared: Arc<Shared<T, E>>) -> Self {
        Wait {
            shared: Some(shared),
            wait_key: WAIT_KEY_NONE,
        }
    }
}

impl<T: Clone, E: Clone> Future for Wait<T, E> {
    type Output = Result<Result<T, E>, WaitError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let shared = match this.shared.as_ref() {
            Some(shared) => shared,
            None => panic!("Wait polled after completion"),
        };
        if !shared.poll_settled(&mut this.wait_key, cx.waker()) {
            return Poll::Pending;
        }
        let output = shared.resolve();
        this.shared = None;
        Poll::Ready(output)
    }
}

impl<T: Clone, E: Clone> FusedFuture for Wait<T, E> {
    fn is_terminated(&self) -> bool {
        self.shared.is_none()
    }
}

impl<T, E> Drop for Wait<T, E> {
    fn drop(&mut self) {
        // dropped before the future settled: give back the waker slot
        if let Some(shared) = self.shared.take() {
            shared.remove_waker(self.wait_key);
        }
    }
}

impl<T, E> fmt::Debug for Wait<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("terminated", &self.shared.is_none())
            .finish()
    }
}
