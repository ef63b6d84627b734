use std::{task::Waker, time::Duration};

use parking_lot::{Condvar, Mutex};
use slab::Slab;

// Sentinel for a waiter that has no slot in the `Slab` yet.
pub(crate) const WAIT_KEY_NONE: usize = usize::MAX;

struct Waiters {
    fired: bool,
    // async waiters; blocking waiters park on the condvar instead
    wakers: Slab<Waker>,
}

/// One-shot broadcast: fires once and stays fired, waking every blocked
/// thread and every registered task.
pub(crate) struct Signal {
    waiters: Mutex<Waiters>,
    condvar: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Signal {
            waiters: Mutex::new(Waiters {
                fired: false,
                wakers: Slab::new(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Fires the signal. Returns false if it had already fired.
    pub(crate) fn fire(&self) -> bool {
        let wakers = {
            let mut waiters = self.waiters.lock();
            if waiters.fired {
                return false;
            }
            waiters.fired = true;
            std::mem::take(&mut waiters.wakers)
        };
        self.condvar.notify_all();
        for (_, waker) in wakers {
            waker.wake();
        }
        true
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.waiters.lock().fired
    }

    /// Blocks until the signal fires.
    pub(crate) fn wait(&self) {
        let mut waiters = self.waiters.lock();
        self.condvar.wait_while(&mut waiters, |w| !w.fired);
    }

    /// Blocks until the signal fires or `timeout` elapses, returning whether
    /// it fired. The fired flag is checked before the clock, so a signal that
    /// already fired is reported even for a zero timeout.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut waiters = self.waiters.lock();
        self.condvar.wait_while_for(&mut waiters, |w| !w.fired, timeout);
        waiters.fired
    }

    /// Returns true if fired, otherwise arranges for `waker` to be woken
    /// when it does. `wait_key` starts as [`WAIT_KEY_NONE`] and is the
    /// caller's slot from then on.
    pub(crate) fn poll_fired(&self, wait_key: &mut usize, waker: &Waker) -> bool {
        let mut waiters = self.waiters.lock();
        if waiters.fired {
            return true;
        }
        if *wait_key == WAIT_KEY_NONE {
            *wait_key = waiters.wakers.insert(waker.clone());
        } else if let Some(existing) = waiters.wakers.get_mut(*wait_key) {
            if !existing.will_wake(waker) {
                *existing = waker.clone();
            }
        }
        false
    }

    /// Drops the waker a waiter registered, for waiters that give up before
    /// the signal fires.
    pub(crate) fn remove_waker(&self, wait_key: usize) {
        if wait_key == WAIT_KEY_NONE {
            return;
        }
        let mut waiters = self.waiters.lock();
        // firing empties the slab and nothing registers afterwards, so a
        // stale key can only miss
        if !waiters.fired {
            waiters.wakers.try_remove(wait_key);
        }
    }

    #[cfg(test)]
    pub(crate) fn registered_wakers(&self) -> usize {
        self.waiters.lock().wakers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::{waker, ArcWake};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Instant,
    };

    struct CountingWaker(AtomicUsize);

    impl ArcWake for CountingWaker {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fires_once() {
        let signal = Signal::new();
        assert!(!signal.is_fired());
        assert!(signal.fire());
        assert!(!signal.fire());
        assert!(signal.is_fired());
    }

    #[test]
    fn wakes_every_blocked_thread() {
        let signal = Arc::new(Signal::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        signal.fire();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn zero_timeout_sees_fired_signal() {
        let signal = Signal::new();
        assert!(!signal.wait_timeout(Duration::ZERO));
        signal.fire();
        assert!(signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn timeout_elapses_without_fire() {
        let signal = Signal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn registered_waker_is_woken_once() {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let task_waker = waker(counter.clone());
        let signal = Signal::new();
        let mut wait_key = WAIT_KEY_NONE;

        assert!(!signal.poll_fired(&mut wait_key, &task_waker));
        // re-polling keeps the same slot
        assert!(!signal.poll_fired(&mut wait_key, &task_waker));
        assert_eq!(signal.registered_wakers(), 1);
        signal.fire();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(signal.registered_wakers(), 0);

        assert!(signal.poll_fired(&mut wait_key, &task_waker));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        signal.remove_waker(wait_key);
    }

    #[test]
    fn removed_waker_is_not_woken() {
        let kept = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let dropped = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let signal = Signal::new();
        let (mut kept_key, mut dropped_key) = (WAIT_KEY_NONE, WAIT_KEY_NONE);

        assert!(!signal.poll_fired(&mut kept_key, &waker(kept.clone())));
        assert!(!signal.poll_fired(&mut dropped_key, &waker(dropped.clone())));
        assert_eq!(signal.registered_wakers(), 2);

        signal.remove_waker(dropped_key);
        assert_eq!(signal.registered_wakers(), 1);
        signal.remove_waker(WAIT_KEY_NONE);
        assert_eq!(signal.registered_wakers(), 1);

        signal.fire();
        assert_eq!(kept.0.load(Ordering::SeqCst), 1);
        assert_eq!(dropped.0.load(Ordering::SeqCst), 0);
    }
}
