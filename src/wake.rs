//! A single-slot wake primitive with drop-if-already-signaled semantics.
//!
//! This is not a counting semaphore: a second signal arriving before the
//! first is consumed is dropped, not queued. Callers must re-check the
//! condition they are waiting on after waking, since a signal only means
//! "something may have changed," not "the thing you want happened."

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub(crate) struct WakeSlot {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl WakeSlot {
    pub(crate) fn new() -> WakeSlot {
        WakeSlot {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Fills the slot if empty; drops the signal if already full.
    pub(crate) fn signal(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        if !*signaled {
            *signaled = true;
            self.condvar.notify_one();
        }
    }

    /// Blocks until signaled, consuming the signal.
    pub(crate) fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        while !*signaled {
            signaled = self.condvar.wait(signaled).unwrap();
        }
        *signaled = false;
    }

    /// Blocks until signaled or `deadline` passes. Returns `true` if
    /// signaled, `false` on timeout.
    pub(crate) fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut signaled = self.signaled.lock().unwrap();
        loop {
            if *signaled {
                *signaled = false;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, result) = self
                .condvar
                .wait_timeout(signaled, deadline - now)
                .unwrap();
            signaled = guard;
            if *signaled {
                *signaled = false;
                return true;
            }
            if result.timed_out() {
                return false;
            }
        }
    }
}

/// Blocks until signaled, or `timeout` elapses if provided. Returns `true`
/// if signaled.
pub(crate) fn wait_with_optional_timeout(slot: &WakeSlot, timeout: Option<Duration>) -> bool {
    match timeout {
        None => {
            slot.wait();
            true
        }
        Some(timeout) => slot.wait_deadline(Instant::now() + timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn signal_before_wait_is_observed() {
        let slot = WakeSlot::new();
        slot.signal();
        slot.wait();
    }

    #[test]
    fn second_signal_while_full_is_dropped_not_queued() {
        let slot = WakeSlot::new();
        slot.signal();
        slot.signal();
        slot.wait();
        assert!(!slot.wait_deadline(Instant::now() + Duration::from_millis(20)));
    }

    #[test]
    fn wait_deadline_times_out_without_signal() {
        let slot = WakeSlot::new();
        let start = Instant::now();
        let woke = slot.wait_deadline(start + Duration::from_millis(20));
        assert!(!woke);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn cross_thread_signal_wakes_waiter() {
        let slot = Arc::new(WakeSlot::new());
        let other = Arc::clone(&slot);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            other.signal();
        });
        assert!(slot.wait_deadline(Instant::now() + Duration::from_secs(2)));
        handle.join().unwrap();
    }
}
