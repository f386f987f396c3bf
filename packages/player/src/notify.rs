//! A one-shot binary latch: `signal` collapses repeated signals into
//! one pending wake, `wait` blocks until signaled then clears it.
//!
//! Specialized down from the teacher's `ResourceDaemon`/`DaemonState`
//! pattern (a `Mutex` + `Condvar` guarding a small state enum) to a
//! plain two-state latch, since the worker/controller handshake needs
//! no daemon lifecycle, just "wake up and check `command` again".

use std::sync::{Condvar, Mutex};

#[derive(Default)]
pub struct Notify {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl Notify {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a wake as pending and wakes any waiter. Multiple signals
    /// before a `wait` collapse into a single wake.
    ///
    /// # Panics
    ///
    /// * If the internal mutex is poisoned.
    pub fn signal(&self) {
        let mut pending = self.pending.lock().unwrap();
        *pending = true;
        self.condvar.notify_one();
    }

    /// Blocks until signaled, then clears the pending flag.
    ///
    /// # Panics
    ///
    /// * If the internal mutex is poisoned.
    pub fn wait(&self) {
        let mut pending = self.pending.lock().unwrap();
        while !*pending {
            pending = self.condvar.wait(pending).unwrap();
        }
        *pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::Notify;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn repeated_signals_collapse_to_one_wake() {
        let notify = Notify::new();
        notify.signal();
        notify.signal();
        notify.signal();
        notify.wait();
        // the second wait would block forever if signals leaked through;
        // use a worker thread with a timeout to prove it doesn't.
        let notify = Arc::new(notify);
        let waiter = notify.clone();
        let handle = std::thread::spawn(move || waiter.wait());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        notify.signal();
        handle.join().unwrap();
    }

    #[test]
    fn wait_blocks_until_signal() {
        let notify = Arc::new(Notify::new());
        let waiter = notify.clone();
        let handle = std::thread::spawn(move || waiter.wait());
        std::thread::sleep(Duration::from_millis(20));
        assert!(!handle.is_finished());
        notify.signal();
        handle.join().unwrap();
    }
}
