//! One-shot teardown signal
//!
//! Every node arms one of these at creation. The signal is satisfied
//! exactly once, after the node's release callback has run, and a
//! blocked `wait` observes it before returning.

use parking_lot::{Condvar, Mutex};

/// Teardown progress for a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Node is live; no destruction initiated
    Armed,
    /// Destruction initiated; outstanding handles may still exist
    Releasing,
    /// Release callback has run; storage is gone
    Complete,
}

/// One-shot synchronization primitive satisfied when a node's
/// destruction completes
///
/// Modeled as an explicit state machine rather than a bare counter so
/// the armed/releasing/complete transitions stay observable.
#[derive(Debug)]
pub struct Teardown {
    state: Mutex<State>,
    cvar: Condvar,
}

impl Teardown {
    /// Arm a fresh signal
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Armed),
            cvar: Condvar::new(),
        }
    }

    /// Mark destruction as initiated
    ///
    /// Idempotent; has no effect once the signal is complete.
    pub fn begin_release(&self) {
        let mut state = self.state.lock();
        if *state == State::Armed {
            *state = State::Releasing;
        }
    }

    /// Satisfy the signal
    ///
    /// Called exactly once, strictly after the owning node's release
    /// callback has run. Wakes every waiter.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        debug_assert_ne!(*state, State::Complete, "teardown completed twice");
        *state = State::Complete;
        self.cvar.notify_all();
    }

    /// True once destruction has been initiated
    #[must_use]
    pub fn is_releasing(&self) -> bool {
        *self.state.lock() != State::Armed
    }

    /// True once the signal has been satisfied
    #[must_use]
    pub fn is_complete(&self) -> bool {
        *self.state.lock() == State::Complete
    }

    /// Block the calling thread until the signal is satisfied
    ///
    /// Unbounded wait; destruction cannot be cancelled once initiated.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while *state != State::Complete {
            self.cvar.wait(&mut state);
        }
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_states_progress() {
        let td = Teardown::new();
        assert!(!td.is_releasing());
        assert!(!td.is_complete());

        td.begin_release();
        assert!(td.is_releasing());
        assert!(!td.is_complete());

        td.complete();
        assert!(td.is_complete());
        td.wait(); // already satisfied, returns immediately
    }

    #[test]
    fn test_wait_blocks_until_complete() {
        let td = Arc::new(Teardown::new());
        let signaller = Arc::clone(&td);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            signaller.begin_release();
            signaller.complete();
        });

        td.wait();
        assert!(td.is_complete());
        handle.join().unwrap();
    }
}
