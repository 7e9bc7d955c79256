//! Change notification between the engine's owner and its listeners.
//!
//! The engine itself never watches files; an external watcher calls
//! [`ChangeBroadcast::notify`] and front-end threads block in
//! [`ChangeBroadcast::wait`] until a fresh generation (or shutdown)
//! arrives. A generation counter makes wakeups idempotent: a listener
//! passes the last generation it saw and only returns on a newer one.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct State {
    generation: u64,
    stopped: bool,
}

/// A generation counter with a condition variable.
#[derive(Debug, Default)]
pub struct ChangeBroadcast {
    state: Mutex<State>,
    cond: Condvar,
}

impl ChangeBroadcast {
    pub fn new() -> Self {
        ChangeBroadcast::default()
    }

    /// The current generation; listeners pass this to [`wait`](Self::wait).
    pub fn generation(&self) -> u64 {
        self.state.lock().expect("broadcast lock poisoned").generation
    }

    /// Publish a change: bump the generation and wake all listeners.
    pub fn notify(&self) {
        let mut state = self.state.lock().expect("broadcast lock poisoned");
        state.generation += 1;
        self.cond.notify_all();
    }

    /// Shut down: wake everyone with `None` forever after.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("broadcast lock poisoned");
        state.stopped = true;
        self.cond.notify_all();
    }

    /// Block until the generation exceeds `seen`, returning the new value,
    /// or `None` once stopped.
    pub fn wait(&self, seen: u64) -> Option<u64> {
        let mut state = self.state.lock().expect("broadcast lock poisoned");
        loop {
            if state.stopped {
                return None;
            }
            if state.generation > seen {
                return Some(state.generation);
            }
            state = self.cond.wait(state).expect("broadcast lock poisoned");
        }
    }
}
