//! The single-writer gate.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    writer: bool,
    readers: usize,
}

/// Readers/writer lock whose write side is not tied to a guard.
///
/// A write transaction acquires the gate at its outermost BEGIN and
/// releases it at the COMMIT or ROLLBACK that closes it, which may happen
/// in a different call or on a different thread. A pending writer blocks
/// new readers.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate is exclusively held by the caller.
    pub(crate) fn acquire_write(&self) {
        let mut state = self.state.lock();
        while state.writer {
            self.changed.wait(&mut state);
        }
        state.writer = true;
        while state.readers > 0 {
            self.changed.wait(&mut state);
        }
    }

    pub(crate) fn release_write(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        self.changed.notify_all();
    }

    /// Blocks while a writer holds or waits for the gate.
    pub(crate) fn read(&self) -> ReadGuard<'_> {
        let mut state = self.state.lock();
        while state.writer {
            self.changed.wait(&mut state);
        }
        state.readers += 1;
        ReadGuard { gate: self }
    }
}

/// Shared hold on a [`Gate`], released on drop.
#[derive(Debug)]
pub(crate) struct ReadGuard<'a> {
    gate: &'a Gate,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.gate.changed.notify_all();
        }
    }
}
