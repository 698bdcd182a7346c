//! Batching of physical commits.
//!
//! On a durable storage every outermost commit costs a sync. The batcher
//! keeps one physical transaction (the batch) open underneath the user's
//! work and commits it once a grace period passes without new updates.
//!
//! The machine only decides; arming the timer is left to the caller, which
//! receives the batch generation from [`Autocommit::enter`].

use crate::error::CoreResult;
use quarry_storage::Storage;
use tracing::trace;

/// Batcher states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// Batching is off; every call is a no-op.
    Disabled,
    /// No batch open.
    Idle,
    /// Batch open, work in progress, timer pending.
    Collecting,
    /// Batch open and idle, timer pending.
    IdleArmed,
    /// Batch reopened for work while its timer is still pending.
    CollectingArmed,
    /// Timer fired during work; commit when the work ends.
    CollectingTriggered,
}

#[derive(Debug)]
pub(crate) struct Autocommit {
    state: State,
    nest: usize,
    generation: u64,
}

impl Autocommit {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            state: if enabled { State::Idle } else { State::Disabled },
            nest: 0,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> State {
        self.state
    }

    /// Whether a batch transaction is currently open in the storage.
    pub(crate) fn is_open(&self) -> bool {
        !matches!(self.state, State::Disabled | State::Idle)
    }

    /// Work is about to start.
    ///
    /// Returns the generation of a newly opened batch; the caller must arm
    /// a timer that later calls [`Autocommit::timeout`] with it.
    pub(crate) fn enter(&mut self, store: &dyn Storage) -> CoreResult<Option<u64>> {
        let armed = match self.state {
            State::Disabled => return Ok(None),
            State::Idle => {
                store.begin_transaction()?;
                self.generation += 1;
                self.nest = 1;
                self.transition(State::Collecting);
                Some(self.generation)
            }
            State::IdleArmed => {
                self.nest = 1;
                self.transition(State::CollectingArmed);
                None
            }
            State::Collecting | State::CollectingArmed | State::CollectingTriggered => {
                self.nest += 1;
                None
            }
        };
        Ok(armed)
    }

    /// Work has ended.
    pub(crate) fn leave(&mut self, store: &dyn Storage) -> CoreResult<()> {
        match self.state {
            State::Collecting | State::CollectingArmed | State::CollectingTriggered => {
                self.nest = self.nest.saturating_sub(1);
                if self.nest > 0 {
                    return Ok(());
                }
                if self.state == State::CollectingTriggered {
                    self.transition(State::Idle);
                    store.commit()?;
                } else {
                    self.transition(State::IdleArmed);
                }
            }
            State::Disabled | State::Idle | State::IdleArmed => {}
        }
        Ok(())
    }

    /// The grace period of batch `generation` has elapsed.
    pub(crate) fn timeout(&mut self, generation: u64, store: &dyn Storage) -> CoreResult<()> {
        if generation != self.generation {
            return Ok(());
        }
        match self.state {
            State::Collecting | State::CollectingArmed => self.transition(State::CollectingTriggered),
            State::IdleArmed => {
                self.transition(State::Idle);
                store.commit()?;
            }
            State::Disabled | State::Idle | State::CollectingTriggered => {}
        }
        Ok(())
    }

    /// Commits an idle batch right away.
    pub(crate) fn flush(&mut self, store: &dyn Storage) -> CoreResult<()> {
        if self.state == State::IdleArmed {
            self.transition(State::Idle);
            store.commit()?;
        }
        Ok(())
    }

    fn transition(&mut self, to: State) {
        trace!(from = ?self.state, ?to, nest = self.nest, generation = self.generation, "autocommit");
        self.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_storage::MemoryStorage;

    #[test]
    fn disabled_is_a_no_op() {
        let store = MemoryStorage::new();
        let mut ac = Autocommit::new(false);
        assert_eq!(ac.enter(&store).unwrap(), None);
        ac.leave(&store).unwrap();
        ac.timeout(0, &store).unwrap();
        assert_eq!(ac.state(), State::Disabled);
        assert_eq!(store.nesting_level(), 0);
    }

    #[test]
    fn idle_gap_commits_on_timeout() {
        let store = MemoryStorage::new();
        let mut ac = Autocommit::new(true);
        let generation = ac.enter(&store).unwrap().unwrap();
        assert_eq!(store.nesting_level(), 1);
        ac.leave(&store).unwrap();
        assert_eq!(ac.state(), State::IdleArmed);
        assert_eq!(store.nesting_level(), 1);
        ac.timeout(generation, &store).unwrap();
        assert_eq!(ac.state(), State::Idle);
        assert_eq!(store.nesting_level(), 0);
    }

    #[test]
    fn back_to_back_work_shares_one_batch() {
        let store = MemoryStorage::new();
        let mut ac = Autocommit::new(true);
        let generation = ac.enter(&store).unwrap().unwrap();
        ac.leave(&store).unwrap();
        assert_eq!(ac.enter(&store).unwrap(), None);
        assert_eq!(ac.state(), State::CollectingArmed);
        ac.leave(&store).unwrap();
        assert_eq!(ac.state(), State::IdleArmed);
        assert_eq!(store.nesting_level(), 1);
        ac.timeout(generation, &store).unwrap();
        assert_eq!(store.nesting_level(), 0);
    }

    #[test]
    fn timeout_during_work_defers_commit() {
        let store = MemoryStorage::new();
        let mut ac = Autocommit::new(true);
        let generation = ac.enter(&store).unwrap().unwrap();
        ac.enter(&store).unwrap();
        ac.timeout(generation, &store).unwrap();
        assert_eq!(ac.state(), State::CollectingTriggered);
        ac.leave(&store).unwrap();
        assert_eq!(ac.state(), State::CollectingTriggered);
        assert_eq!(store.nesting_level(), 1);
        ac.leave(&store).unwrap();
        assert_eq!(ac.state(), State::Idle);
        assert_eq!(store.nesting_level(), 0);
    }

    #[test]
    fn stale_timer_is_ignored() {
        let store = MemoryStorage::new();
        let mut ac = Autocommit::new(true);
        let first = ac.enter(&store).unwrap().unwrap();
        ac.leave(&store).unwrap();
        ac.flush(&store).unwrap();
        let second = ac.enter(&store).unwrap().unwrap();
        assert_ne!(first, second);
        ac.leave(&store).unwrap();
        ac.timeout(first, &store).unwrap();
        assert_eq!(ac.state(), State::IdleArmed);
        ac.timeout(second, &store).unwrap();
        assert_eq!(ac.state(), State::Idle);
    }

    #[test]
    fn flush_only_commits_an_idle_batch() {
        let store = MemoryStorage::new();
        let mut ac = Autocommit::new(true);
        ac.enter(&store).unwrap();
        ac.flush(&store).unwrap();
        assert!(ac.is_open());
        ac.leave(&store).unwrap();
        ac.flush(&store).unwrap();
        assert!(!ac.is_open());
        assert_eq!(store.nesting_level(), 0);
    }
}
