//! Storage abstraction the indexer drives through a `load`/`save`/`delete`
//! contract keyed by block height.
//!
//! Mirrors the synchronous-write half of `zebra_state`'s `FinalizedState`:
//! callers hold a mutable handle and call ordinary synchronous methods,
//! rather than going through an async `tower::Service`, since the indexer
//! itself has no network or scheduling concerns (the validator/indexer is
//! explicitly single-threaded; see SPEC_FULL.md's concurrency section).

use crate::state::State;

/// A snapshot store for indexer state, one snapshot per block height.
///
/// `state()`/`state_mut()` expose the current in-memory view; `load` swaps
/// that view for a persisted snapshot (initializing to `State::genesis()`
/// if none exists yet); `save` persists the current view; `delete` removes
/// a persisted snapshot (used by rollback once its replacement is saved).
pub trait SnapshotStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn state(&self) -> &State;
    fn state_mut(&mut self) -> &mut State;

    /// Loads the snapshot at `height`, or the latest persisted snapshot if
    /// `height` is `None`. If no snapshot exists at all, the current view
    /// becomes `State::genesis()`.
    fn load(&mut self, height: Option<i64>) -> Result<(), Self::Error>;

    /// Persists the current view under `height`, first setting
    /// `state_mut().block_height = height`.
    fn save(&mut self, height: i64) -> Result<(), Self::Error>;

    /// Removes the persisted snapshot at `height`, if any.
    fn delete(&mut self, height: i64) -> Result<(), Self::Error>;
}

/// An in-process store keeping every snapshot it has ever been asked to
/// save. Used by default and by tests; does not survive process restart.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    current: State,
    by_height: std::collections::BTreeMap<i64, State>,
}

impl MemorySnapshotStore {
    pub fn new() -> MemorySnapshotStore {
        MemorySnapshotStore {
            current: State::genesis(),
            by_height: std::collections::BTreeMap::new(),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    type Error = std::convert::Infallible;

    fn state(&self) -> &State {
        &self.current
    }

    fn state_mut(&mut self) -> &mut State {
        &mut self.current
    }

    fn load(&mut self, height: Option<i64>) -> Result<(), Self::Error> {
        let snapshot = match height {
            Some(h) => self.by_height.get(&h).cloned(),
            None => self.by_height.values().next_back().cloned(),
        };
        self.current = snapshot.unwrap_or_else(State::genesis);
        Ok(())
    }

    fn save(&mut self, height: i64) -> Result<(), Self::Error> {
        self.current.block_height = height;
        self.by_height.insert(height, self.current.clone());
        Ok(())
    }

    fn delete(&mut self, height: i64) -> Result<(), Self::Error> {
        self.by_height.remove(&height);
        Ok(())
    }
}

#[cfg(feature = "sled")]
pub mod sled_store;
