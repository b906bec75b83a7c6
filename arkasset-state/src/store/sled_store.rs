//! A `sled`-backed `SnapshotStore`, for indexers that need their state to
//! survive a process restart. One key per block height, big-endian encoded
//! so `sled`'s lexicographic iteration order matches height order.

use thiserror::Error;

use crate::state::State;
use crate::store::SnapshotStore;

#[derive(Error, Debug)]
pub enum SledStoreError {
    #[error("sled database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("failed to (de)serialize a state snapshot: {0}")]
    Bincode(#[from] bincode::Error),
}

fn height_key(height: i64) -> [u8; 8] {
    height.to_be_bytes()
}

/// A `sled` database holding one serialized `State` snapshot per block
/// height, plus the current in-memory view `load`/`save` operate on.
pub struct SledSnapshotStore {
    tree: sled::Tree,
    current: State,
}

impl SledSnapshotStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<SledSnapshotStore, SledStoreError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(b"arkasset_state_snapshots")?;
        Ok(SledSnapshotStore {
            tree,
            current: State::genesis(),
        })
    }
}

impl SnapshotStore for SledSnapshotStore {
    type Error = SledStoreError;

    fn state(&self) -> &State {
        &self.current
    }

    fn state_mut(&mut self) -> &mut State {
        &mut self.current
    }

    fn load(&mut self, height: Option<i64>) -> Result<(), Self::Error> {
        let stored = match height {
            Some(h) => self.tree.get(height_key(h))?,
            None => self.tree.iter().values().next_back().transpose()?,
        };
        self.current = match stored {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => State::genesis(),
        };
        Ok(())
    }

    fn save(&mut self, height: i64) -> Result<(), Self::Error> {
        self.current.block_height = height;
        let bytes = bincode::serialize(&self.current)?;
        self.tree.insert(height_key(height), bytes)?;
        self.tree.flush()?;
        Ok(())
    }

    fn delete(&mut self, height: i64) -> Result<(), Self::Error> {
        self.tree.remove(height_key(height))?;
        self.tree.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sled_store_round_trips_a_snapshot() {
        let dir = tempdir::TempDir::new("arkasset-sled-store-test").unwrap();
        let mut store = SledSnapshotStore::open(dir.path()).unwrap();
        store.load(None).unwrap();
        assert_eq!(store.state().block_height, -1);

        store.state_mut().block_height = 7;
        store.save(7).unwrap();

        store.load(Some(7)).unwrap();
        assert_eq!(store.state().block_height, 7);
    }

    #[test]
    fn sled_store_load_none_returns_latest() {
        let dir = tempdir::TempDir::new("arkasset-sled-store-test-2").unwrap();
        let mut store = SledSnapshotStore::open(dir.path()).unwrap();
        store.save(0).unwrap();
        store.save(1).unwrap();

        store.load(None).unwrap();
        assert_eq!(store.state().block_height, 1);
    }
}
