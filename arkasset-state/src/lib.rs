//! The validator/indexer: a state machine over `State` driven by
//! transactions and blocks, plus the storage abstraction it commits through.
//!
//! Built on top of `arkasset_chain`'s codec and data model; this crate adds
//! no wire format of its own beyond the host-supplied transaction/block view
//! in [`tx`].

pub mod block;
pub mod error;
pub mod indexer;
pub mod mempool;
pub mod state;
pub mod store;
pub mod tx;

pub use block::{apply_block, rollback_last_block};
pub use error::IndexerError;
pub use indexer::apply_tx;
pub use mempool::{apply_to_mempool, get_speculative_state};
pub use state::{AssetRecord, Outpoint, State, TxRecord, TxStatus, UtxoBalance};
pub use store::{MemorySnapshotStore, SnapshotStore};
pub use tx::{Block, Tx, TxIn, TxOut};

#[cfg(feature = "sled")]
pub use store::sled_store::{SledSnapshotStore, SledStoreError};
