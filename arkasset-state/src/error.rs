//! Failure taxonomy for transaction and block application.
//!
//! Every rejection the indexer can produce is represented here rather than
//! as a bare `String`, so a host node can match on the failure kind (to
//! decide whether to relay a transaction, log it, or drop a peer) instead of
//! parsing messages.

use arkasset_chain::{AssetId, CodecError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexerError {
    // --- structural ---
    /// a `Local` input or output index is out of bounds for this transaction's `vin`/`vout`
    #[error("a Local input or output index is out of bounds for this transaction's vin/vout")]
    OutputIndexOutOfBounds,

    /// an input or output amount was zero
    #[error("an input or output amount was zero")]
    ZeroAmount,

    /// a group's issuance.control_asset references itself by group index
    #[error("a group's issuance.control_asset references itself by group index")]
    SelfReferentialControl,

    /// a `ByGroup` reference does not resolve to a group in this packet
    #[error("a ByGroup reference does not resolve to a group in this packet")]
    MissingGroupRef,

    /// {0:?} is touched by more than one group in this transaction
    #[error("{0:?} is touched by more than one group in this transaction")]
    DuplicateAssetInTx(AssetId),

    // --- conservation ---
    /// an input UTXO carrying {0:?} was only partially consumed
    #[error("an input UTXO carrying {0:?} was only partially consumed")]
    PartialInputConsumption(AssetId),

    /// an input claims more of {0:?} than the spent outpoint actually carries
    #[error("an input claims more of {0:?} than the spent outpoint actually carries")]
    InputExceedsStored(AssetId),

    // --- authorization ---
    /// {0:?} was minted or reissued without its control asset being spent with delta zero in the same transaction
    #[error("{0:?} was minted or reissued without its control asset being spent with delta zero in the same transaction")]
    MintWithoutControl(AssetId),

    /// {0:?}'s control asset was spent but not returned with an unchanged balance
    #[error("{0:?}'s control asset was spent but not returned with an unchanged balance")]
    ControlNotRetained(AssetId),

    /// {0:?}'s metadata was updated without spending its control asset
    #[error("{0:?}'s metadata was updated without spending its control asset")]
    MetadataUpdateUnauthorized(AssetId),

    /// {0:?} is immutable; its metadata cannot be updated
    #[error("{0:?} is immutable; its metadata cannot be updated")]
    MetadataUpdateOnImmutable(AssetId),

    // --- block ---
    /// block height {given} does not immediately follow the current height {expected}
    #[error("block height {given} does not immediately follow the current height {expected}")]
    HeightGap { expected: i64, given: i64 },

    /// the block's transactions contain an input/output dependency cycle
    #[error("the block's transactions contain an input/output dependency cycle")]
    DependencyCycle,

    // --- storage ---
    /// no snapshot exists at the requested height
    #[error("no snapshot exists at the requested height")]
    SnapshotMissing,

    /// a storage backend operation failed: {0}
    #[error("a storage backend operation failed: {0}")]
    Store(String),

    /// the marker's 0x00 TLV record failed to decode: {0}
    #[error("the marker's 0x00 TLV record failed to decode: {0}")]
    Codec(#[from] CodecError),
}

impl From<std::convert::Infallible> for IndexerError {
    fn from(e: std::convert::Infallible) -> Self {
        match e {}
    }
}

#[cfg(feature = "sled")]
impl From<crate::store::sled_store::SledStoreError> for IndexerError {
    fn from(e: crate::store::sled_store::SledStoreError) -> Self {
        IndexerError::Store(e.to_string())
    }
}
