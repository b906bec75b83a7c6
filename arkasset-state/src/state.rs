//! The indexer's state: per-asset control/metadata records, per-outpoint
//! asset balances, transaction bookkeeping, and the chain height the state
//! reflects.

use arkasset_chain::{AssetId, MetadataMap, Txid};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::tx::Tx;

/// A reference to one of a transaction's outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Outpoint {
    pub txid: Txid,
    pub vout: u32,
}

impl Outpoint {
    pub const fn new(txid: Txid, vout: u32) -> Outpoint {
        Outpoint { txid, vout }
    }
}

/// The control/metadata record for one asset. Created on first issuance,
/// never deleted — supply can be burned to zero without erasing the asset's
/// identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AssetRecord {
    pub control_asset: Option<AssetId>,
    pub metadata: MetadataMap,
    pub immutable: bool,
}

/// The non-zero asset balances attached to one unspent output. Never stored
/// empty — an outpoint with no remaining balances simply has no entry in
/// `State::utxos`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UtxoBalance(BTreeMap<AssetId, u64>);

impl UtxoBalance {
    pub fn new() -> UtxoBalance {
        UtxoBalance(BTreeMap::new())
    }

    pub fn get(&self, asset: &AssetId) -> Option<u64> {
        self.0.get(asset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &u64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds `amt` to the balance of `asset`, inserting it if absent.
    /// `amt` must be non-zero; the caller is responsible for enforcing that
    /// (the indexer rejects zero-amount inputs/outputs before this is ever
    /// called).
    pub fn credit(&mut self, asset: AssetId, amt: u64) {
        *self.0.entry(asset).or_insert(0) += amt;
    }

    /// Removes `asset` entirely, returning its stored balance if any.
    pub fn take(&mut self, asset: &AssetId) -> Option<u64> {
        self.0.remove(asset)
    }
}

/// Whether a recorded transaction has been confirmed in a block or is only
/// tentatively accepted into the mempool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TxStatus {
    Mempool,
    Confirmed,
}

/// Bookkeeping for one transaction the indexer has seen, confirmed or not.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxRecord {
    pub tx: Tx,
    pub status: TxStatus,
    pub processed_at: DateTime<Utc>,
}

/// The indexer's full state at one block height.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct State {
    pub assets: HashMap<AssetId, AssetRecord>,
    pub utxos: HashMap<Outpoint, UtxoBalance>,
    pub transactions: HashMap<Txid, TxRecord>,
    pub block_height: i64,
}

impl Default for State {
    /// The pre-genesis state (see [`State::genesis`]).
    fn default() -> State {
        State::genesis()
    }
}

impl State {
    /// The pre-genesis state: no assets, no balances, no transactions,
    /// height -1.
    pub fn genesis() -> State {
        State {
            assets: HashMap::new(),
            utxos: HashMap::new(),
            transactions: HashMap::new(),
            block_height: -1,
        }
    }

    /// Every amount in `utxos` is checked to be strictly positive and every
    /// `UtxoBalance` non-empty; every `control_asset` and every asset key
    /// appearing in `utxos` points at a stored `AssetRecord`. Intended for
    /// tests and debugging, not the hot apply path.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (outpoint, balance) in &self.utxos {
            if balance.is_empty() {
                return Err(format!("empty UtxoBalance stored at {outpoint:?}"));
            }
            for (asset, amt) in balance.iter() {
                if *amt == 0 {
                    return Err(format!("zero amount for {asset:?} at {outpoint:?}"));
                }
                if !self.assets.contains_key(asset) {
                    return Err(format!("{asset:?} has a balance but no AssetRecord"));
                }
            }
        }
        for (asset, record) in &self.assets {
            if let Some(control) = record.control_asset {
                if !self.assets.contains_key(&control) {
                    return Err(format!(
                        "{asset:?} has a dangling control_asset {control:?}"
                    ));
                }
            }
        }
        Ok(())
    }
}
