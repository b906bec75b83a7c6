//! The host-supplied transaction/block view the indexer is driven by.
//!
//! Decoding a raw transaction, following its signature chain, and scanning
//! the base chain are the embedding node's job (spec.md §1's external
//! collaborators); by the time a `Tx` reaches this crate, its `vin`/`vout`
//! have already been resolved out of the host chain's own representation.

use arkasset_chain::Txid;
use serde::{Deserialize, Serialize};

/// A reference to a previous transaction's output, as consumed by `vin`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxIn {
    pub txid: Txid,
    pub vout: u32,
}

/// One of a transaction's own outputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub n: u32,
    #[serde(with = "hex_bytes")]
    pub script_pubkey: Vec<u8>,
}

/// The transaction view the indexer validates and applies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub txid: Txid,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
}

/// A block of transactions at a given height, as handed to `apply_block`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub transactions: Vec<Tx>,
}

/// Serializes script bytes as a hex string for interchange formats (JSON
/// snapshot documents, test fixtures) instead of a raw byte array.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
