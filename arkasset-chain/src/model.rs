//! The asset-layer data model: the types a `Packet` is built out of.
//!
//! Mirrors the role `zebra_chain::transparent`/`zebra_chain::transaction`
//! play for Zcash's transparent value pool, but for asset balances layered
//! on top of a host chain's own UTXO set rather than the UTXOs themselves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use arkasset_wire_derive::{WireDecode, WireEncode};
use crate::wire::{WireDecode, WireEncode};
use crate::CodecError;

/// A 32-byte host-chain transaction id, as given on the wire (no byte-order
/// reversal, unlike `Display`/`FromStr` below).
pub type Txid = [u8; 32];

/// Uniquely names an asset: its genesis transaction and the index of the
/// group inside that transaction that minted it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, WireEncode, WireDecode)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct AssetId {
    pub txid: Txid,
    pub gidx: u16,
}

impl AssetId {
    pub const fn new(txid: Txid, gidx: u16) -> AssetId {
        AssetId { txid, gidx }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Following the u256 display convention `zebra_chain::block::Hash`
        // uses: the wire order is as-given, but humans read txids reversed.
        let mut reversed = self.txid;
        reversed.reverse();
        write!(f, "{}:{}", hex::encode(reversed), self.gidx)
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AssetId({})", self)
    }
}

impl FromStr for AssetId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid_hex, gidx_str) = s.split_once(':').ok_or(CodecError::InvalidUtf8)?;
        let mut txid = [0u8; 32];
        hex::decode_to_slice(txid_hex, &mut txid).map_err(|_| CodecError::InvalidUtf8)?;
        txid.reverse();
        let gidx = gidx_str.parse().map_err(|_| CodecError::InvalidUtf8)?;
        Ok(AssetId { txid, gidx })
    }
}

/// A reference to an asset, either explicit or relative to the current
/// transaction's own packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub enum AssetRef {
    /// An external reference to an asset's genesis.
    ById(AssetId),
    /// A forward/back reference to another group of the current packet,
    /// resolved to a concrete `AssetId` at apply time.
    ByGroup(u16),
}

impl WireEncode for AssetRef {
    fn wire_encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            AssetRef::ById(id) => {
                0x01u8.wire_encode(&mut target)?;
                id.wire_encode(&mut target)
            }
            AssetRef::ByGroup(gidx) => {
                0x02u8.wire_encode(&mut target)?;
                gidx.wire_encode(&mut target)
            }
        }
    }
}

impl WireDecode for AssetRef {
    fn wire_decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        match u8::wire_decode(&mut reader)? {
            0x01 => Ok(AssetRef::ById(AssetId::wire_decode(&mut reader)?)),
            0x02 => Ok(AssetRef::ByGroup(u16::wire_decode(&mut reader)?)),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

/// An unordered `string -> string` map. Wire order is insertion order;
/// hashing (`arkasset_chain::merkle`) sorts by key first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMap(IndexMap<String, String>);

impl MetadataMap {
    pub fn new() -> MetadataMap {
        MetadataMap(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Entries sorted lexicographically by key, the order the metadata
    /// Merkle tree hashes them in.
    pub fn sorted_entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .0
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl FromIterator<(String, String)> for MetadataMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        MetadataMap(IndexMap::from_iter(iter))
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for MetadataMap {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<MetadataMap>;

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        proptest::collection::vec(("[a-z]{1,8}", "[a-z]{0,8}"), 0..4)
            .prop_map(|entries| MetadataMap(IndexMap::from_iter(entries)))
            .boxed()
    }
}

impl WireEncode for MetadataMap {
    fn wire_encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        crate::compactsize::CompactSize::from(self.0.len()).wire_encode(&mut target)?;
        for (key, value) in self.0.iter() {
            key.wire_encode(&mut target)?;
            value.wire_encode(&mut target)?;
        }
        Ok(())
    }
}

impl WireDecode for MetadataMap {
    fn wire_decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        let count = crate::compactsize::CompactSize::wire_decode(&mut reader)?.value() as usize;
        let mut map = IndexMap::with_capacity(std::cmp::min(count, 1024));
        for _ in 0..count {
            let key = String::wire_decode(&mut reader)?;
            let value = String::wire_decode(&mut reader)?;
            map.insert(key, value);
        }
        Ok(MetadataMap(map))
    }
}

/// Present only in a genesis group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct Issuance {
    pub control_asset: Option<AssetRef>,
    pub metadata: Option<MetadataMap>,
    pub immutable: bool,
}

impl WireEncode for Issuance {
    fn wire_encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        let presence = (self.control_asset.is_some() as u8)
            | ((self.metadata.is_some() as u8) << 1)
            | ((self.immutable as u8) << 2);
        presence.wire_encode(&mut target)?;
        if let Some(control_asset) = &self.control_asset {
            control_asset.wire_encode(&mut target)?;
        }
        if let Some(metadata) = &self.metadata {
            metadata.wire_encode(&mut target)?;
        }
        Ok(())
    }
}

impl WireDecode for Issuance {
    fn wire_decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        let presence = u8::wire_decode(&mut reader)?;
        if presence & !0b111 != 0 {
            return Err(CodecError::ReservedBits);
        }
        let control_asset = if presence & 0b001 != 0 {
            Some(AssetRef::wire_decode(&mut reader)?)
        } else {
            None
        };
        let metadata = if presence & 0b010 != 0 {
            Some(MetadataMap::wire_decode(&mut reader)?)
        } else {
            None
        };
        let immutable = presence & 0b100 != 0;
        Ok(Issuance {
            control_asset,
            metadata,
            immutable,
        })
    }
}

/// A movement of one asset's balance from this transaction's inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub enum AssetInput {
    /// Consumes `amt` of this group's asset from `tx.vin[i]`.
    Local { i: u16, amt: u64 },
}

impl AssetInput {
    pub fn amt(&self) -> u64 {
        match self {
            AssetInput::Local { amt, .. } => *amt,
        }
    }
}

const INPUT_TAG_LOCAL: u8 = 0x01;

impl WireEncode for AssetInput {
    fn wire_encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            AssetInput::Local { i, amt } => {
                INPUT_TAG_LOCAL.wire_encode(&mut target)?;
                i.wire_encode(&mut target)?;
                crate::compactsize::CompactSize::new(*amt).wire_encode(&mut target)
            }
        }
    }
}

impl WireDecode for AssetInput {
    fn wire_decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        match u8::wire_decode(&mut reader)? {
            INPUT_TAG_LOCAL => {
                let i = u16::wire_decode(&mut reader)?;
                let amt = crate::compactsize::CompactSize::wire_decode(&mut reader)?.value();
                Ok(AssetInput::Local { i, amt })
            }
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

/// A credit of one asset's balance to this transaction's outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub enum AssetOutput {
    /// Credits `amt` to `tx.vout[o]`.
    Local { o: u16, amt: u64 },
}

impl AssetOutput {
    pub fn amt(&self) -> u64 {
        match self {
            AssetOutput::Local { amt, .. } => *amt,
        }
    }
}

const OUTPUT_TAG_LOCAL: u8 = 0x01;

impl WireEncode for AssetOutput {
    fn wire_encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        match self {
            AssetOutput::Local { o, amt } => {
                OUTPUT_TAG_LOCAL.wire_encode(&mut target)?;
                o.wire_encode(&mut target)?;
                crate::compactsize::CompactSize::new(*amt).wire_encode(&mut target)
            }
        }
    }
}

impl WireDecode for AssetOutput {
    fn wire_decode<R: std::io::Read>(mut reader: R) -> Result<Self, CodecError> {
        match u8::wire_decode(&mut reader)? {
            OUTPUT_TAG_LOCAL => {
                let o = u16::wire_decode(&mut reader)?;
                let amt = crate::compactsize::CompactSize::wire_decode(&mut reader)?.value();
                Ok(AssetOutput::Local { o, amt })
            }
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

/// A per-asset movement record within a packet. Exactly one of `asset_id`
/// being present distinguishes a transfer/reissuance of an existing asset
/// from a genesis group (which omits it).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct Group {
    pub asset_id: Option<AssetId>,
    pub issuance: Option<Issuance>,
    /// Present on a group for an existing asset to mean "update metadata".
    pub metadata: Option<MetadataMap>,
    #[cfg_attr(any(test, feature = "proptest-impl"), proptest(strategy = "proptest::collection::vec(proptest::arbitrary::any::<AssetInput>(), 0..4)"))]
    pub inputs: Vec<AssetInput>,
    #[cfg_attr(any(test, feature = "proptest-impl"), proptest(strategy = "proptest::collection::vec(proptest::arbitrary::any::<AssetOutput>(), 0..4)"))]
    pub outputs: Vec<AssetOutput>,
}

impl Group {
    /// `true` if this group omits `asset_id` and therefore defines a new
    /// asset whose id is `(tx.txid, group_index)`.
    pub fn is_genesis(&self) -> bool {
        self.asset_id.is_none()
    }
}

/// An ordered list of groups. Order matters: a group's index is the
/// `ByGroup` forward-reference namespace for every other group in the same
/// packet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest-impl"), derive(proptest_derive::Arbitrary))]
pub struct Packet {
    #[cfg_attr(any(test, feature = "proptest-impl"), proptest(strategy = "proptest::collection::vec(proptest::arbitrary::any::<Group>(), 0..4)"))]
    pub groups: Vec<Group>,
}

impl Packet {
    pub fn new(groups: Vec<Group>) -> Packet {
        Packet { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
