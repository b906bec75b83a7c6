//! Wire codec, data model, and metadata Merkle tree for the asset layer.
//!
//! This crate is the "chain" layer: it knows how to turn a `Packet` into
//! bytes and back, how to find and frame a marker output, and how to hash a
//! metadata map into a Merkle commitment. It has no notion of a running
//! indexer state — that lives in `arkasset-state`, built on top of these
//! types.

pub mod codec;
pub mod compactsize;
pub mod hash;
pub mod merkle;
pub mod model;
pub mod script;
pub mod wire;

pub use codec::{build_marker_output_script, decode_packet, encode_packet, parse_marker_output};
pub use compactsize::CompactSize;
pub use model::{AssetId, AssetInput, AssetOutput, AssetRef, Group, Issuance, MetadataMap, Packet, Txid};
pub use wire::{CodecError, WireDecode, WireEncode};
