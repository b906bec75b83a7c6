use std::io;
use thiserror::Error;

/// The codec's structured rejection reasons (spec.md §4.1/§7). Shared by the
/// wire primitives, the data model's per-field decoders, and the top-level
/// packet/TLV framing — there's a single failure taxonomy for "this byte
/// string is not a valid packet", not one per layer.
#[derive(Error, Debug)]
pub enum CodecError {
    /// io error that prevented decoding
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// the buffer ended before a field could be fully read
    #[error("truncated buffer")]
    Truncated,
    /// the marker push-data did not begin with the `ARK` magic
    #[error("bad magic")]
    BadMagic,
    /// a presence bitfield had a reserved bit set
    #[error("reserved bits set")]
    ReservedBits,
    /// a length-prefixed string was not valid UTF-8
    #[error("invalid utf-8")]
    InvalidUtf8,
    /// an unrecognized type tag was encountered where only a closed set is
    /// accepted (TLV record type, asset-ref tag, input/output kind)
    #[error("unknown type tag: {0:#04x}")]
    UnknownTag(u8),
    /// a CompactSize amount did not fit the range the caller required
    #[error("amount overflow")]
    AmountOverflow,
}
