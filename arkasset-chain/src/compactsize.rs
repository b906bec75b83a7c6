//! The CompactSize varint used throughout the packet wire format.
use crate::wire::{WireDecode, WireEncode};
use crate::CodecError;
use byteorder::{LittleEndian, WriteBytesExt};

/// A Bitcoin-style variable-length integer: one byte for values below
/// `0xfd`, and an `0xfd`/`0xfe`/`0xff` prefix followed by a 2/4/8-byte
/// little-endian value otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompactSize(u64);

impl CompactSize {
    pub fn new(value: u64) -> CompactSize {
        CompactSize(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The number of bytes `value` would occupy on the wire.
    pub fn size(value: u64) -> usize {
        if value < 0xfd {
            1
        } else if value <= u16::MAX as u64 {
            3
        } else if value <= u32::MAX as u64 {
            5
        } else {
            9
        }
    }
}

impl From<usize> for CompactSize {
    fn from(value: usize) -> CompactSize {
        CompactSize(value as u64)
    }
}

impl From<CompactSize> for u64 {
    fn from(value: CompactSize) -> u64 {
        value.0
    }
}

impl WireEncode for CompactSize {
    fn wire_encode<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        if self.0 < 0xfd {
            target.write_all(&[self.0 as u8])
        } else if self.0 <= u16::MAX as u64 {
            target.write_all(&[0xfd])?;
            target.write_u16::<LittleEndian>(self.0 as u16)
        } else if self.0 <= u32::MAX as u64 {
            target.write_all(&[0xfe])?;
            target.write_u32::<LittleEndian>(self.0 as u32)
        } else {
            target.write_all(&[0xff])?;
            target.write_u64::<LittleEndian>(self.0)
        }
    }
}

impl WireDecode for CompactSize {
    fn wire_decode<R: std::io::Read>(mut target: R) -> Result<CompactSize, CodecError> {
        let first = u8::wire_decode(&mut target)?;
        let value = if first < 0xfd {
            first as u64
        } else if first == 0xfd {
            u16::wire_decode(&mut target)? as u64
        } else if first == 0xfe {
            u32::wire_decode(&mut target)? as u64
        } else {
            u64::wire_decode(&mut target)?
        };
        Ok(CompactSize(value))
    }
}
