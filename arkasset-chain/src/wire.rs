//! Low-level wire primitives shared by the packet codec.
//!
//! This module plays the same role `zebra_chain::serialization` plays for
//! Zcash transactions: a pair of traits (`WireEncode`/`WireDecode`) with
//! blanket implementations for the primitive types the packet format is
//! built out of, plus extension points (`Vec<T>`, fixed-size arrays,
//! `String`, tuples) that downstream modules reuse instead of hand-rolling
//! loops.

mod error;

pub use error::CodecError;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io;

use crate::compactsize::CompactSize;

type Result<R> = std::result::Result<R, CodecError>;

/// Converts a value into its canonical wire representation.
pub trait WireEncode {
    fn wire_encode<W: io::Write>(&self, target: W) -> std::result::Result<(), io::Error>;

    fn wire_encode_to_vec(&self) -> std::result::Result<Vec<u8>, io::Error> {
        let mut buf = Vec::new();
        self.wire_encode(&mut buf)?;
        Ok(buf)
    }
}

/// Parses a value out of its canonical wire representation.
pub trait WireDecode {
    fn wire_decode<R: io::Read>(reader: R) -> Result<Self>
    where
        Self: Sized;
}

/// Reads `buf.len()` bytes, turning a short read into `CodecError::Truncated`
/// instead of letting `io::ErrorKind::UnexpectedEof` escape as an opaque I/O
/// error — decoding must reject buffers that end mid-field.
fn read_exact<R: io::Read>(mut reader: R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CodecError::Truncated,
        _ => CodecError::Io(e),
    })
}

impl WireEncode for u8 {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        target.write_all(&[*self])
    }
}

impl WireDecode for u8 {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<u8> {
        let mut buf = [0u8; 1];
        read_exact(&mut reader, &mut buf)?;
        Ok(buf[0])
    }
}

impl WireEncode for u16 {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl WireDecode for u16 {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<u16> {
        reader.read_u16::<LittleEndian>().map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(e),
        })
    }
}

impl WireEncode for u64 {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl WireDecode for u64 {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<u64> {
        reader.read_u64::<LittleEndian>().map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(e),
        })
    }
}

impl WireEncode for u32 {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl WireDecode for u32 {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<u32> {
        reader.read_u32::<LittleEndian>().map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CodecError::Truncated,
            _ => CodecError::Io(e),
        })
    }
}

/// A CompactSize-prefixed, UTF-8 byte string.
impl WireEncode for str {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        CompactSize::from(self.len()).wire_encode(&mut target)?;
        target.write_all(self.as_bytes())
    }
}

impl WireEncode for String {
    fn wire_encode<W: io::Write>(&self, target: W) -> std::result::Result<(), io::Error> {
        self.as_str().wire_encode(target)
    }
}

/// Preallocation is capped so a maliciously large length prefix can't be
/// used to force a large up-front allocation before the bytes themselves
/// have even been read.
const BLIND_ALLOC_LIMIT: usize = 1024;

impl WireDecode for String {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<String> {
        let len = CompactSize::wire_decode(&mut reader)?.value() as usize;
        let mut buf = vec![0u8; std::cmp::min(len, BLIND_ALLOC_LIMIT)];
        let mut remaining = len;
        let mut out = Vec::with_capacity(std::cmp::min(len, BLIND_ALLOC_LIMIT));
        while remaining > 0 {
            let chunk = std::cmp::min(remaining, buf.len());
            read_exact(&mut reader, &mut buf[..chunk])?;
            out.extend_from_slice(&buf[..chunk]);
            remaining -= chunk;
        }
        String::from_utf8(out).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        CompactSize::from(self.len()).wire_encode(&mut target)?;
        for item in self.iter() {
            item.wire_encode(&mut target)?;
        }
        Ok(())
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<Vec<T>> {
        let len = CompactSize::wire_decode(&mut reader)?.value() as usize;
        let mut result = Vec::with_capacity(std::cmp::min(len, BLIND_ALLOC_LIMIT));
        for _ in 0..len {
            result.push(T::wire_decode(&mut reader)?);
        }
        Ok(result)
    }
}

impl<T: WireEncode, U: WireEncode> WireEncode for (T, U) {
    fn wire_encode<W: io::Write>(&self, mut target: W) -> std::result::Result<(), io::Error> {
        self.0.wire_encode(&mut target)?;
        self.1.wire_encode(&mut target)
    }
}

impl<T: WireDecode, U: WireDecode> WireDecode for (T, U) {
    fn wire_decode<R: io::Read>(mut reader: R) -> Result<(T, U)> {
        Ok((T::wire_decode(&mut reader)?, U::wire_decode(&mut reader)?))
    }
}

macro_rules! impl_byte_array {
    ($size:expr) => {
        impl WireEncode for [u8; $size] {
            fn wire_encode<W: io::Write>(
                &self,
                mut target: W,
            ) -> std::result::Result<(), io::Error> {
                target.write_all(&self[..])
            }
        }

        impl WireDecode for [u8; $size] {
            fn wire_decode<R: io::Read>(mut reader: R) -> Result<[u8; $size]> {
                let mut buf = [0u8; $size];
                read_exact(&mut reader, &mut buf)?;
                Ok(buf)
            }
        }
    };
}

impl_byte_array!(4);
impl_byte_array!(32);
