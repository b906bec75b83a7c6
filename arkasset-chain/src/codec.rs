//! Encodes/decodes a `Packet` to and from the bytes carried inside a marker
//! output's push-data, and locates that push-data inside a transaction's
//! outputs.

use crate::compactsize::CompactSize;
use crate::model::{AssetId, Group, Packet};
use crate::script;
use crate::wire::{WireDecode, WireEncode};
use crate::CodecError;
use std::io;

/// `"ARK"`.
const MAGIC: [u8; 3] = [0x41, 0x52, 0x4b];

/// The TLV record type whose payload is the asset packet itself; it carries
/// no length prefix because it consumes the rest of the push-data.
const TLV_TYPE_SELF_DELIMITING: u8 = 0x00;

/// Encodes `packet` as the bytes of a marker output's push-data: magic,
/// followed by the self-delimiting `0x00` TLV record containing the packet
/// body.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, io::Error> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.push(TLV_TYPE_SELF_DELIMITING);
    encode_packet_body(packet, &mut out)?;
    Ok(out)
}

fn encode_packet_body<W: io::Write>(packet: &Packet, mut target: W) -> Result<(), io::Error> {
    CompactSize::from(packet.groups.len()).wire_encode(&mut target)?;
    for group in &packet.groups {
        encode_group(group, &mut target)?;
    }
    Ok(())
}

fn encode_group<W: io::Write>(group: &Group, mut target: W) -> Result<(), io::Error> {
    let presence = (group.asset_id.is_some() as u8)
        | ((group.issuance.is_some() as u8) << 1)
        | ((group.metadata.is_some() as u8) << 2);
    presence.wire_encode(&mut target)?;
    if let Some(asset_id) = &group.asset_id {
        asset_id.wire_encode(&mut target)?;
    }
    if let Some(issuance) = &group.issuance {
        issuance.wire_encode(&mut target)?;
    }
    if let Some(metadata) = &group.metadata {
        metadata.wire_encode(&mut target)?;
    }
    encode_counts(group.inputs.len(), group.outputs.len(), &mut target)?;
    for input in &group.inputs {
        input.wire_encode(&mut target)?;
    }
    for output in &group.outputs {
        output.wire_encode(&mut target)?;
    }
    Ok(())
}

/// `(15, 15)` can't be packed into the single nibble-pair byte without
/// colliding with the `0xFF` escape, so it (and anything larger) always
/// takes the escape form. `(15, 14)` is the largest pair that still fits.
const ESCAPE: u8 = 0xFF;

fn encode_counts<W: io::Write>(
    in_count: usize,
    out_count: usize,
    mut target: W,
) -> Result<(), io::Error> {
    if in_count <= 15 && out_count <= 15 && !(in_count == 15 && out_count == 15) {
        let byte = ((in_count as u8) << 4) | (out_count as u8);
        byte.wire_encode(&mut target)
    } else {
        ESCAPE.wire_encode(&mut target)?;
        CompactSize::from(in_count).wire_encode(&mut target)?;
        CompactSize::from(out_count).wire_encode(&mut target)
    }
}

fn decode_counts<R: io::Read>(mut reader: R) -> Result<(usize, usize), CodecError> {
    let byte = u8::wire_decode(&mut reader)?;
    if byte == ESCAPE {
        let in_count = CompactSize::wire_decode(&mut reader)?.value() as usize;
        let out_count = CompactSize::wire_decode(&mut reader)?.value() as usize;
        Ok((in_count, out_count))
    } else {
        Ok(((byte >> 4) as usize, (byte & 0x0f) as usize))
    }
}

fn decode_group<R: io::Read>(mut reader: R) -> Result<Group, CodecError> {
    let presence = u8::wire_decode(&mut reader)?;
    if presence & !0b111 != 0 {
        return Err(CodecError::ReservedBits);
    }
    let asset_id = if presence & 0b001 != 0 {
        Some(AssetId::wire_decode(&mut reader)?)
    } else {
        None
    };
    let issuance = if presence & 0b010 != 0 {
        Some(crate::model::Issuance::wire_decode(&mut reader)?)
    } else {
        None
    };
    let metadata = if presence & 0b100 != 0 {
        Some(crate::model::MetadataMap::wire_decode(&mut reader)?)
    } else {
        None
    };
    let (in_count, out_count) = decode_counts(&mut reader)?;
    let mut inputs = Vec::with_capacity(std::cmp::min(in_count, 1024));
    for _ in 0..in_count {
        inputs.push(crate::model::AssetInput::wire_decode(&mut reader)?);
    }
    let mut outputs = Vec::with_capacity(std::cmp::min(out_count, 1024));
    for _ in 0..out_count {
        outputs.push(crate::model::AssetOutput::wire_decode(&mut reader)?);
    }
    Ok(Group {
        asset_id,
        issuance,
        metadata,
        inputs,
        outputs,
    })
}

fn decode_packet_body<R: io::Read>(mut reader: R) -> Result<Packet, CodecError> {
    let group_count = CompactSize::wire_decode(&mut reader)?.value() as usize;
    let mut groups = Vec::with_capacity(std::cmp::min(group_count, 1024));
    for _ in 0..group_count {
        groups.push(decode_group(&mut reader)?);
    }
    Ok(Packet { groups })
}

/// Decodes the bytes of a marker output's push-data (i.e. what
/// [`parse_marker_script`] returns) into a `Packet`.
///
/// Returns `Ok(None)` if the push-data carries the `ARK` magic but no
/// self-delimiting `0x00` record — that marker is present but carries no
/// asset packet, which spec.md treats as a no-op rather than an error.
/// Returns `Ok(None)` as well if the push-data doesn't start with the magic
/// at all; callers that already checked the magic can ignore that case.
pub fn decode_packet(push_data: &[u8]) -> Result<Option<Packet>, CodecError> {
    if push_data.len() < MAGIC.len() || push_data[..MAGIC.len()] != MAGIC {
        return Ok(None);
    }
    let mut cursor = &push_data[MAGIC.len()..];
    loop {
        if cursor.is_empty() {
            return Ok(None);
        }
        let record_type = u8::wire_decode(&mut cursor)?;
        if record_type == TLV_TYPE_SELF_DELIMITING {
            return Ok(Some(decode_packet_body(cursor)?));
        }
        if !(0x40..=0xff).contains(&record_type) {
            return Err(CodecError::UnknownTag(record_type));
        }
        let len = CompactSize::wire_decode(&mut cursor)?.value() as usize;
        if cursor.len() < len {
            return Err(CodecError::Truncated);
        }
        cursor = &cursor[len..];
    }
}

/// Builds the marker output script embedding `packet`.
pub fn build_marker_output_script(packet: &Packet) -> Result<Vec<u8>, io::Error> {
    let payload = encode_packet(packet)?;
    Ok(script::build_marker_script(&payload))
}

/// Scans `script` (a single output's `scriptPubKey`) and, if it is a marker
/// output, decodes the `Packet` it carries.
///
/// This is the one-stop helper most callers want: it combines
/// [`script::parse_marker_script`] (which only needs to recognize
/// `OP_RETURN` + push-data) with the magic/TLV/packet decoding above.
pub fn parse_marker_output(script_bytes: &[u8]) -> Result<Option<Packet>, CodecError> {
    match script::parse_marker_script(script_bytes) {
        Some(push_data) => decode_packet(push_data),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetInput, AssetOutput, AssetRef, Issuance, MetadataMap};

    fn sample_packet() -> Packet {
        let mut metadata = MetadataMap::new();
        metadata.insert("name", "X");
        Packet::new(vec![Group {
            asset_id: None,
            issuance: Some(Issuance {
                control_asset: Some(AssetRef::ByGroup(0)),
                metadata: Some(metadata),
                immutable: true,
            }),
            metadata: None,
            inputs: vec![AssetInput::Local { i: 0, amt: 10 }],
            outputs: vec![AssetOutput::Local { o: 0, amt: 10 }],
        }])
    }

    #[test]
    fn roundtrip_through_script() {
        let packet = sample_packet();
        let script = build_marker_output_script(&packet).unwrap();
        let decoded = parse_marker_output(&script).unwrap().unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn no_marker_when_not_op_return() {
        assert_eq!(parse_marker_output(&[0x76, 0xa9]).unwrap(), None);
    }

    #[test]
    fn no_marker_when_magic_missing() {
        let script = script::build_marker_script(b"not ark");
        assert_eq!(parse_marker_output(&script).unwrap(), None);
    }

    #[test]
    fn empty_when_no_self_delimiting_record() {
        let mut payload = MAGIC.to_vec();
        // A single length-prefixed record of type 0x40 carrying nothing,
        // but no 0x00 record anywhere.
        payload.push(0x40);
        payload.push(0x00);
        let script = script::build_marker_script(&payload);
        assert_eq!(parse_marker_output(&script).unwrap(), None);
    }

    #[test]
    fn self_delimiting_saves_a_byte_versus_length_prefixed() {
        let packet = Packet::new(vec![]);
        let mut body = Vec::new();
        encode_packet_body(&packet, &mut body).unwrap();

        let self_delimiting_len = MAGIC.len() + 1 + body.len();
        let length_prefixed_len =
            MAGIC.len() + 1 + CompactSize::size(body.len() as u64) + body.len();
        assert_eq!(self_delimiting_len + 1, length_prefixed_len);
    }

    #[test]
    fn packed_counts_use_single_byte() {
        for (i, o) in [(0usize, 0usize), (1, 1), (14, 15), (15, 14)] {
            let mut buf = Vec::new();
            encode_counts(i, o, &mut buf).unwrap();
            assert_eq!(buf.len(), 1, "({i}, {o}) should pack into one byte");
            let (di, do_) = decode_counts(std::io::Cursor::new(&buf)).unwrap();
            assert_eq!((di, do_), (i, o));
        }
    }

    #[test]
    fn escape_counts_used_when_required() {
        for (i, o) in [(15usize, 15usize), (16, 0), (0, 16)] {
            let mut buf = Vec::new();
            encode_counts(i, o, &mut buf).unwrap();
            assert_eq!(buf[0], ESCAPE);
            let (di, do_) = decode_counts(std::io::Cursor::new(&buf)).unwrap();
            assert_eq!((di, do_), (i, o));
        }
    }

    #[test]
    fn reserved_presence_bits_rejected() {
        let mut body = MAGIC.to_vec();
        body.push(TLV_TYPE_SELF_DELIMITING);
        body.push(1); // group_count = 1
        body.push(0b1000); // presence byte with a reserved bit set
        let err = decode_packet(&body).unwrap_err();
        assert!(matches!(err, CodecError::ReservedBits));
    }
}
