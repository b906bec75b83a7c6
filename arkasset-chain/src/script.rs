//! Script push-data framing used to embed a packet inside an `OP_RETURN`
//! marker output.
//!
//! This plays the same role `zebra_chain::transparent::Script` plays for a
//! spendable lock script, except the host chain's script interpreter is out
//! of scope here — all this module needs to do is frame and unframe a single
//! push-data element.

/// `OP_RETURN`.
pub const OP_RETURN: u8 = 0x6a;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// Encodes `data` as a single Bitcoin-style push-data element: a direct push
/// for payloads up to 75 bytes, otherwise an `OP_PUSHDATA1`/`2`/`4` prefix
/// with a 1/2/4-byte little-endian length.
pub fn encode_push_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    let len = data.len();
    if len <= 75 {
        out.push(len as u8);
    } else if len <= u8::MAX as usize {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

/// Builds a marker output script: `OP_RETURN` followed by a single push-data
/// element carrying `payload`.
pub fn build_marker_script(payload: &[u8]) -> Vec<u8> {
    let mut script = vec![OP_RETURN];
    script.extend(encode_push_data(payload));
    script
}

/// Decodes one push-data element starting at the front of `script`, returning
/// the pushed bytes. Any framing that doesn't parse cleanly (truncated
/// length, declared length longer than the remaining script) yields `None`
/// rather than an error — malformed scripts are simply not markers.
pub fn decode_push_data(script: &[u8]) -> Option<&[u8]> {
    let (&opcode, rest) = script.split_first()?;
    let (len, rest) = match opcode {
        0..=75 => (opcode as usize, rest),
        OP_PUSHDATA1 => {
            let (&len, rest) = rest.split_first()?;
            (len as usize, rest)
        }
        OP_PUSHDATA2 => {
            if rest.len() < 2 {
                return None;
            }
            let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
            (len, &rest[2..])
        }
        OP_PUSHDATA4 => {
            if rest.len() < 4 {
                return None;
            }
            let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            (len, &rest[4..])
        }
        _ => return None,
    };
    if rest.len() < len {
        return None;
    }
    Some(&rest[..len])
}

/// If `script` is an `OP_RETURN` output carrying a single push-data element,
/// returns that element's bytes.
pub fn parse_marker_script(script: &[u8]) -> Option<&[u8]> {
    let (&opcode, rest) = script.split_first()?;
    if opcode != OP_RETURN {
        return None;
    }
    decode_push_data(rest)
}
