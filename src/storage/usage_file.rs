//! Wire format of `assoc_mgr_usage`: a little-endian `u16` version (its
//! own, smaller versioning domain) and `i64` unix timestamp, then a flat
//! sequence of `(u32 association id, u64 raw usage)` pairs, one per
//! user-level association. The raw-usage accumulator travels as its IEEE
//! 754 bit pattern inside the `u64` slot.

use super::Cursor;
use crate::constants::USAGE_FILE_MIN_VERSION;
use crate::constants::USAGE_FILE_VERSION;
use crate::errors::FormatError;
use crate::Result;

pub(crate) fn encode_usage(
    timestamp: i64,
    pairs: &[(u32, f64)],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(10 + pairs.len() * 12);
    out.extend_from_slice(&USAGE_FILE_VERSION.to_le_bytes());
    out.extend_from_slice(&timestamp.to_le_bytes());
    for (id, usage_raw) in pairs {
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&usage_raw.to_bits().to_le_bytes());
    }
    out
}

pub(crate) fn decode_usage(bytes: &[u8]) -> Result<(i64, Vec<(u32, f64)>)> {
    let mut cursor = Cursor::new(bytes);

    let version = cursor.read_u16("usage header version")?;
    if !(USAGE_FILE_MIN_VERSION..=USAGE_FILE_VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            min: USAGE_FILE_MIN_VERSION,
            max: USAGE_FILE_VERSION,
        }
        .into());
    }
    let timestamp = cursor.read_i64("usage header timestamp")?;

    let mut pairs = Vec::new();
    while cursor.remaining() > 0 {
        let raw_id = cursor.take(4, "usage pair id")?;
        let id = u32::from_le_bytes([raw_id[0], raw_id[1], raw_id[2], raw_id[3]]);
        let bits = cursor.read_u64("usage pair value")?;
        pairs.push((id, f64::from_bits(bits)));
    }
    Ok((timestamp, pairs))
}
