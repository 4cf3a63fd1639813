//! Wire format of `assoc_mgr_state`: a little-endian `u16` version and
//! `i64` unix timestamp, followed by one `(u16 tag, u64 length, payload)`
//! block per non-empty table, each payload being the bincode encoding of
//! the table list.
//!
//! Decoding validates everything before anything is installed: a version
//! outside `[STATE_FILE_MIN_VERSION, STATE_FILE_VERSION]`, an unknown
//! block tag or any truncated read rejects the whole file.

use crate::constants::BLOCK_TAG_ASSOCS;
use crate::constants::BLOCK_TAG_QOS;
use crate::constants::BLOCK_TAG_USERS;
use crate::constants::BLOCK_TAG_WCKEYS;
use crate::constants::STATE_FILE_MIN_VERSION;
use crate::constants::STATE_FILE_VERSION;
use crate::errors::FormatError;
use crate::model::Association;
use crate::model::Qos;
use crate::model::User;
use crate::model::Wckey;
use crate::Result;

/// The point-in-time copy of the four caches carried by one state file.
#[derive(Debug, Default)]
pub(crate) struct StateSnapshot {
    pub(crate) timestamp: i64,
    pub(crate) assocs: Option<Vec<Association>>,
    pub(crate) qos: Option<Vec<Qos>>,
    pub(crate) users: Option<Vec<User>>,
    pub(crate) wckeys: Option<Vec<Wckey>>,
}

/// Bounds-checked reader over the raw file bytes.
pub(crate) struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub(crate) fn take(
        &mut self,
        len: usize,
        section: &'static str,
    ) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(FormatError::Truncated { section }.into());
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub(crate) fn read_u16(
        &mut self,
        section: &'static str,
    ) -> Result<u16> {
        let raw = self.take(2, section)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    pub(crate) fn read_u64(
        &mut self,
        section: &'static str,
    ) -> Result<u64> {
        let raw = self.take(8, section)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf))
    }

    pub(crate) fn read_i64(
        &mut self,
        section: &'static str,
    ) -> Result<i64> {
        let raw = self.take(8, section)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(i64::from_le_bytes(buf))
    }
}

fn push_block<T: serde::Serialize>(
    out: &mut Vec<u8>,
    tag: u16,
    list: &[T],
) -> Result<()> {
    if list.is_empty() {
        return Ok(());
    }
    let payload = bincode::serialize(list)?;
    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

pub(crate) fn encode_state(snapshot: &StateSnapshot) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&STATE_FILE_VERSION.to_le_bytes());
    out.extend_from_slice(&snapshot.timestamp.to_le_bytes());

    if let Some(list) = &snapshot.assocs {
        push_block(&mut out, BLOCK_TAG_ASSOCS, list)?;
    }
    if let Some(list) = &snapshot.users {
        push_block(&mut out, BLOCK_TAG_USERS, list)?;
    }
    if let Some(list) = &snapshot.qos {
        push_block(&mut out, BLOCK_TAG_QOS, list)?;
    }
    if let Some(list) = &snapshot.wckeys {
        push_block(&mut out, BLOCK_TAG_WCKEYS, list)?;
    }
    Ok(out)
}

pub(crate) fn decode_state(bytes: &[u8]) -> Result<StateSnapshot> {
    let mut cursor = Cursor::new(bytes);

    let version = cursor.read_u16("state header version")?;
    if !(STATE_FILE_MIN_VERSION..=STATE_FILE_VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            min: STATE_FILE_MIN_VERSION,
            max: STATE_FILE_VERSION,
        }
        .into());
    }
    let timestamp = cursor.read_i64("state header timestamp")?;

    let mut snapshot = StateSnapshot {
        timestamp,
        ..StateSnapshot::default()
    };

    while cursor.remaining() > 0 {
        let tag = cursor.read_u16("block tag")?;
        let len = cursor.read_u64("block length")? as usize;
        let payload = cursor.take(len, "block payload")?;
        match tag {
            BLOCK_TAG_ASSOCS => snapshot.assocs = Some(bincode::deserialize(payload)?),
            BLOCK_TAG_USERS => snapshot.users = Some(bincode::deserialize(payload)?),
            BLOCK_TAG_QOS => snapshot.qos = Some(bincode::deserialize(payload)?),
            BLOCK_TAG_WCKEYS => snapshot.wckeys = Some(bincode::deserialize(payload)?),
            _ => return Err(FormatError::UnknownBlockTag { tag }.into()),
        }
    }
    Ok(snapshot)
}
