//! Player/tag identifier carried zero-padded in a fixed 10-byte field.

use core::hash::{Hash, Hasher};

use crate::error::ProtocolError;

/// Capacity of the UID byte field on the wire.
pub const UID_CAPACITY: usize = 10;

/// Variable-length UID (4, 7 or 10 significant bytes).
///
/// Bytes beyond `len` are always zero. Equality and hashing only look at
/// `len` and the significant prefix.
#[derive(Debug, Clone, Copy)]
pub struct TrexUid {
    len: u8,
    bytes: [u8; UID_CAPACITY],
}

impl TrexUid {
    /// Build a UID from its significant bytes.
    ///
    /// Returns `None` unless `uid` is 4, 7 or 10 bytes long.
    pub fn new(uid: &[u8]) -> Option<Self> {
        if !Self::valid_len(uid.len()) {
            return None;
        }
        let mut bytes = [0u8; UID_CAPACITY];
        bytes[..uid.len()].copy_from_slice(uid);
        Some(Self {
            len: uid.len() as u8,
            bytes,
        })
    }

    /// Rebuild a UID from its wire fields, rejecting bad lengths and non-zero
    /// padding.
    pub fn from_wire(len: u8, bytes: [u8; UID_CAPACITY]) -> Result<Self, ProtocolError> {
        let n = len as usize;
        if !Self::valid_len(n) || bytes[n..].iter().any(|&b| b != 0) {
            return Err(ProtocolError::MalformedUid);
        }
        Ok(Self { len, bytes })
    }

    const fn valid_len(n: usize) -> bool {
        matches!(n, 4 | 7 | 10)
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false: a UID has at least four significant bytes.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Significant bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    /// Full padded field as sent on the wire.
    pub fn raw(&self) -> &[u8; UID_CAPACITY] {
        &self.bytes
    }

    pub(crate) fn wire_len(&self) -> u8 {
        self.len
    }
}

impl Default for TrexUid {
    fn default() -> Self {
        Self {
            len: 4,
            bytes: [0; UID_CAPACITY],
        }
    }
}

impl PartialEq for TrexUid {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for TrexUid {}

impl Hash for TrexUid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        self.as_bytes().hash(state);
    }
}
