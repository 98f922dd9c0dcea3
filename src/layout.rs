//! Shared region layout
//!
//! Both backends store the same bytes:
//!
//! ```text
//! offset 0 : owner_turn   (i32, native endian)
//! offset 4 : pending_size (i32, native endian)
//! offset 8 : payload      (pending_size bytes)
//! ```

use std::mem::size_of;

/// Offset of the turn field
pub const OWNER_TURN_OFFSET: usize = 0;

/// Offset of the size field
pub const PENDING_SIZE_OFFSET: usize = size_of::<i32>();

/// Offset of the first payload byte
pub const PAYLOAD_OFFSET: usize = 2 * size_of::<i32>();

/// Total header size
pub const HEADER_SIZE: usize = PAYLOAD_OFFSET;

/// Size field value for an empty slot
pub const EMPTY: i32 = 0;

/// Size field value for a closed channel (poison)
pub const CLOSED: i32 = -1;

/// Region size needed for `max_payload` bytes of payload
#[inline]
pub const fn region_size(max_payload: usize) -> usize {
    HEADER_SIZE + max_payload
}

/// Decoded channel header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub owner_turn: i32,
    pub pending_size: i32,
}

impl Header {
    /// Decode both fields from the raw header bytes
    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut turn = [0u8; 4];
        let mut size = [0u8; 4];
        turn.copy_from_slice(&raw[OWNER_TURN_OFFSET..PENDING_SIZE_OFFSET]);
        size.copy_from_slice(&raw[PENDING_SIZE_OFFSET..PAYLOAD_OFFSET]);
        Self {
            owner_turn: i32::from_ne_bytes(turn),
            pending_size: i32::from_ne_bytes(size),
        }
    }

    /// Encode into raw header bytes
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[OWNER_TURN_OFFSET..PENDING_SIZE_OFFSET].copy_from_slice(&self.owner_turn.to_ne_bytes());
        raw[PENDING_SIZE_OFFSET..PAYLOAD_OFFSET].copy_from_slice(&self.pending_size.to_ne_bytes());
        raw
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.pending_size == CLOSED
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending_size == EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        assert_eq!(OWNER_TURN_OFFSET, 0);
        assert_eq!(PENDING_SIZE_OFFSET, 4);
        assert_eq!(PAYLOAD_OFFSET, 8);
        assert_eq!(region_size(128), 136);
    }

    #[test]
    fn test_header_native_layout() {
        let header = Header {
            owner_turn: 7,
            pending_size: CLOSED,
        };
        let raw = header.encode();
        assert_eq!(&raw[..4], &7i32.to_ne_bytes());
        assert_eq!(&raw[4..], &(-1i32).to_ne_bytes());
        assert_eq!(Header::decode(&raw), header);
        assert!(header.is_closed());
        assert!(!header.is_empty());
    }
}
