//! The 16-byte frame wire header.
//!
//! A physical frame in a segment's data region is
//! `[u32 record_len][FrameHeader; 16 bytes][raw_len bytes]`, with
//! `record_len == FRAME_HEADER_SIZE + raw_len`. All multi-byte fields are
//! little-endian, following the same fixed-layout-struct convention as the
//! rest of this ABI.
//!
//! # Memory Layout
//!
//! | Offset | Size | Field                |
//! |-------:|-----:|----------------------|
//! | 0      | 2    | version              |
//! | 2      | 1    | flags                |
//! | 3      | 1    | reserved             |
//! | 4      | 8    | timestamp_ticks_utc  |
//! | 12     | 4    | raw_len              |

use crate::constants::FRAME_WIRE_VERSION;
use devhost_errors::DevhostError;

/// Size in bytes of the frame wire header (excludes the `u32` record-length
/// prefix written ahead of it).
pub const FRAME_HEADER_SIZE: usize = 16;

/// Fixed-layout header prepended to every frame's raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Wire version; must equal [`FRAME_WIRE_VERSION`] to be accepted.
    pub version: u16,
    /// Reserved bitfield for future per-frame flags.
    pub flags: u8,
    /// Padding byte, always zero on the wire.
    pub reserved: u8,
    /// Producer-assigned UTC timestamp in 100ns ticks since the Unix
    /// epoch (matches `chrono`'s `Utc::now()` tick resolution).
    pub timestamp_ticks_utc: i64,
    /// Length of the raw payload that follows this header.
    pub raw_len: i32,
}

static_assertions::const_assert_eq!(FRAME_HEADER_SIZE, 16);

impl FrameHeader {
    /// Build a header for `raw_len` bytes of payload stamped with `now`.
    #[must_use]
    pub fn new(raw_len: i32, timestamp_ticks_utc: i64) -> Self {
        Self {
            version: FRAME_WIRE_VERSION,
            flags: 0,
            reserved: 0,
            timestamp_ticks_utc,
            raw_len,
        }
    }

    /// The `record_len` value stored ahead of this header on the wire:
    /// `FRAME_HEADER_SIZE + raw_len`.
    #[must_use]
    pub fn record_len(&self) -> u32 {
        FRAME_HEADER_SIZE as u32 + self.raw_len as u32
    }

    /// Encode to the little-endian on-wire representation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.version.to_le_bytes());
        buf[2] = self.flags;
        buf[3] = self.reserved;
        buf[4..12].copy_from_slice(&self.timestamp_ticks_utc.to_le_bytes());
        buf[12..16].copy_from_slice(&self.raw_len.to_le_bytes());
        buf
    }

    /// Decode from a little-endian on-wire representation, validating the
    /// version but not `raw_len` against any particular `record_len`
    /// (callers that read a `record_len` prefix must cross-check it
    /// themselves — see `SessionSegment::try_read_frame`).
    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> Result<Self, DevhostError> {
        let version = u16::from_le_bytes([bytes[0], bytes[1]]);
        if version != FRAME_WIRE_VERSION {
            return Err(DevhostError::protocol(format!(
                "unsupported frame wire version {version}, expected {FRAME_WIRE_VERSION}"
            )));
        }
        let raw_len = i32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        if raw_len < 0 {
            return Err(DevhostError::protocol(format!(
                "negative raw_len {raw_len} in frame header"
            )));
        }
        Ok(Self {
            version,
            flags: bytes[2],
            reserved: bytes[3],
            timestamp_ticks_utc: i64::from_le_bytes([
                bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
            ]),
            raw_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let header = FrameHeader::new(42, 637_000_000_000_000_000);
        let bytes = header.to_bytes();
        let decoded = FrameHeader::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, header);
    }

    #[test]
    fn record_len_matches_formula() {
        let header = FrameHeader::new(100, 0);
        assert_eq!(header.record_len(), 116);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = FrameHeader::new(0, 0).to_bytes();
        bytes[0..2].copy_from_slice(&2u16.to_le_bytes());
        let result = FrameHeader::from_bytes(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_negative_raw_len() {
        let mut bytes = FrameHeader::new(0, 0).to_bytes();
        bytes[12..16].copy_from_slice(&(-1i32).to_le_bytes());
        let result = FrameHeader::from_bytes(&bytes);
        assert!(result.is_err());
    }
}
