//! Wire-format constants for the shared mapping and the frame protocol.
//!
//! These are the magic numbers and fixed sizes that a host and a plugin
//! process must agree on without negotiation, since the mapping layout is
//! established before any message is exchanged.

/// Size in bytes of the reserved global header at the start of every
/// shared mapping. Consumers must treat its contents as opaque/zeroed.
pub const GLOBAL_HEADER_SIZE: usize = 4096;

/// Size in bytes of the fixed [`SessionSegment`](../devhost_shmem/index.html)
/// header that precedes each segment's ring data region.
pub const SEGMENT_HEADER_SIZE: usize = 256;

/// Byte length of the NUL-terminated session id field within a segment
/// header.
pub const SEGMENT_ID_FIELD_SIZE: usize = 128;

/// Current wire version for a [`FrameHeader`](crate::wire::FrameHeader).
/// A frame whose `version` does not match this value is a protocol error,
/// not a silent skip.
pub const FRAME_WIRE_VERSION: u16 = 1;

/// Default capability shared-memory request size when a plugin omits one.
pub const DEFAULT_SEGMENT_SIZE: usize = 256 * 1024;

/// Default total shared-memory budget for a host process.
pub const DEFAULT_MAX_TOTAL_BYTES: usize = 100 * 1024 * 1024;

/// Default per-segment allocation when a caller requests no specific
/// size.
pub const DEFAULT_DEFAULT_SEGMENT_BYTES: usize = 2 * 1024 * 1024;

/// Smallest segment the manager will ever allocate, even under a
/// downgrade.
pub const DEFAULT_MIN_SEGMENT_BYTES: usize = 512 * 1024;

/// Usage ratio above which the watchdog reports [`BackpressureLevel::High`]
/// as a warning.
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.80;

/// Usage ratio above which the watchdog reports [`BackpressureLevel::High`]
/// as critical.
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.95;

/// Usage ratio above which the watchdog reports [`BackpressureLevel::Medium`].
pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 0.60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_ordered() {
        assert!(DEFAULT_MEDIUM_THRESHOLD < DEFAULT_WARNING_THRESHOLD);
        assert!(DEFAULT_WARNING_THRESHOLD < DEFAULT_CRITICAL_THRESHOLD);
    }

    #[test]
    fn segment_defaults_are_ordered() {
        assert!(DEFAULT_MIN_SEGMENT_BYTES <= DEFAULT_DEFAULT_SEGMENT_BYTES);
        assert!(DEFAULT_DEFAULT_SEGMENT_BYTES <= DEFAULT_MAX_TOTAL_BYTES);
    }
}
