//! The log entry shape the frame pump appends to a session's stream, and
//! the hex-preview formatting it uses for payload bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which way a frame moved relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Plugin-originated frame, read off the session's segment.
    Receive,
    /// Host-originated frame, written to the session's segment.
    Send,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Self::Receive => "RX",
            Self::Send => "TX",
        }
    }
}

/// One entry in a session's message stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub session_id: String,
    pub sequence: u64,
    pub timestamp_utc: DateTime<Utc>,
    pub direction: Direction,
    pub text: String,
}

/// Hex bytes shown per formatted line before the overflow is collapsed
/// into a `(+K bytes)` suffix. 4 KiB of raw payload is 4096 hex pairs.
const MAX_PREVIEW_BYTES: usize = 4096;

/// Renders `raw` the way the frame pump logs it: `"RX: XX XX XX …
/// (+K bytes)"`, truncating the hex dump at [`MAX_PREVIEW_BYTES`] and
/// reporting how many trailing bytes were omitted.
#[must_use]
pub fn format_frame_preview(direction: Direction, raw: &[u8]) -> String {
    let shown = raw.len().min(MAX_PREVIEW_BYTES);
    let mut text = String::with_capacity(4 + shown * 3);
    text.push_str(direction.label());
    text.push_str(": ");
    for (i, byte) in raw[..shown].iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&format!("{byte:02X}"));
    }
    let overflow = raw.len() - shown;
    if overflow > 0 {
        text.push_str(&format!(" (+{overflow} bytes)"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_frame_is_rendered_in_full() {
        let text = format_frame_preview(Direction::Receive, &[0x01, 0xAB, 0xFF]);
        assert_eq!(text, "RX: 01 AB FF");
    }

    #[test]
    fn oversized_frame_is_truncated_with_overflow_count() {
        let raw = vec![0u8; MAX_PREVIEW_BYTES + 10];
        let text = format_frame_preview(Direction::Send, &raw);
        assert!(text.starts_with("TX: 00 00"));
        assert!(text.ends_with("(+10 bytes)"));
    }

    #[test]
    fn empty_frame_renders_just_the_label() {
        let text = format_frame_preview(Direction::Receive, &[]);
        assert_eq!(text, "RX: ");
    }
}
