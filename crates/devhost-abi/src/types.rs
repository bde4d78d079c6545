//! Plain data types exchanged between the host and its plugins, and the
//! session bookkeeping records the coordinator keeps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Descriptor the host hands a plugin so it can reopen the shared mapping
/// and locate its own segment within it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    /// OS-level mapping name (Windows mapping name / Unix `os_id`).
    pub map_name: String,
    /// Total capacity of the mapping in bytes.
    pub map_capacity_bytes: u64,
    /// Backing file path, present only for file-backed Unix mappings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_file_path: Option<String>,
    /// Byte offset of this segment within the mapping.
    pub segment_offset: u64,
    /// Total size of this segment in bytes, header included.
    pub segment_size: u64,
}

/// A plugin's requested shared-memory sizing, as declared in its
/// [`PluginCapability`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharedMemoryRequest {
    /// Minimum segment size the plugin can operate with.
    pub min: u64,
    /// Preferred segment size under normal conditions.
    pub preferred: u64,
    /// Largest segment size the plugin can make use of.
    pub max: u64,
    /// Whether the plugin can tolerate the host switching writer
    /// instances mid-session.
    pub supports_writer_switch: bool,
    /// Increment the manager should use when growing a live segment (not
    /// exercised by the MVP allocator, which never resizes in place, but
    /// carried for forward compatibility with a future free-list
    /// allocator).
    pub growth_step: u64,
}

impl Default for SharedMemoryRequest {
    fn default() -> Self {
        Self {
            min: 64 * 1024,
            preferred: crate::constants::DEFAULT_SEGMENT_SIZE as u64,
            max: 8 * 1024 * 1024,
            supports_writer_switch: false,
            growth_step: 0,
        }
    }
}

/// A plugin-declared capability endpoint, e.g. `serial` or `tcp-client`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginCapability {
    /// Stable capability id, unique within its plugin.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-schema-lite describing the `connect` parameters payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<serde_json::Value>,
    /// Optional UI schema hint, opaque to the core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_schema: Option<serde_json::Value>,
    /// Optional serialized default-parameters text, opaque to the core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_parameters_text: Option<String>,
    /// Whether multiple sessions against this capability may share one
    /// host process.
    #[serde(default)]
    pub supports_multi_session: bool,
    /// Requested shared-memory sizing, if the plugin declared one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_memory_request: Option<SharedMemoryRequest>,
}

impl PluginCapability {
    /// The segment size the coordinator should request on `connect`,
    /// falling back to the crate default when the plugin declared none.
    #[must_use]
    pub fn preferred_segment_bytes(&self) -> u64 {
        self.shared_memory_request
            .as_ref()
            .map(|r| r.preferred)
            .unwrap_or(crate::constants::DEFAULT_SEGMENT_SIZE as u64)
    }
}

/// Lifecycle state of a session, per the data model's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Segment allocation and handshake are in flight.
    Connecting,
    /// `connect` was acknowledged; frames may be flowing.
    Connected,
    /// `disconnect` has completed or was never needed.
    Disconnected,
    /// Connection attempt or live session failed.
    Failed,
}

/// Backpressure classification derived from a segment's `usage_ratio` at
/// the most recent watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackpressureLevel {
    /// Usage ratio at or below the medium threshold.
    #[default]
    None,
    /// Usage ratio above the medium threshold.
    Medium,
    /// Usage ratio above the warning or critical threshold.
    High,
}

impl BackpressureLevel {
    /// Classify a `usage_ratio` in `[0.0, 1.0]` against the given
    /// thresholds, per §4.4's watchdog policy.
    #[must_use]
    pub fn classify(usage_ratio: f64, medium: f64, warning: f64, critical: f64) -> Self {
        if usage_ratio > critical || usage_ratio > warning {
            Self::High
        } else if usage_ratio > medium {
            Self::Medium
        } else {
            Self::None
        }
    }
}

/// Opaque, externally persisted session record the core accepts for
/// restart. Beyond `parameters_text` being well-formed UTF-8, the core
/// makes no assumptions about its format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Session id to restore.
    pub id: String,
    /// Human-readable session name.
    pub name: String,
    /// Owning plugin id.
    pub plugin_id: String,
    /// Capability id within the plugin.
    pub capability_id: String,
    /// Opaque serialized parameters, replayed verbatim into `connect`.
    pub parameters_text: String,
    /// Originating adapter id, opaque to the core.
    pub adapter_id: String,
}

impl SessionDescriptor {
    /// Parse `parameters_text` as JSON, defaulting to an empty object on
    /// malformed text rather than failing restart outright.
    #[must_use]
    pub fn parameters(&self) -> serde_json::Value {
        serde_json::from_str(&self.parameters_text)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// A capability registry entry: plugin id plus its declared capabilities,
/// keyed the way [`crate::schema`] and the coordinator expect to look
/// plugins up by id or by (plugin, capability) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Stable plugin id.
    pub id: String,
    /// Human-readable plugin name.
    pub name: String,
    /// Capabilities keyed by capability id.
    pub capabilities: HashMap<String, PluginCapability>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_classification_thresholds() {
        assert_eq!(
            BackpressureLevel::classify(0.5, 0.60, 0.80, 0.95),
            BackpressureLevel::None
        );
        assert_eq!(
            BackpressureLevel::classify(0.70, 0.60, 0.80, 0.95),
            BackpressureLevel::Medium
        );
        assert_eq!(
            BackpressureLevel::classify(0.85, 0.60, 0.80, 0.95),
            BackpressureLevel::High
        );
        assert_eq!(
            BackpressureLevel::classify(0.99, 0.60, 0.80, 0.95),
            BackpressureLevel::High
        );
    }

    #[test]
    fn preferred_segment_falls_back_to_default() {
        let cap = PluginCapability {
            id: "serial".into(),
            name: "Serial".into(),
            description: None,
            json_schema: None,
            ui_schema: None,
            default_parameters_text: None,
            supports_multi_session: false,
            shared_memory_request: None,
        };
        assert_eq!(
            cap.preferred_segment_bytes(),
            crate::constants::DEFAULT_SEGMENT_SIZE as u64
        );
    }

    #[test]
    fn session_descriptor_parses_parameters() {
        let descriptor = SessionDescriptor {
            id: "s1".into(),
            name: "Serial #1".into(),
            plugin_id: "plugin.serial".into(),
            capability_id: "serial".into(),
            parameters_text: r#"{"port":"/dev/ttyUSB0"}"#.into(),
            adapter_id: "adapter-1".into(),
        };
        assert_eq!(descriptor.parameters()["port"], "/dev/ttyUSB0");
    }

    #[test]
    fn session_descriptor_tolerates_malformed_parameters() {
        let descriptor = SessionDescriptor {
            id: "s1".into(),
            name: "Serial #1".into(),
            plugin_id: "plugin.serial".into(),
            capability_id: "serial".into(),
            parameters_text: "not json".into(),
            adapter_id: "adapter-1".into(),
        };
        assert!(descriptor.parameters().is_object());
    }
}
