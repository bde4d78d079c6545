//! The pipe message catalog: requests, responses, and events exchanged
//! between the host and a session host process.
//!
//! Every message is a single line of UTF-8 JSON; embedded newlines are
//! never produced because `serde_json` never emits raw `\n` inside a
//! compact-encoded string or object.

use serde::{Deserialize, Serialize};

/// Literal message type strings, named the way the protocol spells them on
/// the wire (`apply-shared-memory-segment`, not a Rust-cased variant).
pub mod message_type {
    /// Liveness probe; response is `{ok:true}`.
    pub const PING: &str = "ping";
    /// Assign a shared-memory segment to a session.
    pub const APPLY_SHARED_MEMORY_SEGMENT: &str = "apply-shared-memory-segment";
    /// Start a session against a capability.
    pub const CONNECT: &str = "connect";
    /// Tear down a session.
    pub const DISCONNECT: &str = "disconnect";
    /// Polite process termination request.
    pub const SHUTDOWN: &str = "shutdown";
    /// Host-bound event: a UI-relevant view invalidation.
    pub const UI_STATE_INVALIDATED: &str = "ui-state-invalidated";
}

/// A request sent host → plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeRequest {
    /// Correlation id, echoed back on the matching response.
    pub id: String,
    /// Message type (see [`message_type`], or a plugin-specific action
    /// for passthrough).
    #[serde(rename = "type")]
    pub kind: String,
    /// Session this request concerns, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Message-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl PipeRequest {
    /// Build a request with a freshly generated id.
    #[must_use]
    pub fn new(kind: impl Into<String>, session_id: Option<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            session_id,
            payload,
        }
    }

    /// Serialize as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// A response sent plugin → host, correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeResponse {
    /// Correlation id matching the originating request.
    pub id: String,
    /// Whether the request succeeded.
    pub ok: bool,
    /// Error message when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Arbitrary response payload (e.g. a capability list snapshot).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<serde_json::Value>,
    /// Session this response concerns, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl PipeResponse {
    /// Build a success response.
    #[must_use]
    pub fn ok(id: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            error: None,
            snapshot: None,
            session_id,
        }
    }

    /// Build a success response carrying a snapshot payload.
    #[must_use]
    pub fn ok_with_snapshot(id: impl Into<String>, snapshot: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            error: None,
            snapshot: Some(snapshot),
            session_id: None,
        }
    }

    /// Build a failure response.
    #[must_use]
    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            error: Some(error.into()),
            snapshot: None,
            session_id: None,
        }
    }

    /// Serialize as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// An asynchronous event sent plugin → host outside the request/response
/// correlation (no `id` field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeEvent {
    /// Event type, e.g. `ui-state-invalidated`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Event payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// A line read off the pipe, disambiguated without guessing: a `PipeEvent`
/// never carries an `id` field, a `PipeResponse` always does.
#[derive(Debug, Clone)]
pub enum InboundLine {
    /// A correlated response to an earlier request.
    Response(PipeResponse),
    /// An uncorrelated, plugin-initiated event.
    Event(PipeEvent),
}

impl InboundLine {
    /// Parse one line of JSON, choosing `Response` vs `Event` by the
    /// presence of an `id` field.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        if value.get("id").is_some() {
            Ok(Self::Response(serde_json::from_value(value)?))
        } else {
            Ok(Self::Event(serde_json::from_value(value)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_with_trailing_newline() {
        let request = PipeRequest::new(message_type::PING, None, None);
        let line = request.to_line().expect("encode");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn inbound_line_distinguishes_response_from_event() {
        let response_line = r#"{"id":"abc","ok":true}"#;
        match InboundLine::parse(response_line).expect("parse") {
            InboundLine::Response(r) => assert_eq!(r.id, "abc"),
            InboundLine::Event(_) => panic!("expected response"),
        }

        let event_line = r#"{"type":"ui-state-invalidated","payload":{"capability_id":"serial"}}"#;
        match InboundLine::parse(event_line).expect("parse") {
            InboundLine::Event(e) => assert_eq!(e.kind, message_type::UI_STATE_INVALIDATED),
            InboundLine::Response(_) => panic!("expected event"),
        }
    }

    #[test]
    fn response_error_omits_snapshot_field() {
        let response = PipeResponse::err("1", "capability not found");
        let json = serde_json::to_string(&response).expect("encode");
        assert!(!json.contains("snapshot"));
        assert!(json.contains("capability not found"));
    }
}
