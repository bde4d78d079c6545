//! Convenience re-exports for downstream crates.

pub use crate::constants::*;
pub use crate::messages::{message_type, InboundLine, PipeEvent, PipeRequest, PipeResponse};
pub use crate::schema::SchemaLiteValidator;
pub use crate::types::{
    BackpressureLevel, PluginCapability, PluginDescriptor, SegmentDescriptor, SessionDescriptor,
    SessionStatus, SharedMemoryRequest,
};
pub use crate::wire::FrameHeader;
