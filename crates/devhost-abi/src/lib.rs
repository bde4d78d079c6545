//! Wire types and constants shared between the devhost process and its
//! out-of-process plugins: the segment/frame binary layout, the pipe
//! message catalog, and the plugin-declared capability descriptor.
//!
//! Nothing in this crate touches an OS mapping or a socket — it is pure
//! encode/decode plus the small JSON-schema subset used to validate
//! connect parameters before they cross the pipe.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod constants;
pub mod messages;
pub mod prelude;
pub mod schema;
pub mod types;
pub mod wire;

pub use constants::*;
pub use messages::{message_type, InboundLine, PipeEvent, PipeRequest, PipeResponse};
pub use schema::SchemaLiteValidator;
pub use types::{
    BackpressureLevel, PluginCapability, PluginDescriptor, SegmentDescriptor, SessionDescriptor,
    SessionStatus, SharedMemoryRequest,
};
pub use wire::{FrameHeader, FRAME_HEADER_SIZE};
