//! Ties the devhost data plane together: plugin registration, session
//! host process supervision, capability dispatch, the device-session
//! coordinator, and the frame pump that drains shared-memory segments
//! into the message stream.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod event_bus;
pub mod frame_pump;
pub mod prelude;
pub mod registry;
pub mod runtime;
pub mod supervisor;

pub use config::HostConfig;
pub use coordinator::{DeviceSessionCoordinator, Session};
pub use dispatcher::CapabilityDispatcher;
pub use event_bus::{DataReceivedEvent, DataSentEvent, EventBus, HostEvent, SessionClosedEvent, SessionCreatedEvent};
pub use frame_pump::{FramePump, PhysicalFrame};
pub use registry::PluginRegistry;
pub use runtime::SessionHostRuntime;
pub use supervisor::{PluginLaunchSpec, SessionHostSupervisor};
