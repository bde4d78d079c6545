//! Convenience re-exports for binaries that assemble a running host.

pub use crate::config::HostConfig;
pub use crate::coordinator::{DeviceSessionCoordinator, Session};
pub use crate::dispatcher::CapabilityDispatcher;
pub use crate::event_bus::{DataReceivedEvent, DataSentEvent, EventBus, HostEvent, SessionClosedEvent, SessionCreatedEvent};
pub use crate::frame_pump::{FramePump, PhysicalFrame};
pub use crate::registry::PluginRegistry;
pub use crate::runtime::SessionHostRuntime;
pub use crate::supervisor::{PluginLaunchSpec, SessionHostSupervisor};
