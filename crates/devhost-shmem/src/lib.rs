//! Segmented shared memory and SPSC ring buffers for devhost plugin
//! sessions: [`map`] opens the OS-level mapping, [`segment`] frames
//! bytes within it, [`allocator`] carves segments out with a bump
//! allocator, and [`manager`] adds lifecycle and backpressure
//! monitoring on top.

pub mod allocator;
pub mod error;
pub mod manager;
pub mod map;
pub mod segment;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

pub use allocator::{SegmentedSharedMemory, UsageStats};
pub use error::{ShmemError, ShmemResult};
pub use manager::{BackpressureDetected, SharedMemoryManager, SharedMemoryManagerConfig};
pub use map::{MapFactory, MapHandle, MapOptions};
pub use segment::SessionSegment;
