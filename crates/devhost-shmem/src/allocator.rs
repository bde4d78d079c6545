//! `SegmentedSharedMemory`: a bump allocator that carves `SessionSegment`s
//! out of one OS-level mapping, keyed by session id.

use std::collections::HashMap;

use devhost_abi::GLOBAL_HEADER_SIZE;
use parking_lot::RwLock;

use crate::error::ShmemError;
use crate::map::MapHandle;
use crate::segment::SessionSegment;

fn align_up_8(value: u64) -> u64 {
    (value + 7) & !7
}

/// Aggregate usage across every segment carved from one mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageStats {
    pub capacity_bytes: u64,
    pub allocated_bytes: u64,
    pub remaining_bytes: u64,
    pub segment_count: usize,
}

struct Allocation {
    offset: u64,
    size: u64,
}

/// Owns the mapping and the bump cursor; hands out [`SessionSegment`]
/// views into it. `release_segment` drops the segment record but never
/// reclaims its bytes — see the module-level rationale in the design
/// notes this mirrors: resegmentation is out of scope for a host whose
/// lifetime is bounded by the process.
pub struct SegmentedSharedMemory {
    map: RwLock<MapHandle>,
    capacity_bytes: u64,
    next_offset: RwLock<u64>,
    allocations: RwLock<HashMap<String, Allocation>>,
}

impl SegmentedSharedMemory {
    pub fn new(map: MapHandle) -> Self {
        let capacity_bytes = map.len() as u64;
        Self {
            map: RwLock::new(map),
            capacity_bytes,
            next_offset: RwLock::new(GLOBAL_HEADER_SIZE as u64),
            allocations: RwLock::new(HashMap::new()),
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Allocates a new segment of `size` bytes for `session_id`.
    pub fn allocate_segment(&self, session_id: &str, size: u64) -> Result<SessionSegment, ShmemError> {
        {
            let allocations = self.allocations.read();
            if allocations.contains_key(session_id) {
                return Err(ShmemError::DuplicateSession(session_id.to_string()));
            }
        }

        let mut next_offset = self.next_offset.write();
        let offset = *next_offset;
        if offset + size > self.capacity_bytes {
            return Err(ShmemError::OutOfCapacity {
                requested: size,
                remaining: self.capacity_bytes.saturating_sub(offset),
            });
        }

        *next_offset = align_up_8(offset + size);
        self.allocations
            .write()
            .insert(session_id.to_string(), Allocation { offset, size });

        self.segment(session_id)
    }

    /// Releases a previously allocated segment's bookkeeping record. The
    /// underlying bytes are not reused.
    pub fn release_segment(&self, session_id: &str) {
        self.allocations.write().remove(session_id);
    }

    /// Returns a fresh [`SessionSegment`] view over `session_id`'s region.
    pub fn segment(&self, session_id: &str) -> Result<SessionSegment, ShmemError> {
        let allocations = self.allocations.read();
        let allocation = allocations
            .get(session_id)
            .ok_or_else(|| ShmemError::Protocol(format!("no segment allocated for session '{session_id}'")))?;

        let mut map = self.map.write();
        let base = map.as_mut_slice().as_mut_ptr();
        // SAFETY: `allocation.offset + allocation.size <= capacity_bytes`
        // was checked at allocation time and the mapping is not resized.
        let segment_base = unsafe { base.add(allocation.offset as usize) };
        Ok(unsafe { SessionSegment::from_raw_parts(segment_base, allocation.size as usize) })
    }

    pub fn segment_info(&self, session_id: &str) -> Option<(u64, u64)> {
        self.allocations
            .read()
            .get(session_id)
            .map(|allocation| (allocation.offset, allocation.size))
    }

    pub fn usage_stats(&self) -> UsageStats {
        let allocations = self.allocations.read();
        let allocated_bytes: u64 = allocations.values().map(|a| a.size).sum();
        UsageStats {
            capacity_bytes: self.capacity_bytes,
            allocated_bytes,
            remaining_bytes: self.capacity_bytes.saturating_sub(*self.next_offset.read()),
            segment_count: allocations.len(),
        }
    }
}
