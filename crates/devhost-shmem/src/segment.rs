//! `SessionSegment`: a bounded SPSC byte queue carved out of the shared
//! mapping, with a 256-byte header and a versioned per-frame wire
//! header. See [`devhost_abi::wire::FrameHeader`] for the frame layout.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use devhost_abi::wire::{FrameHeader, FRAME_HEADER_SIZE};
use devhost_abi::SEGMENT_HEADER_SIZE;

use crate::error::ShmemError;

const SESSION_ID_FIELD_SIZE: usize = 128;
const WRITE_POS_OFFSET: usize = 128;
const READ_POS_OFFSET: usize = 136;
const FRAME_SEQ_OFFSET: usize = 144;
const SEGMENT_SIZE_OFFSET: usize = 152;
const LENGTH_PREFIX_SIZE: usize = 4;

/// A view over one session's slice of the shared mapping: the 256-byte
/// header followed by its data region. Holds a raw pointer rather than a
/// borrowed slice so multiple `SessionSegment`s (reader + writer side in
/// the same process, in tests) can coexist without fighting the borrow
/// checker over the parent mapping — synchronization is the header's
/// job, per the ownership note in the external protocol this mirrors.
pub struct SessionSegment {
    base: *mut u8,
    segment_size: usize,
}

// SAFETY: all mutation goes through atomic loads/stores on the header
// fields and plain byte copies into the data region, which is exactly
// the SPSC contract this type documents: one producer, one consumer.
unsafe impl Send for SessionSegment {}
unsafe impl Sync for SessionSegment {}

impl SessionSegment {
    /// Wraps an existing region of `segment_size` bytes starting at
    /// `base` as a session segment. Does not initialize the header;
    /// callers that are allocating a fresh segment must call
    /// [`Self::init_header`] first.
    ///
    /// # Safety
    /// `base` must point to at least `segment_size` valid, writable
    /// bytes for the lifetime of the returned value.
    pub unsafe fn from_raw_parts(base: *mut u8, segment_size: usize) -> Self {
        Self { base, segment_size }
    }

    /// Zeroes and initializes a freshly allocated segment's header.
    pub fn init_header(&self, session_id: &str) -> Result<(), ShmemError> {
        if session_id.as_bytes().len() >= SESSION_ID_FIELD_SIZE {
            return Err(ShmemError::InvalidOptions(format!(
                "session id '{session_id}' exceeds {} bytes",
                SESSION_ID_FIELD_SIZE - 1
            )));
        }

        let header = self.header_slice_mut();
        header[..SESSION_ID_FIELD_SIZE].fill(0);
        header[..session_id.as_bytes().len()].copy_from_slice(session_id.as_bytes());

        self.write_pos_atomic().store(0, Ordering::Release);
        self.read_pos_atomic().store(0, Ordering::Release);
        self.frame_seq_atomic().store(0, Ordering::Release);

        let size_bytes = (self.segment_size as u32).to_le_bytes();
        self.header_slice_mut()[SEGMENT_SIZE_OFFSET..SEGMENT_SIZE_OFFSET + 4].copy_from_slice(&size_bytes);

        Ok(())
    }

    fn header_slice(&self) -> &[u8] {
        // SAFETY: `base` is valid for `segment_size` bytes per the
        // constructor contract, and `segment_size >= SEGMENT_HEADER_SIZE`
        // is an allocator invariant.
        unsafe { std::slice::from_raw_parts(self.base, SEGMENT_HEADER_SIZE) }
    }

    #[allow(clippy::mut_from_ref)]
    fn header_slice_mut(&self) -> &mut [u8] {
        // SAFETY: see `header_slice`; exclusive access is the caller's
        // responsibility under the single-producer/single-consumer rule.
        unsafe { std::slice::from_raw_parts_mut(self.base, SEGMENT_HEADER_SIZE) }
    }

    fn data_region(&self) -> &[u8] {
        // SAFETY: bytes `[SEGMENT_HEADER_SIZE, segment_size)` are part of
        // the region handed to `from_raw_parts`.
        unsafe {
            std::slice::from_raw_parts(
                self.base.add(SEGMENT_HEADER_SIZE),
                self.segment_size - SEGMENT_HEADER_SIZE,
            )
        }
    }

    #[allow(clippy::mut_from_ref)]
    fn data_region_mut(&self) -> &mut [u8] {
        // SAFETY: see `data_region`.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.base.add(SEGMENT_HEADER_SIZE),
                self.segment_size - SEGMENT_HEADER_SIZE,
            )
        }
    }

    fn write_pos_atomic(&self) -> &AtomicU64 {
        // SAFETY: offset 128 within the header is reserved for this
        // field and is 8-byte aligned by construction of the allocator.
        unsafe { &*(self.base.add(WRITE_POS_OFFSET) as *const AtomicU64) }
    }

    fn read_pos_atomic(&self) -> &AtomicU64 {
        // SAFETY: see `write_pos_atomic`.
        unsafe { &*(self.base.add(READ_POS_OFFSET) as *const AtomicU64) }
    }

    fn frame_seq_atomic(&self) -> &AtomicI64 {
        // SAFETY: see `write_pos_atomic`.
        unsafe { &*(self.base.add(FRAME_SEQ_OFFSET) as *const AtomicI64) }
    }

    pub fn session_id(&self) -> String {
        let header = self.header_slice();
        let end = header[..SESSION_ID_FIELD_SIZE]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SESSION_ID_FIELD_SIZE);
        String::from_utf8_lossy(&header[..end]).into_owned()
    }

    fn data_size(&self) -> usize {
        self.segment_size - SEGMENT_HEADER_SIZE
    }

    pub fn write_pos(&self) -> u64 {
        self.write_pos_atomic().load(Ordering::Acquire)
    }

    pub fn read_pos(&self) -> u64 {
        self.read_pos_atomic().load(Ordering::Acquire)
    }

    pub fn used_bytes(&self) -> u64 {
        self.write_pos() - self.read_pos()
    }

    pub fn free_bytes(&self) -> u64 {
        self.data_size() as u64 - self.used_bytes()
    }

    pub fn usage_ratio(&self) -> f64 {
        if self.data_size() == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.data_size() as f64
    }

    /// Attempts to enqueue `raw` as a single frame. Returns `(true,
    /// frame_id)` on success and `(false, -1)` when the frame does not
    /// fit right now.
    pub fn try_write_frame(&self, raw: &[u8]) -> (bool, i64) {
        let data_size = self.data_size() as u64;
        let record_len = FRAME_HEADER_SIZE as u64 + raw.len() as u64;
        let entry_len = LENGTH_PREFIX_SIZE as u64 + record_len;

        if record_len + LENGTH_PREFIX_SIZE as u64 > data_size {
            return (false, -1);
        }

        let write_pos = self.write_pos();
        let read_pos = self.read_pos();
        if write_pos - read_pos + entry_len > data_size {
            return (false, -1);
        }

        let frame_id = self.frame_seq_atomic().fetch_add(1, Ordering::AcqRel) + 1;

        let mut cursor = (write_pos % data_size) as usize;
        cursor = self.write_wrapping(cursor, &(record_len as u32).to_le_bytes());

        let timestamp_ticks_utc = chrono::Utc::now().timestamp_micros();
        let header = FrameHeader::new(raw.len() as i32, timestamp_ticks_utc);
        cursor = self.write_wrapping(cursor, &header.to_bytes());
        self.write_wrapping(cursor, raw);

        self.write_pos_atomic().store(write_pos + entry_len, Ordering::Release);

        (true, frame_id)
    }

    /// Attempts to dequeue the next frame. `Err` indicates the header
    /// was malformed and draining this segment must stop.
    pub fn try_read_frame(&self) -> Result<Option<(i64, Vec<u8>)>, ShmemError> {
        let write_pos = self.write_pos();
        let read_pos = self.read_pos();
        if read_pos == write_pos {
            return Ok(None);
        }

        let data_size = self.data_size() as u64;
        let mut cursor = (read_pos % data_size) as usize;

        let mut len_bytes = [0u8; LENGTH_PREFIX_SIZE];
        cursor = self.read_wrapping(cursor, &mut len_bytes);
        let record_len = u32::from_le_bytes(len_bytes) as u64;

        if record_len < FRAME_HEADER_SIZE as u64 || record_len > data_size {
            return Err(ShmemError::Protocol(format!(
                "record_len {record_len} out of range for data_size {data_size}"
            )));
        }

        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        cursor = self.read_wrapping(cursor, &mut header_bytes);
        let header = FrameHeader::from_bytes(&header_bytes).map_err(|e| ShmemError::Protocol(e.to_string()))?;

        if record_len != FRAME_HEADER_SIZE as u64 + header.raw_len as u64 {
            return Err(ShmemError::Protocol(format!(
                "record_len {record_len} does not match raw_len {}",
                header.raw_len
            )));
        }

        let mut raw = vec![0u8; header.raw_len as usize];
        self.read_wrapping(cursor, &mut raw);

        let entry_len = LENGTH_PREFIX_SIZE as u64 + record_len;
        self.read_pos_atomic().store(read_pos + entry_len, Ordering::Release);

        Ok(Some((header.timestamp_ticks_utc, raw)))
    }

    fn write_wrapping(&self, cursor: usize, bytes: &[u8]) -> usize {
        let data = self.data_region_mut();
        let data_len = data.len();
        let first_chunk = (data_len - cursor).min(bytes.len());
        data[cursor..cursor + first_chunk].copy_from_slice(&bytes[..first_chunk]);
        if first_chunk < bytes.len() {
            let remaining = &bytes[first_chunk..];
            data[..remaining.len()].copy_from_slice(remaining);
            remaining.len()
        } else {
            (cursor + first_chunk) % data_len
        }
    }

    fn read_wrapping(&self, cursor: usize, out: &mut [u8]) -> usize {
        let data = self.data_region();
        let data_len = data.len();
        let first_chunk = (data_len - cursor).min(out.len());
        out[..first_chunk].copy_from_slice(&data[cursor..cursor + first_chunk]);
        if first_chunk < out.len() {
            let remaining_len = out.len() - first_chunk;
            out[first_chunk..].copy_from_slice(&data[..remaining_len]);
            remaining_len
        } else {
            (cursor + first_chunk) % data_len
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(segment_size: usize) -> (Vec<u8>, SessionSegment) {
        let mut backing = vec![0u8; segment_size];
        let segment = unsafe { SessionSegment::from_raw_parts(backing.as_mut_ptr(), segment_size) };
        segment.init_header("session-a").expect("init header");
        (backing, segment)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_backing, segment) = segment(SEGMENT_HEADER_SIZE + 4096);
        let payload = b"hello devhost".to_vec();
        let (written, frame_id) = segment.try_write_frame(&payload);
        assert!(written);
        assert_eq!(frame_id, 1);

        let (timestamp, raw) = segment.try_read_frame().expect("read ok").expect("frame present");
        assert_eq!(raw, payload);
        assert!(timestamp > 0);
        assert_eq!(segment.try_read_frame().expect("read ok"), None);
    }

    #[test]
    fn frame_ids_are_monotonic() {
        let (_backing, segment) = segment(SEGMENT_HEADER_SIZE + 4096);
        let (_, first) = segment.try_write_frame(b"a");
        let (_, second) = segment.try_write_frame(b"b");
        assert_eq!(second, first + 1);
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let (_backing, segment) = segment(SEGMENT_HEADER_SIZE + 1024);
        let payload = vec![0u8; 2048];
        let (written, frame_id) = segment.try_write_frame(&payload);
        assert!(!written);
        assert_eq!(frame_id, -1);
    }

    #[test]
    fn wraparound_preserves_tail_frames() {
        // data region = 1792 B; 400-byte payload => record_len 420, entry 424.
        let (_backing, segment) = segment(SEGMENT_HEADER_SIZE + 2048);
        let payload: Vec<u8> = (0u8..=255).cycle().take(400).collect();

        for _ in 0..4 {
            let (written, _) = segment.try_write_frame(&payload);
            assert!(written);
        }
        for _ in 0..2 {
            let (_, raw) = segment.try_read_frame().unwrap().unwrap();
            assert_eq!(raw, payload);
        }
        for _ in 0..2 {
            let (written, _) = segment.try_write_frame(&payload);
            assert!(written);
        }
        for _ in 0..4 {
            let (_, raw) = segment.try_read_frame().unwrap().unwrap();
            assert_eq!(raw, payload);
        }
        assert_eq!(segment.try_read_frame().unwrap(), None);
    }

    #[test]
    fn malformed_header_is_reported_as_protocol_error() {
        let (mut backing, segment) = segment(SEGMENT_HEADER_SIZE + 4096);
        let (written, _) = segment.try_write_frame(b"payload");
        assert!(written);

        // Corrupt the version field inside the just-written header.
        let data_offset = SEGMENT_HEADER_SIZE + LENGTH_PREFIX_SIZE;
        backing[data_offset] = 0xFF;

        assert!(segment.try_read_frame().is_err());
    }

    proptest::proptest! {
        #[test]
        fn round_trip_arbitrary_payload(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4000)) {
            let (_backing, segment) = segment(SEGMENT_HEADER_SIZE + 8192);
            let (written, _) = segment.try_write_frame(&bytes);
            proptest::prop_assert!(written);
            let (_, raw) = segment.try_read_frame().unwrap().unwrap();
            proptest::prop_assert_eq!(raw, bytes);
        }
    }
}
