//! Windows mapping backend: a named file mapping object so a separately
//! launched plugin process can open the same memory by name, mirroring
//! how the host hands a pipe name to a child.

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, UnmapViewOfFile, FILE_MAP_ALL_ACCESS, MEMORY_MAPPED_VIEW_ADDRESS,
    PAGE_READWRITE,
};

use crate::error::ShmemError;

/// A live Windows named mapping. Holds both the mapping handle and the
/// mapped view; both are released on drop.
pub struct WindowsMapping {
    mapping_handle: HANDLE,
    view: MEMORY_MAPPED_VIEW_ADDRESS,
    len: usize,
    name: String,
}

// SAFETY: the underlying HANDLE and view address are only read through
// `&self`/`&mut self` accessors that slice into the mapped region; the OS
// guarantees the view stays valid until `UnmapViewOfFile`/`CloseHandle`.
unsafe impl Send for WindowsMapping {}

impl WindowsMapping {
    pub fn create(name: &str, capacity_bytes: u64) -> Result<Self, ShmemError> {
        let wide_name = to_wide(name);
        let high = (capacity_bytes >> 32) as u32;
        let low = (capacity_bytes & 0xFFFF_FFFF) as u32;

        // SAFETY: `wide_name` is a valid null-terminated UTF-16 buffer
        // kept alive for the duration of the call.
        let mapping_handle = unsafe {
            CreateFileMappingW(
                HANDLE::default(),
                None,
                PAGE_READWRITE,
                high,
                low,
                PCWSTR(wide_name.as_ptr()),
            )
        }
        .map_err(|e| ShmemError::MappingFailed(format!("CreateFileMappingW failed: {e}")))?;

        let view = unsafe { MapViewOfFile(mapping_handle, FILE_MAP_ALL_ACCESS, 0, 0, capacity_bytes as usize) };
        if view.Value.is_null() {
            unsafe {
                let _ = CloseHandle(mapping_handle);
            }
            return Err(ShmemError::MappingFailed(
                "MapViewOfFile returned a null view".to_string(),
            ));
        }

        Ok(Self {
            mapping_handle,
            view,
            len: capacity_bytes as usize,
            name: name.to_string(),
        })
    }

    pub fn open(name: &str, capacity_bytes: u64) -> Result<Self, ShmemError> {
        // Windows has no distinct "open an existing named mapping" call
        // here beyond re-creating it with the same name: the OS hands
        // back a handle to the existing object when one already exists
        // under that name, which is exactly the semantics a reconnecting
        // session needs.
        Self::create(name, capacity_bytes)
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: `self.view` is a valid mapped view of `self.len` bytes
        // for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts_mut(self.view.Value as *mut u8, self.len) }
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: see `as_mut_slice`.
        unsafe { std::slice::from_raw_parts(self.view.Value as *const u8, self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WindowsMapping {
    fn drop(&mut self) {
        unsafe {
            let _ = UnmapViewOfFile(self.view);
            let _ = CloseHandle(self.mapping_handle);
        }
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
