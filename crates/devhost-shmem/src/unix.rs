//! Unix mapping backend: a regular file under a writable temp directory,
//! mapped `MAP_SHARED` so any process that opens the same path sees the
//! same bytes. `memmap2` gives us the mapping; we only own the path.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::error::ShmemError;

/// A live Unix mapping: either backed by a named file (the common case,
/// since a plugin process must be able to reopen it) or anonymous (no
/// path, usable only within this process — kept for callers that opt out
/// of file backing).
pub struct UnixMapping {
    mmap: MmapMut,
    file_path: Option<PathBuf>,
}

impl UnixMapping {
    pub fn create_file_backed(path: &Path, capacity_bytes: u64) -> Result<Self, ShmemError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(capacity_bytes)?;

        // SAFETY: `file` is sized to `capacity_bytes` and kept open for
        // the duration of this call; memmap2 takes its own reference to
        // the underlying fd via `dup`, so it may be dropped afterwards.
        let mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| ShmemError::MappingFailed(e.to_string()))?;

        Ok(Self {
            mmap,
            file_path: Some(path.to_path_buf()),
        })
    }

    pub fn create_anonymous(capacity_bytes: u64) -> Result<Self, ShmemError> {
        let mmap = MmapMut::map_anon(capacity_bytes as usize)
            .map_err(|e| ShmemError::MappingFailed(e.to_string()))?;
        Ok(Self {
            mmap,
            file_path: None,
        })
    }

    pub fn open_file_backed(path: &Path) -> Result<Self, ShmemError> {
        let file = File::options().read(true).write(true).open(path)?;
        // SAFETY: the file is opened read/write and remains valid for
        // the lifetime of the mapping request below.
        let mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| ShmemError::MappingFailed(e.to_string()))?;
        Ok(Self {
            mmap,
            file_path: Some(path.to_path_buf()),
        })
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn delete_backing_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.file_path {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Default directory new file-backed mappings live under when the caller
/// supplies no explicit path, honoring `$TMPDIR` the way the external
/// interface spec calls for.
pub fn default_backing_dir() -> PathBuf {
    std::env::temp_dir().join("devhost").join("shm")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backed_mapping_round_trips_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.mmf");
        let mut mapping = UnixMapping::create_file_backed(&path, 4096).expect("create");
        mapping.as_mut_slice()[0] = 0x42;
        assert_eq!(mapping.as_slice()[0], 0x42);
        assert_eq!(mapping.len(), 4096);
    }

    #[test]
    fn reopening_file_backed_mapping_sees_prior_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.mmf");
        {
            let mut mapping = UnixMapping::create_file_backed(&path, 4096).expect("create");
            mapping.as_mut_slice()[10] = 7;
        }
        let reopened = UnixMapping::open_file_backed(&path).expect("reopen");
        assert_eq!(reopened.as_slice()[10], 7);
    }

    #[test]
    fn anonymous_mapping_has_no_path() {
        let mapping = UnixMapping::create_anonymous(4096).expect("create");
        assert!(mapping.file_path().is_none());
    }
}
