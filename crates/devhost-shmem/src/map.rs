//! Platform-independent entry point for obtaining a block of memory two
//! processes can both see: [`MapFactory::create`] picks the Unix or
//! Windows backend at compile time and returns a [`MapHandle`] that
//! hides the difference behind byte-slice accessors.

use std::path::PathBuf;

use crate::error::ShmemError;

#[cfg(unix)]
use crate::unix::UnixMapping as PlatformMapping;
#[cfg(windows)]
use crate::windows::WindowsMapping as PlatformMapping;

/// Parameters for a new or reopened mapping.
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Logical name of the mapping. Used as the Windows object name and,
    /// on Unix, as the file stem when no explicit path is given.
    pub name: String,
    /// Total size of the mapping in bytes.
    pub capacity_bytes: u64,
    /// Explicit backing file path on Unix. When `None`, a path under
    /// [`crate::unix::default_backing_dir`] is derived from `name`.
    pub unix_file_path: Option<PathBuf>,
    /// Whether to back the mapping with a file on Unix at all. When
    /// `false`, an anonymous mapping is used and `name` only serves as a
    /// label — no other process can attach to it by name.
    pub use_file_backed_on_unix: bool,
    /// Whether the backing file should be removed when the handle is
    /// dropped. Ignored on Windows and for anonymous Unix mappings.
    pub delete_file_on_dispose: bool,
}

impl MapOptions {
    fn validate(&self) -> Result<(), ShmemError> {
        if self.name.trim().is_empty() {
            return Err(ShmemError::InvalidOptions("name must not be empty".to_string()));
        }
        if self.capacity_bytes == 0 {
            return Err(ShmemError::InvalidOptions(
                "capacity_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A handle to a mapping that is open for the lifetime of this value.
/// Dropping it unmaps the memory and, if requested, deletes the backing
/// file.
pub struct MapHandle {
    inner: PlatformMapping,
    delete_on_dispose: bool,
}

impl MapHandle {
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.inner.as_mut_slice()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_slice()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

#[cfg(unix)]
impl Drop for MapHandle {
    fn drop(&mut self) {
        if self.delete_on_dispose {
            if let Err(err) = self.inner.delete_backing_file() {
                tracing::warn!(error = %err, "failed to delete shared memory backing file");
            }
        }
    }
}

#[cfg(windows)]
impl Drop for MapHandle {
    fn drop(&mut self) {
        // Named mapping objects are reference-counted by the OS and
        // vanish once the last handle closes; there is no file to clean
        // up on this platform.
    }
}

/// Creates and opens OS-level memory mappings.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapFactory;

impl MapFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Creates a brand-new mapping, failing if invalid options were
    /// supplied or the OS-level call fails.
    pub fn create(&self, options: &MapOptions) -> Result<MapHandle, ShmemError> {
        options.validate()?;

        #[cfg(unix)]
        {
            let inner = if options.use_file_backed_on_unix {
                let path = options
                    .unix_file_path
                    .clone()
                    .unwrap_or_else(|| crate::unix::default_backing_dir().join(format!("{}.mmf", options.name)));
                PlatformMapping::create_file_backed(&path, options.capacity_bytes)?
            } else {
                PlatformMapping::create_anonymous(options.capacity_bytes)?
            };
            Ok(MapHandle {
                inner,
                delete_on_dispose: options.delete_file_on_dispose && options.use_file_backed_on_unix,
            })
        }

        #[cfg(windows)]
        {
            let inner = PlatformMapping::create(&options.name, options.capacity_bytes)?;
            Ok(MapHandle {
                inner,
                delete_on_dispose: false,
            })
        }
    }

    /// Opens a mapping a prior call to [`Self::create`] (in this or
    /// another process) already established.
    pub fn open(&self, options: &MapOptions) -> Result<MapHandle, ShmemError> {
        options.validate()?;

        #[cfg(unix)]
        {
            let path = options
                .unix_file_path
                .clone()
                .unwrap_or_else(|| crate::unix::default_backing_dir().join(format!("{}.mmf", options.name)));
            let inner = PlatformMapping::open_file_backed(&path)?;
            Ok(MapHandle {
                inner,
                delete_on_dispose: options.delete_file_on_dispose,
            })
        }

        #[cfg(windows)]
        {
            let inner = PlatformMapping::open(&options.name, options.capacity_bytes)?;
            Ok(MapHandle {
                inner,
                delete_on_dispose: false,
            })
        }
    }
}
