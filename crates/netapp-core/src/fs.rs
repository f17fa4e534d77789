//! Filesystem abstraction.
//!
//! Implementations provide platform-specific storage:
//! - `DirFileSystem` in `netapp-host` maps device paths into a host directory
//! - `MemoryFileSystem` in [`crate::mock`] keeps files in memory for tests
//!
//! Paths are device-style absolute paths such as `/config.json`.

use thiserror::Error;

/// Errors reported by filesystem primitives.
#[derive(Debug, Error)]
pub enum FsError {
    /// Mounting the storage failed.
    #[error("mount failed: {0}")]
    MountFailed(String),

    /// An operation was attempted before a successful mount.
    #[error("filesystem is not mounted")]
    NotMounted,

    /// The file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Minimal file primitives needed by the configuration store.
///
/// All methods are synchronous to support embedded platforms.
pub trait FileSystem: Send {
    /// Mount the storage, formatting or creating it if needed.
    fn mount(&mut self) -> Result<(), FsError>;

    /// Check whether a file exists.
    fn exists(&self, path: &str) -> bool;

    /// Read a whole file as UTF-8 text.
    fn read(&self, path: &str) -> Result<String, FsError>;

    /// Create or truncate a file and write `contents` to it.
    fn write(&mut self, path: &str, contents: &str) -> Result<(), FsError>;

    /// Remove a file.
    fn remove(&mut self, path: &str) -> Result<(), FsError>;
}
