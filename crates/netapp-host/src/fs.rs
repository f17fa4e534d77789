//! Directory-backed filesystem.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use netapp_core::{FileSystem, FsError};
use tracing::{debug, info};

/// Maps device paths such as `/config.json` onto files below a host
/// directory. Mounting creates the directory.
#[derive(Debug, Clone)]
pub struct DirFileSystem {
    root: PathBuf,
    mounted: bool,
}

impl DirFileSystem {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mounted: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host location of a device path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn checked(&self, path: &str) -> Result<PathBuf, FsError> {
        if !self.mounted {
            return Err(FsError::NotMounted);
        }
        Ok(self.resolve(path))
    }
}

fn io_error(path: &str, source: io::Error) -> FsError {
    if source.kind() == io::ErrorKind::NotFound {
        FsError::NotFound(path.to_string())
    } else {
        FsError::Io {
            path: path.to_string(),
            source,
        }
    }
}

impl FileSystem for DirFileSystem {
    fn mount(&mut self) -> Result<(), FsError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| FsError::MountFailed(format!("{}: {}", self.root.display(), e)))?;
        self.mounted = true;
        info!(root = %self.root.display(), "Filesystem mounted");
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.mounted && self.resolve(path).is_file()
    }

    fn read(&self, path: &str) -> Result<String, FsError> {
        let host_path = self.checked(path)?;
        fs::read_to_string(host_path).map_err(|e| io_error(path, e))
    }

    fn write(&mut self, path: &str, contents: &str) -> Result<(), FsError> {
        let host_path = self.checked(path)?;
        fs::write(&host_path, contents).map_err(|e| io_error(path, e))?;
        debug!(path, bytes = contents.len(), "File written");
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        let host_path = self.checked(path)?;
        fs::remove_file(host_path).map_err(|e| io_error(path, e))
    }
}
