//! In-memory filesystem.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::fs::{FileSystem, FsError};

#[derive(Debug, Default)]
struct FsState {
    files: HashMap<String, String>,
    fail_mount: bool,
}

/// Filesystem keeping files in a shared map.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<FsState>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `mount` fail.
    pub fn fail_mount(&self, fail: bool) {
        lock(&self.state).fail_mount = fail;
    }

    /// Place a file directly, bypassing the application.
    pub fn insert(&self, path: &str, contents: &str) {
        lock(&self.state)
            .files
            .insert(path.to_string(), contents.to_string());
    }

    /// Current contents of a file.
    pub fn contents(&self, path: &str) -> Option<String> {
        lock(&self.state).files.get(path).cloned()
    }
}

impl FileSystem for MemoryFileSystem {
    fn mount(&mut self) -> Result<(), FsError> {
        if lock(&self.state).fail_mount {
            return Err(FsError::MountFailed("simulated mount failure".to_string()));
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        lock(&self.state).files.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<String, FsError> {
        self.contents(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    fn write(&mut self, path: &str, contents: &str) -> Result<(), FsError> {
        self.insert(path, contents);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), FsError> {
        lock(&self.state)
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }
}
