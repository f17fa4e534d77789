//! Configuration storage.
//!
//! The device configuration is a flat JSON object of string pairs kept in
//! memory and mirrored to a single file. The in-memory document and the file
//! are reconciled by [`ConfigStore::load`] at startup and by
//! [`ConfigStore::write`] after every mutation the caller wants persisted.
//!
//! Keys keep their insertion order, so `ssid` followed by `password`
//! serializes as `{"ssid":"home","password":"secret"}`.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fs::{FileSystem, FsError};

/// Default location of the configuration file.
pub const CONFIG_PATH: &str = "/config.json";

/// Size of the serialization buffer, including the terminating byte the
/// device firmware reserves. Serialized documents longer than
/// `DOCUMENT_CAPACITY - 1` bytes are cut off.
pub const DOCUMENT_CAPACITY: usize = 256;

/// Contents written when the file is created or reset.
pub const EMPTY_DOCUMENT: &str = "{}";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The filesystem failed or is unavailable.
    #[error("storage error: {0}")]
    Storage(#[from] FsError),

    /// The file does not hold a JSON object.
    #[error("invalid config document: {0}")]
    InvalidData(#[from] serde_json::Error),
}

/// Result of [`ConfigStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file existed; an empty one was created.
    Created,
    /// The file was parsed; holds the number of keys read.
    Loaded(usize),
}

/// In-memory configuration document backed by one file.
pub struct ConfigStore {
    filesystem: Box<dyn FileSystem>,
    path: String,
    document: Map<String, Value>,
    mounted: bool,
}

impl ConfigStore {
    /// Create an empty, unmounted store for the file at `path`.
    pub fn new(filesystem: Box<dyn FileSystem>, path: impl Into<String>) -> Self {
        Self {
            filesystem,
            path: path.into(),
            document: Map::new(),
            mounted: false,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the filesystem has been mounted successfully.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Mount the backing filesystem.
    ///
    /// On failure the store stays unmounted and every later file operation
    /// reports [`FsError::NotMounted`]; the in-memory document still works.
    pub fn mount(&mut self) -> Result<(), ConfigError> {
        self.filesystem.mount()?;
        self.mounted = true;
        Ok(())
    }

    fn ensure_mounted(&self) -> Result<(), ConfigError> {
        if self.mounted {
            Ok(())
        } else {
            Err(FsError::NotMounted.into())
        }
    }

    /// Read the file into the in-memory document.
    ///
    /// A missing file is created with `{}` and leaves the document empty.
    /// A file that does not parse leaves the document empty and is reported
    /// as [`ConfigError::InvalidData`]; the file itself is left untouched.
    pub fn load(&mut self) -> Result<LoadOutcome, ConfigError> {
        self.ensure_mounted()?;

        if !self.filesystem.exists(&self.path) {
            self.filesystem.write(&self.path, EMPTY_DOCUMENT)?;
            self.document.clear();
            return Ok(LoadOutcome::Created);
        }

        let contents = self.filesystem.read(&self.path)?;
        match serde_json::from_str::<Map<String, Value>>(&contents) {
            Ok(document) => {
                self.document = document;
                debug!(keys = self.document.len(), path = %self.path, "Config loaded");
                Ok(LoadOutcome::Loaded(self.document.len()))
            }
            Err(e) => {
                self.document.clear();
                Err(e.into())
            }
        }
    }

    /// Serialize the document and overwrite the file.
    ///
    /// Returns the text that was written, which may be truncated to the
    /// buffer capacity.
    pub fn write(&mut self) -> Result<String, ConfigError> {
        self.ensure_mounted()?;

        let mut serialized = serde_json::to_string(&self.document)?;
        if truncate_to_capacity(&mut serialized) {
            warn!(
                path = %self.path,
                capacity = DOCUMENT_CAPACITY,
                "Config document exceeds buffer capacity, truncated"
            );
        }

        self.filesystem.write(&self.path, &serialized)?;
        Ok(serialized)
    }

    /// Insert or replace a value. Not persisted until [`ConfigStore::write`].
    pub fn set_value(&mut self, key: &str, value: &str) {
        self.document
            .insert(key.to_string(), Value::String(value.to_string()));
    }

    /// Check if a key exists.
    pub fn has_key(&self, key: &str) -> bool {
        self.document.contains_key(key)
    }

    /// Get a value as a string. Non-string JSON values read as `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.document.get(key).and_then(Value::as_str)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.document.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Raw contents of the backing file, independent of the document.
    pub fn raw_contents(&self) -> Result<String, ConfigError> {
        self.ensure_mounted()?;
        Ok(self.filesystem.read(&self.path)?)
    }

    /// Overwrite the backing file with `{}`. The in-memory document is kept.
    pub fn reset_file(&mut self) -> Result<(), ConfigError> {
        self.ensure_mounted()?;
        self.filesystem.write(&self.path, EMPTY_DOCUMENT)?;
        Ok(())
    }

    /// Remove the backing file. The in-memory document is kept.
    pub fn delete_file(&mut self) -> Result<(), ConfigError> {
        self.ensure_mounted()?;
        self.filesystem.remove(&self.path)?;
        Ok(())
    }
}

/// Cut `serialized` to fit the device buffer. Returns true if anything was cut.
fn truncate_to_capacity(serialized: &mut String) -> bool {
    let limit = DOCUMENT_CAPACITY - 1;
    if serialized.len() <= limit {
        return false;
    }
    let mut end = limit;
    while !serialized.is_char_boundary(end) {
        end -= 1;
    }
    serialized.truncate(end);
    true
}
