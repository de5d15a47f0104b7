//! Persisted browser session state
//!
//! One JSON blob per session name under a directory. The blob is opaque to
//! this module; the browser session decides what goes into it.

use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File-backed store of named session blobs
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `dir`; the directory is created on first save
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the blobs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a named blob
    pub fn path_for(&self, name: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Whether a blob exists
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Load a blob; `None` when it was never saved
    pub fn load(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                debug!("Loaded session state from {}", path.display());
                Ok(Some(serde_json::from_str(&raw)?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Save a blob, replacing any previous one
    pub fn save(&self, name: &str, state: &Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        std::fs::write(&path, serde_json::to_string_pretty(state)?)?;
        info!("Saved session state to {}", path.display());
        Ok(())
    }

    /// Remove a blob; missing blobs are not an error
    pub fn delete(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
