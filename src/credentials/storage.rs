//! Durable storage for the single credential record.
//!
//! Any store that can read and write one record suffices. The default is a
//! JSON token file next to the operator's configuration; [`MemoryStorage`]
//! backs tests and embedded use.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::debug;

use super::Credential;

/// Scoped read/write of a single credential record.
pub trait CredentialStorage: Send + Sync {
    /// Load the stored credential, or `None` if none has been persisted.
    fn load(&self) -> Result<Option<Credential>>;

    /// Persist the credential, replacing any previous record.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove the stored record, if any.
    fn clear(&self) -> Result<()>;
}

/// JSON token file storage.
///
/// The file is created on first persist and rewritten whole on every
/// refresh. A present but unreadable file is an error rather than `None`:
/// treating it as absent would silently trigger a fresh interactive
/// authorization.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStorage for TokenFile {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "token file not found.");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read token file {}", self.path.display()))?;
        let credential: Credential = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse token file {}", self.path.display()))?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create token file directory {}", parent.display())
                })?;
            }
        }

        let contents =
            serde_json::to_string_pretty(credential).context("failed to serialize credential")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write token file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "token file written.");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove token file {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// In-memory credential storage for tests and embedded use.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    record: Arc<Mutex<Option<Credential>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.record.lock().unwrap().clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        *self.record.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.record.lock().unwrap() = None;
        Ok(())
    }
}
