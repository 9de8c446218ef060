//! Session store
//!
//! One opaque session blob per requester at `<sessions_dir>/<requester_id>.session`.
//! No locking: concurrent logins by the same requester race and the last
//! write wins. Writes go through a temporary file and an atomic rename so a
//! reader never observes a half-written blob.

use crate::platform::PlatformClient;
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while saving a session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Client could not serialize its session
    #[error("session export failed: {0}")]
    Export(String),
}

/// Outcome of hydrating a client from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLoad {
    /// No blob stored for the requester
    Missing,
    /// A blob exists but could not be read or restored
    Corrupt(String),
    /// The client now carries the stored session
    Loaded,
}

/// Filesystem-backed session store
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `dir`. The directory is created lazily on save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the blob for a requester
    #[must_use]
    pub fn path_for(&self, requester_id: i64) -> PathBuf {
        self.dir.join(format!("{requester_id}.session"))
    }

    /// Whether a blob exists for the requester
    #[must_use]
    pub fn exists(&self, requester_id: i64) -> bool {
        self.path_for(requester_id).is_file()
    }

    /// Read the raw blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(&self, requester_id: i64) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(requester_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Restore the stored session into `client`, never failing the caller.
    pub fn hydrate(&self, requester_id: i64, client: &mut dyn PlatformClient) -> SessionLoad {
        let blob = match self.load(requester_id) {
            Ok(Some(blob)) => blob,
            Ok(None) => return SessionLoad::Missing,
            Err(e) => {
                warn!(user_id = requester_id, error = %e, "Session file unreadable");
                return SessionLoad::Corrupt(e.to_string());
            }
        };

        match client.import_session(&blob) {
            Ok(()) => {
                debug!(user_id = requester_id, "Session restored");
                SessionLoad::Loaded
            }
            Err(e) => {
                warn!(user_id = requester_id, error = %e, "Stored session rejected");
                SessionLoad::Corrupt(e.to_string())
            }
        }
    }

    /// Persist the session of `client`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if export or the file write fails.
    pub fn save(&self, requester_id: i64, client: &dyn PlatformClient) -> Result<(), SessionError> {
        let blob = client
            .export_session()
            .map_err(|e| SessionError::Export(e.to_string()))?;

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(requester_id);
        let tmp = path.with_extension("session.tmp");
        fs::write(&tmp, &blob)?;
        fs::rename(&tmp, &path)?;

        debug!(user_id = requester_id, bytes = blob.len(), "Session saved");
        Ok(())
    }
}
