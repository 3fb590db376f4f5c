//! Local credential file
//!
//! The file holds a single session object and is written after a successful
//! interactive login so later runs can skip the login.

use crate::registry::write_json_atomically;
use crate::session::Session;
use crate::Result;
use std::path::{Path, PathBuf};

/// A session stored as JSON on local disk
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the session, or `None` when the file is missing or cannot be parsed
    pub fn load(&self) -> Option<Session> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cannot read credential file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed credential file {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Writes the session, creating parent directories as needed
    pub fn save(&self, session: &Session) -> Result<()> {
        write_json_atomically(&self.path, session)
    }
}
