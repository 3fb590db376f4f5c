//! Durable JSON storage for the registry document

use crate::registry::{RegistryDocument, SourceRecord};
use crate::session::Session;
use crate::{Result, WxError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Document as read from disk, before each entry is checked
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    session: Value,
    #[serde(default)]
    sources: Vec<Value>,
}

/// Loads and saves the registry document at a fixed path
///
/// Reads are lenient: a missing, unreadable or malformed file yields an empty
/// document so the registry is always usable. Writes are strict: any failure
/// is returned as [`WxError::PersistFailed`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the document, falling back to an empty one
    pub fn load(&self) -> RegistryDocument {
        match self.read_document() {
            Ok(Some(doc)) => {
                tracing::debug!(
                    "Loaded {} sources from {}",
                    doc.sources.len(),
                    self.path.display()
                );
                doc
            }
            Ok(None) => {
                tracing::debug!("No registry at {}, starting empty", self.path.display());
                RegistryDocument::default()
            }
            Err(e) => {
                tracing::warn!("{}; starting with an empty registry", e);
                RegistryDocument::default()
            }
        }
    }

    /// Serializes the document and replaces the file atomically
    pub fn save(&self, doc: &RegistryDocument) -> Result<()> {
        write_json_atomically(&self.path, doc)?;
        tracing::info!(
            "Wrote {} with {} sources",
            self.path.display(),
            doc.sources.len()
        );
        Ok(())
    }

    fn read_document(&self) -> Result<Option<RegistryDocument>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let raw: RawDocument =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;
        Ok(Some(self.convert(raw)))
    }

    /// Converts each part on its own so one bad entry only drops itself
    fn convert(&self, raw: RawDocument) -> RegistryDocument {
        let raw_session_missing = raw.session.is_null();
        let session = match serde_json::from_value::<Session>(raw.session) {
            Ok(session) => session,
            Err(_) if raw_session_missing => Session::default(),
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed session in {}: {}",
                    self.path.display(),
                    e
                );
                Session::default()
            }
        };

        let mut sources = Vec::with_capacity(raw.sources.len());
        for (index, value) in raw.sources.into_iter().enumerate() {
            match serde_json::from_value::<SourceRecord>(value) {
                Ok(record) => sources.push(record),
                Err(e) => tracing::warn!(
                    "Skipping malformed source #{} in {}: {}",
                    index,
                    self.path.display(),
                    e
                ),
            }
        }

        RegistryDocument { session, sources }
    }

    fn corrupt(&self, message: String) -> WxError {
        WxError::ConfigCorrupt {
            path: self.path.display().to_string(),
            message,
        }
    }
}

/// Writes `value` as pretty JSON via a temp file in the target directory
///
/// The whole document is serialized before the filesystem is touched, and the
/// target is only replaced once the temp file is complete.
pub(crate) fn write_json_atomically<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');

    let persist_failed = |source: std::io::Error| WxError::PersistFailed {
        path: path.display().to_string(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(persist_failed)?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(persist_failed)?;
    tmp.write_all(content.as_bytes()).map_err(persist_failed)?;
    tmp.as_file().sync_all().map_err(persist_failed)?;
    tmp.persist(path).map_err(|e| persist_failed(e.error))?;

    Ok(())
}
