//! In-memory source registry

use crate::config::RegistrySettings;
use crate::platform::PlatformKeyResolver;
use crate::registry::{ConfigStore, RegistryDocument, SourceRecord};
use crate::session::Session;
use crate::{Result, WxError};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

/// Prefix of every source id; the rest is the platform key
pub const SOURCE_ID_PREFIX: &str = "wechat_";

/// What happens to `created_at` when a known source is registered again
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatedAtPolicy {
    /// The newest registration's timestamp replaces the old one
    #[default]
    Reset,
    /// The first registration's timestamp is kept
    Preserve,
}

/// Order of the `sources` list when the registry is serialized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceOrdering {
    /// First-insertion order; overwriting a source keeps its position
    #[default]
    Insertion,
    ById,
    ByCreatedAt,
}

/// Merge and serialization policies for a [`SourceRegistry`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryPolicy {
    pub created_at: CreatedAtPolicy,
    pub ordering: SourceOrdering,
}

impl From<&RegistrySettings> for RegistryPolicy {
    fn from(settings: &RegistrySettings) -> Self {
        Self {
            created_at: settings.created_at,
            ordering: settings.ordering,
        }
    }
}

/// Derives the stable source id for a platform key
pub fn source_id_for(platform_key: &str) -> String {
    format!("{}{}", SOURCE_ID_PREFIX, platform_key)
}

/// Builds a source record stamped with the current time
pub fn build_source_record(
    name: &str,
    platform_key: &str,
    session: &Session,
    fetch_count: u32,
) -> SourceRecord {
    build_source_record_at(
        name,
        platform_key,
        session,
        fetch_count,
        Utc::now().timestamp(),
    )
}

/// Builds a source record with an explicit creation time
pub fn build_source_record_at(
    name: &str,
    platform_key: &str,
    session: &Session,
    fetch_count: u32,
    created_at: i64,
) -> SourceRecord {
    SourceRecord {
        id: source_id_for(platform_key),
        name: name.to_string(),
        platform_key: platform_key.to_string(),
        session_snapshot: session.clone(),
        fetch_count,
        created_at,
    }
}

/// Authoritative in-memory view of the registered sources
///
/// Records are keyed by id, so merging the same source twice leaves exactly
/// one record. The registry is the only writer of its [`ConfigStore`].
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, SourceRecord>,
    /// Ids in first-insertion order
    order: Vec<String>,
    session: Session,
    policy: RegistryPolicy,
}

impl SourceRegistry {
    pub fn new(policy: RegistryPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Builds a registry from a loaded document
    pub fn from_document(doc: RegistryDocument, policy: RegistryPolicy) -> Self {
        let mut registry = Self::new(policy);
        registry.load(doc);
        registry
    }

    /// Replaces the in-memory state with the document's content
    ///
    /// Duplicate ids in the document collapse to the last record.
    pub fn load(&mut self, doc: RegistryDocument) {
        self.sources.clear();
        self.order.clear();
        self.session = doc.session;

        for record in doc.sources {
            if self.insert(record) {
                tracing::debug!("Duplicate source id in registry document, keeping the last");
            }
        }
    }

    /// Inserts or overwrites each entry by id and returns the document to persist
    ///
    /// The session becomes the document's top-level session.
    pub fn merge(&mut self, entries: Vec<SourceRecord>, session: &Session) -> RegistryDocument {
        for mut entry in entries {
            if self.policy.created_at == CreatedAtPolicy::Preserve {
                if let Some(existing) = self.sources.get(&entry.id) {
                    entry.created_at = existing.created_at;
                }
            }

            let id = entry.id.clone();
            if self.insert(entry) {
                tracing::info!("Updated source {}", id);
            } else {
                tracing::info!("Added source {}", id);
            }
        }

        self.session = session.clone();
        self.document()
    }

    /// Merges the entries and writes the result through the store
    ///
    /// A write failure is returned; the in-memory registry keeps the merge.
    pub fn commit(
        &mut self,
        entries: Vec<SourceRecord>,
        session: &Session,
        store: &ConfigStore,
    ) -> Result<RegistryDocument> {
        let doc = self.merge(entries, session);
        store.save(&doc)?;
        Ok(doc)
    }

    /// Asks the platform for the key behind a display name
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The platform key
    /// * `Err(WxError::PlatformKeyNotFound)` - The platform knows no such account
    /// * `Err(_)` - The lookup itself failed
    pub async fn resolve_platform_key(
        &self,
        resolver: &dyn PlatformKeyResolver,
        name: &str,
        session: &Session,
    ) -> Result<String> {
        resolver
            .resolve_platform_key(session, name)
            .await?
            .ok_or_else(|| WxError::PlatformKeyNotFound {
                name: name.to_string(),
            })
    }

    /// Current state as a document, ordered per the registry policy
    pub fn document(&self) -> RegistryDocument {
        RegistryDocument {
            session: self.session.clone(),
            sources: self.records().into_iter().cloned().collect(),
        }
    }

    /// Records in serialization order
    pub fn records(&self) -> Vec<&SourceRecord> {
        let mut records: Vec<&SourceRecord> = self
            .order
            .iter()
            .filter_map(|id| self.sources.get(id))
            .collect();

        match self.policy.ordering {
            SourceOrdering::Insertion => {}
            SourceOrdering::ById => records.sort_by(|a, b| a.id.cmp(&b.id)),
            SourceOrdering::ByCreatedAt => records.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }

        records
    }

    /// Ids of every registered source
    pub fn ids(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.id.clone()).collect()
    }

    /// Pairs each requested id with a copy of its record, if registered
    pub fn select(&self, ids: &[String]) -> Vec<(String, Option<SourceRecord>)> {
        ids.iter()
            .map(|id| (id.clone(), self.sources.get(id).cloned()))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&SourceRecord> {
        self.sources.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Session stored alongside the sources
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Returns true when an existing record was replaced
    fn insert(&mut self, record: SourceRecord) -> bool {
        if !self.sources.contains_key(&record.id) {
            self.order.push(record.id.clone());
        }
        self.sources.insert(record.id.clone(), record).is_some()
    }
}
