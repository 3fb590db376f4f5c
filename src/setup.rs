//! Registration workflow: turn account names into persisted sources

use crate::platform::PlatformKeyResolver;
use crate::registry::{build_source_record, ConfigStore, SourceRegistry};
use crate::session::SessionProvider;
use crate::{ConfigError, Result, WxError};

/// Default number of articles fetched per source
pub const DEFAULT_FETCH_COUNT: u32 = 10;

/// Result of one registration run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Ids merged into the registry, in input order, each once
    pub added_ids: Vec<String>,
    /// Names that were not registered, with the reason
    pub skipped: Vec<(String, String)>,
}

impl RegistrationReport {
    pub fn is_empty(&self) -> bool {
        self.added_ids.is_empty()
    }
}

/// Splits comma-separated account names, trimming and dropping empties
pub fn parse_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Registers accounts by display name
///
/// # Arguments
///
/// * `names` - Display names to look up
/// * `count` - Articles to fetch per crawl for each new source
/// * `provider` - Supplies the session used for lookups and snapshots
/// * `resolver` - Maps a display name to its platform key
/// * `registry` - Receives the merged records
/// * `store` - Persists the merged document
///
/// # Returns
///
/// The added ids and skipped names. Nothing is resolved or written when
/// `names` is empty or no name resolves.
pub async fn register_sources(
    names: &[String],
    count: u32,
    provider: &SessionProvider,
    resolver: &dyn PlatformKeyResolver,
    registry: &mut SourceRegistry,
    store: &ConfigStore,
) -> Result<RegistrationReport> {
    if count == 0 {
        return Err(WxError::Config(ConfigError::Validation(
            "count must be at least 1".to_string(),
        )));
    }

    let mut report = RegistrationReport::default();
    if names.is_empty() {
        tracing::info!("No account names given, nothing to register");
        return Ok(report);
    }

    let session = provider.resolve().await?;

    let mut entries = Vec::new();
    for name in names {
        match registry.resolve_platform_key(resolver, name, &session).await {
            Ok(key) => {
                tracing::info!("Resolved '{}' to {}", name, key);
                let record = build_source_record(name, &key, &session, count);
                if !report.added_ids.contains(&record.id) {
                    report.added_ids.push(record.id.clone());
                }
                entries.push(record);
            }
            Err(e) => {
                tracing::warn!("Skipping '{}': {}", name, e);
                report.skipped.push((name.clone(), e.to_string()));
            }
        }
    }

    if entries.is_empty() {
        tracing::info!("No new sources resolved");
        return Ok(report);
    }

    registry.commit(entries, &session, store)?;
    tracing::info!(
        "Registered {} of {} accounts",
        report.added_ids.len(),
        names.len()
    );

    Ok(report)
}
