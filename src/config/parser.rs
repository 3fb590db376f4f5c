use crate::config::types::Settings;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads settings from defaults, an optional TOML file, and the process environment
///
/// # Arguments
///
/// * `path` - Optional path to a TOML settings file
///
/// # Returns
///
/// * `Ok(Settings)` - Successfully loaded and validated settings
/// * `Err(ConfigError)` - Failed to read, parse, or validate the settings
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let settings: Settings = toml::from_str(&content)?;
            tracing::info!(
                "Loaded settings from {} (hash: {})",
                path.display(),
                hash_content(&content)
            );
            settings
        }
        None => Settings::default(),
    };

    apply_env_overrides(&mut settings, |name| std::env::var(name).ok())?;
    validate(&settings)?;

    Ok(settings)
}

/// Overlays environment-style overrides onto the settings
///
/// `lookup` maps a variable name to its value, which keeps this testable
/// without touching the real process environment.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("CRAWL_INTERVAL") {
        settings.crawl.interval_secs = parse_number("CRAWL_INTERVAL", &value)?;
    }
    if let Some(value) = lookup("REQUEST_TIMEOUT") {
        settings.crawl.request_timeout_secs = parse_number("REQUEST_TIMEOUT", &value)?;
    }
    if let Some(value) = lookup("MAX_RETRIES") {
        settings.crawl.max_retries = parse_number("MAX_RETRIES", &value)?;
    }
    if let Some(value) = lookup("AUTO_CRAWL_ENABLED") {
        settings.crawl.auto_crawl_enabled = parse_bool(&value);
    }
    if let Some(value) = lookup("VECTOR_SYNC_ENABLED") {
        settings.crawl.vector_sync_enabled = parse_bool(&value);
    }
    if let Some(value) = lookup("CRAWLER_DB_PATH") {
        settings.paths.database_path = PathBuf::from(value);
    }
    if let Some(value) = lookup("WECHAT_REGISTRY_PATH") {
        settings.paths.registry_path = PathBuf::from(value);
    }
    if let Some(value) = lookup("WECHAT_CREDENTIAL_PATH") {
        settings.paths.credential_path = PathBuf::from(value);
    }
    Ok(())
}

/// Interprets a boolean flag: `1`, `true`, `yes` and `on` are true, anything else false
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Computes a SHA-256 hash of the settings file content
pub fn compute_settings_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
