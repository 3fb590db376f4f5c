//! wechat-sources: a registry and crawl orchestrator for WeChat public accounts
//!
//! This crate keeps a durable registry of public-account sources, resolves a
//! single shared login session for the upstream platform, and triggers
//! article retrieval for registered sources either on demand or on a
//! recurring schedule.

pub mod api;
pub mod config;
pub mod crawler;
pub mod platform;
pub mod registry;
pub mod session;
pub mod setup;
pub mod storage;

use thiserror::Error;

/// Main error type for wechat-sources operations
#[derive(Debug, Error)]
pub enum WxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry document {path} is unreadable: {message}")]
    ConfigCorrupt { path: String, message: String },

    #[error(
        "No usable WeChat session: log in interactively or provide a credential file at {credential_path}"
    )]
    NoSessionAvailable { credential_path: String },

    #[error("No platform key found for account '{name}'")]
    PlatformKeyNotFound { name: String },

    #[error("Fetch failed for {source_id}: {message}")]
    FetchFailed { source_id: String, message: String },

    #[error("Failed to persist {path}: {source}")]
    PersistFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Platform returned an error: {0}")]
    Platform(String),

    #[error("Interactive login failed: {0}")]
    Login(String),

    #[error("Invalid article URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for environment variable {name}")]
    Env { name: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in settings: {0}")]
    InvalidUrl(String),
}

/// Result type alias for wechat-sources operations
pub type Result<T> = std::result::Result<T, WxError>;

/// Result type alias for settings operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Settings;
pub use crawler::{CrawlOrchestrator, CrawlReport, CrawlScheduler, SourceOutcome};
pub use registry::{ConfigStore, RegistryDocument, SourceRecord, SourceRegistry};
pub use session::{Session, SessionProvider};
