//! Settings module for wechat-sources
//!
//! Settings start from built-in defaults, are optionally overlaid by a TOML
//! file, then by environment variables, and are validated before use.
//!
//! # Example
//!
//! ```no_run
//! use wechat_sources::config::load_settings;
//!
//! let settings = load_settings(None).unwrap();
//! println!("Crawl interval: {}s", settings.crawl.interval_secs);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{CrawlSettings, PathSettings, PlatformSettings, RegistrySettings, Settings};

pub use parser::{apply_env_overrides, compute_settings_hash, load_settings, parse_bool};
pub use validation::validate;
