use crate::config::types::{CrawlSettings, PathSettings, PlatformSettings, Settings};
use crate::ConfigError;
use url::Url;

/// Validates the entire settings tree
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    validate_crawl_settings(&settings.crawl)?;
    validate_path_settings(&settings.paths)?;
    validate_platform_settings(&settings.platform)?;
    Ok(())
}

fn validate_crawl_settings(crawl: &CrawlSettings) -> Result<(), ConfigError> {
    if crawl.interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "interval-secs must be >= 1, got {}",
            crawl.interval_secs
        )));
    }

    if crawl.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            crawl.request_timeout_secs
        )));
    }

    if crawl.max_concurrent < 1 || crawl.max_concurrent > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent must be between 1 and 64, got {}",
            crawl.max_concurrent
        )));
    }

    Ok(())
}

fn validate_path_settings(paths: &PathSettings) -> Result<(), ConfigError> {
    for (name, path) in [
        ("registry-path", &paths.registry_path),
        ("credential-path", &paths.credential_path),
        ("database-path", &paths.database_path),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

fn validate_platform_settings(platform: &PlatformSettings) -> Result<(), ConfigError> {
    let url = Url::parse(&platform.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            platform.base_url
        )));
    }

    Ok(())
}
