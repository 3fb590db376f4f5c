//! Upstream platform collaborators
//!
//! The registry and crawler only talk to the platform through the traits in
//! this module. [`MpClient`] implements them against the public-account
//! admin console's JSON endpoints.

mod article;
mod client;

pub use article::{parse_article_html, ArticleDetail};
pub use client::MpClient;

use crate::registry::SourceRecord;
use crate::session::Session;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An article listed for a public account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub aid: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub cover: Option<String>,
    /// Publish time, unix seconds
    pub published_at: i64,
}

/// Produces a session through a human-in-the-loop login
#[async_trait]
pub trait InteractiveLogin: Send + Sync {
    async fn acquire_session(&self) -> Result<Session>;
}

/// Resolves an account's display name to its platform key
#[async_trait]
pub trait PlatformKeyResolver: Send + Sync {
    /// Returns `Ok(None)` when the platform knows no account by that name
    async fn resolve_platform_key(&self, session: &Session, name: &str)
        -> Result<Option<String>>;
}

/// Retrieves the latest articles of a registered source
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    /// All-or-nothing: either the full list or an error
    async fn fetch(&self, source: &SourceRecord) -> Result<Vec<Article>>;
}
