use crate::session::Session;
use serde::{Deserialize, Serialize};

/// The durable registry document: one shared session next to the source list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub session: Session,

    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

impl RegistryDocument {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.session == Session::default()
    }
}

/// A registered public account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable id derived from the platform key
    pub id: String,

    /// Human-readable account name
    pub name: String,

    /// Opaque platform key (the account's fake id)
    #[serde(rename = "biz")]
    pub platform_key: String,

    /// Copy of the session that was valid when the source was registered
    #[serde(rename = "wx_cfg", default)]
    pub session_snapshot: Session,

    /// Number of articles requested per fetch
    #[serde(rename = "count", default = "default_fetch_count")]
    pub fetch_count: u32,

    /// Registration time, unix seconds
    #[serde(default)]
    pub created_at: i64,
}

fn default_fetch_count() -> u32 {
    10
}
