//! Session handling
//!
//! A [`Session`] is the credential bundle needed to query the upstream
//! platform. [`SessionProvider`] resolves one per run from, in order, the
//! session persisted in the registry document, a local credential file, and
//! an interactive login.

mod credentials;
mod prompt;
mod provider;

pub use credentials::CredentialFile;
pub use prompt::PromptLogin;
pub use provider::{SessionOrigin, SessionProvider};

use serde::{Deserialize, Deserializer, Serialize};

/// Credential bundle for the upstream platform
///
/// Serialized with the field names the registry document and credential
/// file use on disk (`token`, `cookies_str`, `user_agent`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, deserialize_with = "lenient_string")]
    pub token: Option<String>,

    #[serde(rename = "cookies_str", default, deserialize_with = "lenient_string")]
    pub cookies: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub user_agent: Option<String>,
}

impl Session {
    pub fn new(
        token: Option<String>,
        cookies: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        Self {
            token,
            cookies,
            user_agent,
        }
    }

    /// A session is usable when it carries a non-empty token or cookie string
    pub fn is_usable(&self) -> bool {
        non_empty(&self.token) || non_empty(&self.cookies)
    }

    /// Token to pass in query strings, empty when absent
    pub fn token_str(&self) -> &str {
        self.token.as_deref().unwrap_or("")
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// Tokens sometimes arrive as JSON numbers in hand-written credential files.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_requires_token_or_cookies() {
        assert!(!Session::default().is_usable());
        assert!(!Session::new(None, None, Some("Mozilla/5.0".into())).is_usable());
        assert!(!Session::new(Some("  ".into()), Some(String::new()), None).is_usable());

        assert!(Session::new(Some("123".into()), None, None).is_usable());
        assert!(Session::new(None, Some("slave_sid=abc".into()), None).is_usable());
    }

    #[test]
    fn test_wire_field_names() {
        let session = Session::new(Some("42".into()), Some("a=b".into()), None);
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["token"], "42");
        assert_eq!(json["cookies_str"], "a=b");
        assert!(json["user_agent"].is_null());
    }

    #[test]
    fn test_numeric_token_and_unknown_fields() {
        let session: Session = serde_json::from_str(
            r#"{"token": 1385771234, "cookies_str": "a=b", "expiry": 99, "cookies": []}"#,
        )
        .unwrap();

        assert_eq!(session.token.as_deref(), Some("1385771234"));
        assert_eq!(session.cookies.as_deref(), Some("a=b"));
        assert_eq!(session.user_agent, None);
    }

    #[test]
    fn test_empty_object_is_default() {
        let session: Session = serde_json::from_str("{}").unwrap();
        assert_eq!(session, Session::default());
    }
}
