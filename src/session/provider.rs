//! Session resolution with ordered fallback

use crate::platform::InteractiveLogin;
use crate::session::{CredentialFile, Session};
use crate::{Result, WxError};
use std::path::PathBuf;
use std::sync::Arc;

/// Where a resolved session came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Persisted,
    CredentialFile,
    InteractiveLogin,
}

/// Resolves a usable session, trying each credential source in priority order
///
/// 1. The session persisted in the registry document, if usable
/// 2. The local credential file, if present, parseable and usable
/// 3. An interactive login, whose result is written to the credential file
pub struct SessionProvider {
    persisted: Option<Session>,
    credentials: CredentialFile,
    login: Option<Arc<dyn InteractiveLogin>>,
}

impl SessionProvider {
    /// Creates a provider without an interactive login collaborator
    ///
    /// # Arguments
    ///
    /// * `persisted` - Session read from the registry document, if any
    /// * `credential_path` - Location of the local credential file
    pub fn new(persisted: Option<Session>, credential_path: impl Into<PathBuf>) -> Self {
        Self {
            persisted,
            credentials: CredentialFile::new(credential_path),
            login: None,
        }
    }

    /// Attaches the collaborator used when no stored session is usable
    pub fn with_login(mut self, login: Arc<dyn InteractiveLogin>) -> Self {
        self.login = Some(login);
        self
    }

    /// Resolves a usable session
    ///
    /// # Returns
    ///
    /// * `Ok(Session)` - The first usable session found
    /// * `Err(WxError::NoSessionAvailable)` - Every source failed
    pub async fn resolve(&self) -> Result<Session> {
        self.resolve_with_origin().await.map(|(session, _)| session)
    }

    /// Same as [`resolve`](Self::resolve), also reporting which source won
    pub async fn resolve_with_origin(&self) -> Result<(Session, SessionOrigin)> {
        if let Some(session) = self.persisted.as_ref().filter(|s| s.is_usable()) {
            tracing::info!("Using session from the registry document");
            return Ok((session.clone(), SessionOrigin::Persisted));
        }

        match self.credentials.load() {
            Some(session) if session.is_usable() => {
                tracing::info!(
                    "Loaded session from {}",
                    self.credentials.path().display()
                );
                return Ok((session, SessionOrigin::CredentialFile));
            }
            Some(_) => tracing::warn!(
                "Credential file {} has neither token nor cookies",
                self.credentials.path().display()
            ),
            None => tracing::debug!(
                "No credential file at {}",
                self.credentials.path().display()
            ),
        }

        if let Some(login) = &self.login {
            tracing::info!("No stored session, starting interactive login");
            match login.acquire_session().await {
                Ok(session) if session.is_usable() => {
                    if let Err(e) = self.credentials.save(&session) {
                        tracing::warn!("Could not save session for later runs: {}", e);
                    } else {
                        tracing::info!(
                            "Saved session to {}",
                            self.credentials.path().display()
                        );
                    }
                    return Ok((session, SessionOrigin::InteractiveLogin));
                }
                Ok(_) => tracing::warn!("Interactive login returned an empty session"),
                Err(e) => tracing::warn!("Interactive login failed: {}", e),
            }
        }

        Err(WxError::NoSessionAvailable {
            credential_path: self.credentials.path().display().to_string(),
        })
    }
}
