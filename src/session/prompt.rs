//! Terminal login prompt
//!
//! Asks the operator to log in to the public-account admin console in a
//! browser and paste the resulting token, cookie string and user agent.

use crate::platform::InteractiveLogin;
use crate::session::Session;
use crate::{Result, WxError};
use async_trait::async_trait;
use dialoguer::Input;

/// Interactive login backed by terminal prompts
#[derive(Debug, Default, Clone)]
pub struct PromptLogin;

impl PromptLogin {
    pub fn new() -> Self {
        Self
    }

    fn prompt() -> Result<Session> {
        println!("Log in at https://mp.weixin.qq.com in a browser, then copy the values below.");

        let token: String = Input::new()
            .with_prompt("token (from the admin URL)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| WxError::Login(e.to_string()))?;

        let cookies: String = Input::new()
            .with_prompt("Cookie header")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| WxError::Login(e.to_string()))?;

        let user_agent: String = Input::new()
            .with_prompt("User-Agent")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| WxError::Login(e.to_string()))?;

        Ok(Session::new(
            Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            Some(cookies.trim().to_string()).filter(|c| !c.is_empty()),
            Some(user_agent.trim().to_string()).filter(|u| !u.is_empty()),
        ))
    }
}

#[async_trait]
impl InteractiveLogin for PromptLogin {
    async fn acquire_session(&self) -> Result<Session> {
        tokio::task::spawn_blocking(Self::prompt)
            .await
            .map_err(|e| WxError::Login(e.to_string()))?
    }
}
