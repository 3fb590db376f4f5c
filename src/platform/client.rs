//! HTTP client for the public-account admin console
//!
//! Two JSON endpoints are used:
//! - `cgi-bin/searchbiz` maps an account name to its fake id (platform key)
//! - `cgi-bin/appmsg` lists an account's most recent articles
//!
//! Both answer HTTP 200 with a `base_resp.ret` code; anything but 0 is an
//! upstream error (expired session, rate limiting, ...).

use crate::platform::{
    parse_article_html, Article, ArticleDetail, ArticleFetcher, PlatformKeyResolver,
};
use crate::registry::SourceRecord;
use crate::session::Session;
use crate::{Result, WxError};
use async_trait::async_trait;
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct BaseResp {
    ret: i64,
    #[serde(default)]
    err_msg: String,
}

#[derive(Debug, Deserialize)]
struct SearchBizResponse {
    base_resp: BaseResp,
    #[serde(default)]
    list: Vec<BizEntry>,
}

#[derive(Debug, Deserialize)]
struct BizEntry {
    fakeid: String,
    #[serde(default)]
    nickname: String,
}

#[derive(Debug, Deserialize)]
struct AppMsgResponse {
    base_resp: BaseResp,
    #[serde(default)]
    app_msg_list: Vec<AppMsg>,
}

#[derive(Debug, Deserialize)]
struct AppMsg {
    #[serde(default)]
    aid: String,
    title: String,
    link: String,
    #[serde(default)]
    digest: String,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    create_time: i64,
}

impl From<AppMsg> for Article {
    fn from(msg: AppMsg) -> Self {
        Self {
            aid: msg.aid,
            title: msg.title,
            link: msg.link,
            digest: msg.digest,
            cover: msg.cover.filter(|c| !c.is_empty()),
            published_at: msg.create_time,
        }
    }
}

/// Admin console client
#[derive(Debug, Clone)]
pub struct MpClient {
    client: Client,
    base_url: Url,
    /// Overrides each source's session snapshot when set and usable
    session: Option<Session>,
}

impl MpClient {
    /// Builds a client for the given base URL
    ///
    /// # Arguments
    ///
    /// * `base_url` - Console root, e.g. `https://mp.weixin.qq.com`
    /// * `timeout` - Per-request timeout applied by the HTTP client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            session: None,
        })
    }

    /// Uses this session for article fetches instead of per-source snapshots
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Fetches and parses a single article page
    pub async fn fetch_article(&self, url: &str) -> Result<ArticleDetail> {
        let parsed = Url::parse(url).map_err(|e| WxError::InvalidUrl(format!("{}: {}", url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(WxError::InvalidUrl(format!(
                "{}: only http and https are supported",
                url
            )));
        }

        let request = self.client.get(parsed.clone());
        let request = match &self.session {
            Some(session) => with_session_headers(request, session),
            None => request.header(USER_AGENT, DEFAULT_USER_AGENT),
        };

        let html = request.send().await?.error_for_status()?.text().await?;
        Ok(parse_article_html(&html, parsed.as_str()))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

/// Parses the console root so relative endpoints join below its path
fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn with_session_headers(request: RequestBuilder, session: &Session) -> RequestBuilder {
    let request = request.header(
        USER_AGENT,
        session.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT),
    );
    match session.cookies.as_deref() {
        Some(cookies) if !cookies.is_empty() => request.header(COOKIE, cookies),
        _ => request,
    }
}

fn check_base_resp(base_resp: &BaseResp, action: &str) -> Result<()> {
    if base_resp.ret == 0 {
        Ok(())
    } else {
        Err(WxError::Platform(format!(
            "{} failed with ret={} {}",
            action, base_resp.ret, base_resp.err_msg
        )))
    }
}

#[async_trait]
impl PlatformKeyResolver for MpClient {
    async fn resolve_platform_key(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Option<String>> {
        let url = self.endpoint("cgi-bin/searchbiz")?;
        let request = self.client.get(url).query(&[
            ("action", "search_biz"),
            ("begin", "0"),
            ("count", "5"),
            ("query", name),
            ("token", session.token_str()),
            ("lang", "zh_CN"),
            ("f", "json"),
            ("ajax", "1"),
        ]);

        let body: SearchBizResponse = self
            .get_json(with_session_headers(request, session))
            .await?;
        check_base_resp(&body.base_resp, "searchbiz")?;

        tracing::debug!("searchbiz '{}' returned {} candidates", name, body.list.len());

        // Prefer an exact nickname match, fall back to the platform's top hit.
        let key = body
            .list
            .iter()
            .find(|entry| entry.nickname == name)
            .or_else(|| body.list.first())
            .map(|entry| entry.fakeid.clone())
            .filter(|key| !key.is_empty());

        Ok(key)
    }
}

#[async_trait]
impl ArticleFetcher for MpClient {
    async fn fetch(&self, source: &SourceRecord) -> Result<Vec<Article>> {
        let session = self
            .session
            .as_ref()
            .filter(|s| s.is_usable())
            .unwrap_or(&source.session_snapshot);

        let url = self.endpoint("cgi-bin/appmsg")?;
        let count = source.fetch_count.to_string();
        let request = self.client.get(url).query(&[
            ("action", "list_ex"),
            ("begin", "0"),
            ("count", count.as_str()),
            ("fakeid", source.platform_key.as_str()),
            ("type", "9"),
            ("query", ""),
            ("token", session.token_str()),
            ("lang", "zh_CN"),
            ("f", "json"),
            ("ajax", "1"),
        ]);

        let body: AppMsgResponse = self
            .get_json(with_session_headers(request, session))
            .await?;
        check_base_resp(&body.base_resp, "appmsg")?;

        Ok(body.app_msg_list.into_iter().map(Article::from).collect())
    }
}
