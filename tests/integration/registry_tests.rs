//! Integration tests for source registration
//!
//! These tests use wiremock to stand in for the admin console's account
//! search and check what ends up in the registry document on disk.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wechat_sources::platform::{InteractiveLogin, MpClient};
use wechat_sources::registry::{RegistryPolicy, SourceRegistry};
use wechat_sources::session::{CredentialFile, SessionOrigin};
use wechat_sources::setup::{parse_names, register_sources};
use wechat_sources::{ConfigStore, Session, SessionProvider, WxError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> Session {
    Session::new(
        Some("123456".to_string()),
        Some("slave_sid=abc; slave_user=gh_1".to_string()),
        Some("TestAgent/1.0".to_string()),
    )
}

async fn mount_search(server: &MockServer, query: &str, list: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/searchbiz"))
        .and(query_param("action", "search_biz"))
        .and(query_param("query", query))
        .and(query_param("token", "123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base_resp": {"ret": 0, "err_msg": "ok"},
            "list": list,
        })))
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> MpClient {
    MpClient::new(&server.uri(), Duration::from_secs(5)).expect("client should build")
}

struct FixedLogin(Session);

#[async_trait::async_trait]
impl InteractiveLogin for FixedLogin {
    async fn acquire_session(&self) -> wechat_sources::Result<Session> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_register_writes_document() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Campus News",
        json!([
            {"fakeid": "MzA_other", "nickname": "Campus News Digest"},
            {"fakeid": "MzA_campus", "nickname": "Campus News"}
        ]),
    )
    .await;
    mount_search(&server, "Nobody", json!([])).await;

    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("config/sources/wechat.json"));
    let provider = SessionProvider::new(Some(session()), dir.path().join("cfg/cookies.json"));
    let mut registry = SourceRegistry::default();

    let names = parse_names("Campus News, Nobody");
    let report = register_sources(
        &names,
        10,
        &provider,
        &client_for(&server),
        &mut registry,
        &store,
    )
    .await
    .unwrap();

    assert_eq!(report.added_ids, vec!["wechat_MzA_campus"]);
    assert_eq!(report.skipped.len(), 1);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["session"]["token"], "123456");
    assert_eq!(raw["session"]["cookies_str"], "slave_sid=abc; slave_user=gh_1");
    assert_eq!(raw["sources"][0]["id"], "wechat_MzA_campus");
    assert_eq!(raw["sources"][0]["biz"], "MzA_campus");
    assert_eq!(raw["sources"][0]["name"], "Campus News");
    assert_eq!(raw["sources"][0]["count"], 10);
    assert_eq!(raw["sources"][0]["wx_cfg"]["user_agent"], "TestAgent/1.0");
}

#[tokio::test]
async fn test_reregistration_keeps_one_record() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "A",
        json!([{"fakeid": "biz_a", "nickname": "A"}]),
    )
    .await;
    mount_search(
        &server,
        "A renamed",
        json!([{"fakeid": "biz_a", "nickname": "A renamed"}]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("wechat.json"));
    let provider = SessionProvider::new(Some(session()), dir.path().join("cookies.json"));
    let client = client_for(&server);

    let mut registry = SourceRegistry::default();
    register_sources(&parse_names("A"), 10, &provider, &client, &mut registry, &store)
        .await
        .unwrap();

    // A later run starts from the persisted document
    let mut registry = SourceRegistry::from_document(store.load(), RegistryPolicy::default());
    register_sources(
        &parse_names("A renamed"),
        20,
        &provider,
        &client,
        &mut registry,
        &store,
    )
    .await
    .unwrap();

    let doc = store.load();
    assert_eq!(doc.sources.len(), 1);
    assert_eq!(doc.sources[0].id, "wechat_biz_a");
    assert_eq!(doc.sources[0].name, "A renamed");
    assert_eq!(doc.sources[0].fetch_count, 20);
}

#[tokio::test]
async fn test_upstream_error_skips_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/searchbiz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base_resp": {"ret": 200013, "err_msg": "freq control"}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("wechat.json"));
    let provider = SessionProvider::new(Some(session()), dir.path().join("cookies.json"));
    let mut registry = SourceRegistry::default();

    let report = register_sources(
        &parse_names("A"),
        10,
        &provider,
        &client_for(&server),
        &mut registry,
        &store,
    )
    .await
    .unwrap();

    assert!(report.is_empty());
    assert!(report.skipped[0].1.contains("200013"));
    assert!(!store.path().exists());
}

#[tokio::test]
async fn test_session_headers_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cgi-bin/searchbiz"))
        .and(header("cookie", "slave_sid=abc; slave_user=gh_1"))
        .and(header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base_resp": {"ret": 0},
            "list": [{"fakeid": "biz_h", "nickname": "H"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = ConfigStore::new(dir.path().join("wechat.json"));
    let provider = SessionProvider::new(Some(session()), dir.path().join("cookies.json"));
    let mut registry = SourceRegistry::default();

    let report = register_sources(
        &parse_names("H"),
        10,
        &provider,
        &client_for(&server),
        &mut registry,
        &store,
    )
    .await
    .unwrap();

    assert_eq!(report.added_ids, vec!["wechat_biz_h"]);
}

#[tokio::test]
async fn test_session_priority() {
    let dir = TempDir::new().unwrap();
    let credential_path = dir.path().join("cfg/cookies.json");
    let file_session = Session::new(Some("from-file".to_string()), None, None);
    CredentialFile::new(&credential_path)
        .save(&file_session)
        .unwrap();

    let login = Arc::new(FixedLogin(Session::new(
        Some("from-login".to_string()),
        None,
        None,
    )));

    // Persisted wins over everything
    let provider = SessionProvider::new(Some(session()), &credential_path).with_login(login.clone());
    let (resolved, origin) = provider.resolve_with_origin().await.unwrap();
    assert_eq!(origin, SessionOrigin::Persisted);
    assert_eq!(resolved, session());

    // An unusable persisted session falls through to the file
    let provider =
        SessionProvider::new(Some(Session::default()), &credential_path).with_login(login.clone());
    let (resolved, origin) = provider.resolve_with_origin().await.unwrap();
    assert_eq!(origin, SessionOrigin::CredentialFile);
    assert_eq!(resolved, file_session);

    // Without a file, the login runs and its result is saved
    std::fs::remove_file(&credential_path).unwrap();
    let provider = SessionProvider::new(None, &credential_path).with_login(login);
    let (resolved, origin) = provider.resolve_with_origin().await.unwrap();
    assert_eq!(origin, SessionOrigin::InteractiveLogin);
    assert_eq!(resolved.token.as_deref(), Some("from-login"));
    assert_eq!(
        CredentialFile::new(&credential_path).load(),
        Some(resolved)
    );

    // Nothing at all
    let empty_dir = TempDir::new().unwrap();
    let provider = SessionProvider::new(None, empty_dir.path().join("cookies.json"));
    assert!(matches!(
        provider.resolve().await,
        Err(WxError::NoSessionAvailable { .. })
    ));
}

#[tokio::test]
async fn test_corrupt_document_starts_empty_then_overwrites() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wechat.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = ConfigStore::new(&path);
    let mut registry = SourceRegistry::from_document(store.load(), RegistryPolicy::default());
    assert!(registry.is_empty());

    let record =
        wechat_sources::registry::build_source_record("A", "biz_a", &session(), 10);
    registry.commit(vec![record], &session(), &store).unwrap();

    let doc = store.load();
    assert_eq!(doc.sources.len(), 1);
    assert_eq!(doc.session, session());
}
