//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the admin console and run
//! crawl passes end-to-end, including article storage.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wechat_sources::api::{handle_crawl_request, handle_single_request, CrawlRequest, SingleRequest};
use wechat_sources::crawler::FetchPolicy;
use wechat_sources::platform::{ArticleFetcher, MpClient};
use wechat_sources::registry::build_source_record;
use wechat_sources::storage::{CrawlTrigger, SqliteStore};
use wechat_sources::{CrawlOrchestrator, Session, SourceOutcome, SourceRegistry};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> Session {
    Session::new(Some("123456".to_string()), Some("k=v".to_string()), None)
}

fn quick_policy() -> FetchPolicy {
    FetchPolicy {
        request_timeout: Duration::from_secs(5),
        max_retries: 1,
        retry_delay: Duration::from_millis(10),
    }
}

fn registry_with(keys: &[&str]) -> SourceRegistry {
    let mut registry = SourceRegistry::default();
    let records = keys
        .iter()
        .map(|key| build_source_record(&format!("Account {}", key), key, &session(), 2))
        .collect();
    registry.merge(records, &session());
    registry
}

async fn mount_articles(server: &MockServer, fakeid: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/appmsg"))
        .and(query_param("action", "list_ex"))
        .and(query_param("fakeid", fakeid))
        .and(query_param("count", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base_resp": {"ret": 0, "err_msg": "ok"},
            "app_msg_list": [
                {
                    "aid": format!("{}_1", fakeid),
                    "title": "First",
                    "link": format!("https://mp.weixin.qq.com/s/{}1", fakeid),
                    "digest": "one",
                    "cover": "",
                    "create_time": 1700000000
                },
                {
                    "aid": format!("{}_2", fakeid),
                    "title": "Second",
                    "link": format!("https://mp.weixin.qq.com/s/{}2", fakeid),
                    "create_time": 1700000100
                }
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_client_lists_articles() {
    let server = MockServer::start().await;
    mount_articles(&server, "biz_a").await;

    let client = MpClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let registry = registry_with(&["biz_a"]);
    let record = registry.get("wechat_biz_a").unwrap();

    let articles = client.fetch(record).await.unwrap();
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].title, "First");
    assert_eq!(articles[0].cover, None);
    assert_eq!(articles[1].published_at, 1_700_000_100);
}

#[tokio::test]
async fn test_failure_isolation_and_storage() {
    let server = MockServer::start().await;
    mount_articles(&server, "biz_ok").await;

    // Expired session for one account
    Mock::given(method("GET"))
        .and(path("/cgi-bin/appmsg"))
        .and(query_param("fakeid", "biz_expired"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "base_resp": {"ret": 200003, "err_msg": "invalid session"}
        })))
        .mount(&server)
        .await;

    // Server error for another; retried once, then reported
    Mock::given(method("GET"))
        .and(path("/cgi-bin/appmsg"))
        .and(query_param("fakeid", "biz_down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let client = MpClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let orchestrator =
        CrawlOrchestrator::new(Arc::new(client), quick_policy()).with_sink(store.clone());

    let registry = registry_with(&["biz_ok", "biz_expired", "biz_down"]);
    let report = orchestrator.run(&registry, &registry.ids()).await;

    assert_eq!(report.len(), 3);
    assert_eq!(report.trigger, CrawlTrigger::Manual);
    assert_eq!(report.get("wechat_biz_ok").unwrap().item_count(), Some(2));

    let expired = report.get("wechat_biz_expired").unwrap();
    assert!(!expired.is_success());
    assert!(expired.error().unwrap().contains("200003"));

    let down = report.get("wechat_biz_down").unwrap();
    assert!(matches!(down, SourceOutcome::Failed { .. }));
    assert!(down.error().unwrap().contains("after 2 attempts"));

    assert_eq!(store.count_articles(None).unwrap(), 2);
    assert_eq!(store.count_articles(Some("wechat_biz_ok")).unwrap(), 2);

    let run = store.latest_run().unwrap().unwrap();
    assert_eq!(run.succeeded, 1);
    assert_eq!(run.failed, 2);
}

#[tokio::test]
async fn test_recrawl_does_not_duplicate_articles() {
    let server = MockServer::start().await;
    mount_articles(&server, "biz_a").await;

    let client = MpClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let orchestrator =
        CrawlOrchestrator::new(Arc::new(client), quick_policy()).with_sink(store.clone());
    let registry = registry_with(&["biz_a"]);

    orchestrator.run(&registry, &registry.ids()).await;
    orchestrator.run(&registry, &registry.ids()).await;

    assert_eq!(store.count_articles(None).unwrap(), 2);
}

#[tokio::test]
async fn test_crawl_request_all() {
    let server = MockServer::start().await;
    mount_articles(&server, "biz_a").await;
    mount_articles(&server, "biz_b").await;

    let client = MpClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let orchestrator = CrawlOrchestrator::new(Arc::new(client), quick_policy());
    let registry = registry_with(&["biz_a", "biz_b"]);

    let response = handle_crawl_request(&registry, &orchestrator, &CrawlRequest::all())
        .await
        .unwrap();

    assert_eq!(response.code, "200");
    assert_eq!(response.data.len(), 4);
    assert!(response.errors.is_empty());
    assert!(response
        .data
        .iter()
        .any(|item| item["source_id"] == "wechat_biz_b" && item["title"] == "Second"));
}

#[tokio::test]
async fn test_single_article_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><title>fallback</title></head><body>
                <h1 id="activity-name"> Spring Festival Notice </h1>
                <a id="js_name">Campus News</a>
                <div id="js_content"><p>Classes resume</p><p>on Monday.</p></div>
            </body></html>"#,
        ))
        .mount(&server)
        .await;

    let client = MpClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let request = SingleRequest {
        url: format!("{}/s/abc", server.uri()),
    };

    let response = handle_single_request(&client, &request).await.unwrap();
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0]["title"], "Spring Festival Notice");
    assert_eq!(response.data[0]["account"], "Campus News");
    assert!(response.data[0]["content"]
        .as_str()
        .unwrap()
        .contains("Classes resume"));
}
