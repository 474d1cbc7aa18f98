//! Integration tests for the crawler
//!
//! These tests run full crawl sessions against wiremock servers: one acting
//! as the crawled site, one as the contact-extraction API. Extraction
//! replies are routed by marker text planted in the site's contact blocks,
//! which ends up embedded in the extraction prompt.

use leadscout::config::Config;
use leadscout::extraction::OpenAiExtractor;
use leadscout::session::SessionStatus;
use leadscout::store::open_store;
use leadscout::{CrawlRequest, CrawlService, CrawlSession};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_reply(payload: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": payload}}]
    })
}

/// Routes one extraction reply by marker text appearing in the prompt
async fn mount_extraction(server: &MockServer, marker: &str, payload: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(marker))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(payload)))
        .mount(server)
        .await;
}

/// Fallback extraction reply: no contacts found
async fn mount_extraction_default(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("[]")))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

struct Harness {
    service: CrawlService,
    _db_dir: TempDir,
}

impl Harness {
    fn new(extractor_uri: &str) -> Self {
        let db_dir = TempDir::new().expect("temp dir");
        let db_path = db_dir.path().join("sessions.db");

        let mut config = Config::default();
        config.crawler.fetch_delay_ms = 0;
        config.crawler.request_timeout_secs = 5;
        config.store.database_path = db_path.display().to_string();

        let store = open_store(&db_path).expect("open store");
        let extractor = Arc::new(
            OpenAiExtractor::from_parts(
                extractor_uri,
                "gpt-4o-mini",
                "test-key",
                Duration::from_secs(5),
            )
            .expect("extractor"),
        );
        let service = CrawlService::new(&config, store, extractor).expect("service");

        Self {
            service,
            _db_dir: db_dir,
        }
    }

    async fn run_crawl(&self, start_url: &str, depth: u32, max_pages: u32) -> CrawlSession {
        let session_id = self
            .service
            .start_crawl(CrawlRequest {
                owner_id: "owner-1".to_string(),
                start_url: start_url.to_string(),
                depth,
                max_pages,
            })
            .expect("start crawl");

        self.service.wait(&session_id).await;
        self.service
            .get_results("owner-1", &session_id)
            .expect("session exists")
    }
}

fn assert_logs_contiguous(session: &CrawlSession) {
    let keys: Vec<u32> = session.logs.keys().copied().collect();
    let expected: Vec<u32> = (1..=keys.len() as u32).collect();
    assert_eq!(keys, expected, "log ordinals must form 1..K with no gaps");
}

#[tokio::test]
async fn test_single_site_crawl_skips_cross_host_link() {
    let site = MockServer::start().await;
    let other_site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_extraction_default(&api).await;

    // Root page: one same-host link, one cross-host link
    mount_page(
        &site,
        "/",
        format!(
            r#"<html><body>
            <a href="{}/team">Team</a>
            <a href="{}/leaked">Elsewhere</a>
            </body></html>"#,
            site.uri(),
            other_site.uri()
        ),
    )
    .await;
    mount_page(&site, "/team", "<html><body>Our team</body></html>".into()).await;

    // The cross-host page must never be fetched
    Mock::given(method("GET"))
        .and(path("/leaked"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&other_site)
        .await;

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 1, 2).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress.pages_visited, 2);
    assert!(session.end_time.is_some());
    assert_logs_contiguous(&session);
}

#[tokio::test]
async fn test_page_budget_is_never_exceeded() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_extraction_default(&api).await;

    // Densely connected: every page links to five others
    let base = site.uri();
    let links: String = (1..=5)
        .map(|i| format!(r#"<a href="{base}/p{i}">p{i}</a>"#))
        .collect();
    mount_page(&site, "/", format!("<html><body>{links}</body></html>")).await;
    for i in 1..=5 {
        mount_page(
            &site,
            &format!("/p{i}"),
            format!("<html><body>{links}</body></html>"),
        )
        .await;
    }

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 3, 3).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress.pages_visited, 3);
    assert!(session
        .logs
        .values()
        .any(|line| line.starts_with("MaxPagesReached:")));
    assert_logs_contiguous(&session);
}

#[tokio::test]
async fn test_depth_bound_stops_deep_chains() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_extraction_default(&api).await;

    let base = site.uri();
    mount_page(
        &site,
        "/",
        format!(r#"<html><body><a href="{base}/l1">l1</a></body></html>"#),
    )
    .await;
    mount_page(
        &site,
        "/l1",
        format!(r#"<html><body><a href="{base}/l2">l2</a></body></html>"#),
    )
    .await;

    // Two hops from the start URL with depth 1: never fetched
    Mock::given(method("GET"))
        .and(path("/l2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&site)
        .await;

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 1, 10).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress.pages_visited, 2);
}

#[tokio::test]
async fn test_diamond_graph_fetches_shared_page_once() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_extraction_default(&api).await;

    let base = site.uri();
    mount_page(
        &site,
        "/",
        format!(
            r#"<html><body><a href="{base}/a">a</a><a href="{base}/b">b</a></body></html>"#
        ),
    )
    .await;
    mount_page(
        &site,
        "/a",
        format!(r#"<html><body><a href="{base}/c">c</a></body></html>"#),
    )
    .await;
    mount_page(
        &site,
        "/b",
        format!(r#"<html><body><a href="{base}/c">c</a></body></html>"#),
    )
    .await;

    // Reachable via two paths, fetched at most once
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>c</body></html>"))
        .expect(1)
        .mount(&site)
        .await;

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 2, 10).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.progress.pages_visited, 4);
}

#[tokio::test]
async fn test_fetch_failure_is_branch_local() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_extraction_default(&api).await;

    let base = site.uri();
    mount_page(
        &site,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/broken">broken</a>
            <a href="{base}/ok">ok</a>
            </body></html>"#
        ),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site)
        .await;

    // The sibling discovered from the same parent is still visited
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>ok</body></html>"))
        .expect(1)
        .mount(&site)
        .await;

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 1, 10).await;

    assert_eq!(session.status, SessionStatus::Completed);
    // The failed page still counts as visited
    assert_eq!(session.progress.pages_visited, 3);
    assert!(session
        .logs
        .values()
        .any(|line| line.contains("/broken") && line.contains("Error:")));
    assert_logs_contiguous(&session);
}

#[tokio::test]
async fn test_malformed_extraction_reply_is_branch_local() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    // The page marked "contact bravo" gets a non-JSON reply; everything else
    // extracts cleanly.
    mount_extraction(&api, "contact bravo", "not json").await;
    mount_extraction(
        &api,
        "contact alpha",
        r#"[{"name": "Alpha", "email": "alpha@example.test"}]"#,
    )
    .await;
    mount_extraction_default(&api).await;

    let base = site.uri();
    mount_page(
        &site,
        "/",
        format!(
            r#"<html><body>
            <a href="{base}/bad">bad</a>
            <a href="{base}/good">good</a>
            </body></html>"#
        ),
    )
    .await;
    mount_page(
        &site,
        "/bad",
        format!(
            r#"<html><body><p>contact bravo</p>
            <a href="{base}/bad-child">child</a></body></html>"#
        ),
    )
    .await;
    mount_page(
        &site,
        "/good",
        "<html><body><p>contact alpha</p></body></html>".into(),
    )
    .await;

    // The failed branch is abandoned: its links are not followed
    Mock::given(method("GET"))
        .and(path("/bad-child"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&site)
        .await;

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 2, 10).await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session
        .logs
        .values()
        .any(|line| line.starts_with("JSON Parse Error:")));
    // Only the clean page contributed contacts
    assert_eq!(session.contacts.len(), 1);
    assert_eq!(session.contacts[0].name, "Alpha");
    assert_logs_contiguous(&session);
}

#[tokio::test]
async fn test_final_dedup_is_case_and_whitespace_insensitive() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;

    mount_extraction(
        &api,
        "contact roster one",
        r#"[{"name": "A", "email": "a@x.com"}]"#,
    )
    .await;
    mount_extraction(
        &api,
        "contact roster two",
        r#"[{"name": "A2", "email": "A@X.com "}, {"name": "B", "email": "b@x.com"}]"#,
    )
    .await;
    mount_extraction_default(&api).await;

    let base = site.uri();
    mount_page(
        &site,
        "/",
        format!(
            r#"<html><body><p>contact roster one</p>
            <a href="{base}/dup">more</a></body></html>"#
        ),
    )
    .await;
    mount_page(
        &site,
        "/dup",
        "<html><body><p>contact roster two</p></body></html>".into(),
    )
    .await;

    let harness = Harness::new(&api.uri());
    let session = harness.run_crawl(&format!("{}/", site.uri()), 1, 10).await;

    assert_eq!(session.status, SessionStatus::Completed);
    // The raw contact history keeps all three records
    assert_eq!(session.contacts.len(), 3);
    assert_eq!(session.progress.total_contacts, 3);
    // a@x.com and "A@X.com " collapse to one
    assert_eq!(session.progress.unique_contacts, 2);

    let last = session.logs.values().last().unwrap();
    assert!(last.contains("FinalResults"));
    assert!(last.contains("UniqueContacts: 2"));
}

#[tokio::test]
async fn test_poller_sees_lifecycle_and_listing() {
    let site = MockServer::start().await;
    let api = MockServer::start().await;
    mount_extraction_default(&api).await;
    mount_page(&site, "/", "<html><body>quiet page</body></html>".into()).await;

    let harness = Harness::new(&api.uri());

    let first = harness.run_crawl(&format!("{}/", site.uri()), 0, 5).await;
    let second = harness.run_crawl(&format!("{}/", site.uri()), 0, 5).await;

    assert_eq!(first.status, SessionStatus::Completed);
    assert_eq!(second.status, SessionStatus::Completed);

    // Newest first, paginated
    let jobs = harness.service.list_jobs("owner-1", 1, 1).unwrap();
    assert_eq!(jobs.total, 2);
    assert_eq!(jobs.total_pages, 2);
    assert_eq!(jobs.items.len(), 1);
    assert_eq!(jobs.items[0].session_id, second.session_id);

    // Deletion distinguishes not-found
    harness
        .service
        .delete_session("owner-1", &first.session_id)
        .unwrap();
    assert!(harness
        .service
        .delete_session("owner-1", &first.session_id)
        .is_err());
}
