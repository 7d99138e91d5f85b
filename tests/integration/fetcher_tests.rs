//! Bounded fetcher against mock servers

use crate::common::*;
use lead_ripple::crawler::FetchError;
use lead_ripple::state::{Budget, CircuitState};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_html_page() {
    let server = MockServer::start().await;
    mount(&server, "/", html("<html><body>Hello</body></html>")).await;

    let config = test_config();
    let breaker = breaker_for(&config);
    let fetcher = fetcher_for(&config, breaker.clone());
    let mut budget = budget();

    let page = fetcher.fetch(&server.uri(), &mut budget).await.unwrap();

    assert!(page.body.contains("Hello"));
    assert_eq!(page.status_code, 200);
    assert!(!page.truncated);
    assert_eq!(page.final_url.path(), "/");
    assert_eq!(budget.fetches_used(), 1);
    assert_eq!(breaker.state_of(MOCK_HOST), CircuitState::Closed);
}

#[tokio::test]
async fn test_sends_identifying_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header(
            "user-agent",
            "Mozilla/5.0 (compatible; TestBot/1.0.0; +https://example.com/bot)",
        ))
        .respond_with(html("<p>hi</p>"))
        .mount(&server)
        .await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));

    assert!(fetcher.fetch(&server.uri(), &mut budget()).await.is_ok());
}

#[tokio::test]
async fn test_rejects_non_markup_content() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/menu.pdf",
        ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
    )
    .await;

    let config = test_config();
    let breaker = breaker_for(&config);
    let fetcher = fetcher_for(&config, breaker.clone());

    let result = fetcher
        .fetch(&format!("{}/menu.pdf", server.uri()), &mut budget())
        .await;

    assert!(matches!(result, Err(FetchError::ContentType { .. })));
    assert_eq!(breaker.snapshot(MOCK_HOST).unwrap().consecutive_failures, 1);
}

#[tokio::test]
async fn test_text_fetch_accepts_plain_text() {
    let server = MockServer::start().await;
    mount(&server, "/robots.txt", plain("User-agent: *\nAllow: /")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let url = format!("{}/robots.txt", server.uri());

    let page = fetcher.fetch_text(&url, &mut budget()).await.unwrap();
    assert!(page.body.starts_with("User-agent"));

    let result = fetcher.fetch(&url, &mut budget()).await;
    assert!(matches!(result, Err(FetchError::ContentType { .. })));
}

#[tokio::test]
async fn test_body_truncated_at_cap() {
    let server = MockServer::start().await;
    let body = format!("<html><body>{}</body></html>", "x".repeat(20_000));
    mount(&server, "/", html(body)).await;

    let mut config = test_config();
    config.fetcher.max_body_bytes = 2048;
    let breaker = breaker_for(&config);
    let fetcher = fetcher_for(&config, breaker.clone());

    let page = fetcher.fetch(&server.uri(), &mut budget()).await.unwrap();

    assert!(page.truncated);
    assert_eq!(page.body.len(), 2048);
    assert!(page.body.starts_with("<html><body>xxx"));
    assert_eq!(breaker.state_of(MOCK_HOST), CircuitState::Closed);
}

#[tokio::test]
async fn test_follows_redirects() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/old",
        ResponseTemplate::new(301).insert_header("location", "/new"),
    )
    .await;
    mount(&server, "/new", html("<p>moved here</p>")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let mut budget = budget();

    let page = fetcher
        .fetch(&format!("{}/old", server.uri()), &mut budget)
        .await
        .unwrap();

    assert_eq!(page.final_url.path(), "/new");
    assert!(page.body.contains("moved here"));
    assert_eq!(budget.fetches_used(), 1);
}

#[tokio::test]
async fn test_retries_transient_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount(&server, "/", html("<p>back up</p>")).await;

    let config = test_config();
    let breaker = breaker_for(&config);
    let fetcher = fetcher_for(&config, breaker.clone());
    let mut budget = budget();

    let page = fetcher.fetch(&server.uri(), &mut budget).await.unwrap();

    assert!(page.body.contains("back up"));
    assert_eq!(request_count(&server).await, 3);
    assert_eq!(budget.fetches_used(), 1);
    assert_eq!(breaker.state_of(MOCK_HOST), CircuitState::Closed);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;

    let mut config = test_config();
    config.fetcher.max_retries = 2;
    let fetcher = fetcher_for(&config, breaker_for(&config));

    let result = fetcher.fetch(&server.uri(), &mut budget()).await;

    assert_eq!(result.unwrap_err(), FetchError::Status { code: 500 });
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_retry_after_beyond_deadline_not_awaited() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        ResponseTemplate::new(429).insert_header("retry-after", "120"),
    )
    .await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let mut budget = Budget::new(8, Duration::from_secs(5));

    let started = std::time::Instant::now();
    let result = fetcher.fetch(&server.uri(), &mut budget).await;

    assert_eq!(result.unwrap_err(), FetchError::Status { code: 429 });
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_breaker_opens_after_two_failures() {
    let server = MockServer::start().await;

    let mut config = test_config();
    config.breaker.failure_threshold = 2;
    let breaker = breaker_for(&config);
    let fetcher = fetcher_for(&config, breaker.clone());
    let mut budget = budget();
    let url = format!("{}/missing", server.uri());

    for _ in 0..2 {
        let result = fetcher.fetch(&url, &mut budget).await;
        assert_eq!(result.unwrap_err(), FetchError::Status { code: 404 });
    }
    assert_eq!(breaker.state_of(MOCK_HOST), CircuitState::Open);

    let result = fetcher.fetch(&url, &mut budget).await;
    assert!(matches!(result, Err(FetchError::HostBackoff { .. })));
    assert_eq!(request_count(&server).await, 2);
    assert_eq!(budget.fetches_used(), 2);
}

#[tokio::test]
async fn test_zero_budget_makes_no_request() {
    let server = MockServer::start().await;
    mount(&server, "/", html("<p>unused</p>")).await;

    let config = test_config();
    let breaker = breaker_for(&config);
    let fetcher = fetcher_for(&config, breaker.clone());
    let mut budget = Budget::new(0, Duration::from_secs(30));

    let result = fetcher.fetch(&server.uri(), &mut budget).await;

    assert_eq!(result.unwrap_err(), FetchError::BudgetExhausted);
    assert_eq!(request_count(&server).await, 0);
    assert!(breaker.snapshot(MOCK_HOST).is_none());
}

#[tokio::test]
async fn test_slow_response_cut_at_deadline() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/",
        html("<p>late</p>").set_delay(Duration::from_secs(10)),
    )
    .await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let mut budget = Budget::new(8, Duration::from_millis(500));

    let started = std::time::Instant::now();
    let result = fetcher.fetch(&server.uri(), &mut budget).await;

    assert_eq!(result.unwrap_err(), FetchError::Timeout);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(budget.is_expired());
}
