//! Shared helpers for integration tests

#![allow(dead_code)]

use lead_ripple::config::{parse_config, Config};
use lead_ripple::crawler::Fetcher;
use lead_ripple::state::{Budget, HostCircuitBreaker};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Every mock server shares this breaker key
pub const MOCK_HOST: &str = "127.0.0.1";

/// A configuration tuned for fast tests
///
/// Throttling is off and the breaker tolerates many failures, since every
/// mock server lives on the same host and unmatched paths return 404.
pub fn test_config() -> Config {
    let mut config = parse_config(
        r#"
        [enrich]
        throttle-ms = 0

        [fetcher]
        retry-backoff-ms = 10

        [breaker]
        failure-threshold = 50

        [user-agent]
        crawler-name = "TestBot"
        crawler-version = "1.0.0"
        contact-url = "https://example.com/bot"

        [io]
        input-path = "in.csv"
        output-path = "out.csv"
        "#,
    )
    .expect("test config parses");
    config.enrich.record_deadline_secs = 30;
    config
}

pub fn breaker_for(config: &Config) -> Arc<HostCircuitBreaker> {
    Arc::new(HostCircuitBreaker::from_config(&config.breaker))
}

pub fn fetcher_for(config: &Config, breaker: Arc<HostCircuitBreaker>) -> Fetcher {
    Fetcher::from_config(config, breaker).expect("client builds")
}

pub fn budget() -> Budget {
    Budget::new(8, Duration::from_secs(30))
}

pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into().into_bytes(), "text/html; charset=utf-8")
}

pub fn plain(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into().into_bytes(), "text/plain")
}

pub fn xml(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into().into_bytes(), "application/xml")
}

/// Mounts a GET handler for one path
pub async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Number of requests the server has received
pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

/// Number of requests the server has received for one path
pub async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.iter().filter(|r| r.url.path() == route).count())
        .unwrap_or(0)
}
