//! End-to-end enrichment of single records against mock sites

use crate::common::*;
use lead_ripple::config::Config;
use lead_ripple::crawler::Enricher;
use lead_ripple::record::Record;
use lead_ripple::state::{CircuitState, HostCircuitBreaker};
use std::sync::Arc;
use wiremock::{MockServer, ResponseTemplate};

const HOME: &str = r#"<!doctype html>
<html>
<head>
  <script src="https://cdn.shopify.com/s/theme.js"></script>
  <script async src="https://www.googletagmanager.com/gtag/js?id=G-ABC123XYZ"></script>
</head>
<body>
  <nav><a href="/beers">Beers</a> <a href="/contact-us">Contact Us</a></nav>
  <p>Hop Yard is a family-run brewery and taproom pouring small-batch ales,
     crisp lagers and seasonal sours brewed on site since the old mill reopened.</p>
  <a href="https://www.instagram.com/hopyard/?hl=en">Instagram</a>
  <a href="mailto:owner@gmail.com">Write to the owner</a>
  <footer>Call the taproom: (503) 222-1234</footer>
</body>
</html>"#;

const CONTACT: &str = r#"<html><body>
  <a href="tel:+1 212 867 5309">Call</a>
  <a href="mailto:info@hopyard.example?subject=Hi">info@hopyard.example</a>
</body></html>"#;

async fn brewery_site() -> MockServer {
    let server = MockServer::start().await;
    mount(&server, "/", html(HOME)).await;
    mount(&server, "/contact-us", html(CONTACT)).await;
    server
}

fn enricher(config: &Config, breaker: Arc<HostCircuitBreaker>) -> Enricher {
    Enricher::from_config(config, breaker).expect("client builds")
}

fn record_for(website: &str) -> Record {
    Record {
        business_name: "hop yard brewing".to_string(),
        website: website.to_string(),
        city: "portland".to_string(),
        state: "or".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_enriches_from_homepage_and_contact_page() {
    let server = brewery_site().await;
    let config = test_config();
    let enricher = enricher(&config, breaker_for(&config));

    let record = enricher.enrich(record_for(&server.uri())).await;

    assert_eq!(record.notes, "enriched");
    assert_eq!(record.business_name, "Hop Yard Brewing");
    assert_eq!(record.city, "Portland");
    assert_eq!(record.state, "OR");
    assert_eq!(record.website, format!("{}/", server.uri()));
    assert_eq!(record.email, "info@hopyard.example;owner@gmail.com");
    assert_eq!(record.email_status, "business-priority");
    assert_eq!(record.phone, "+1-212-867-5309;+1-503-222-1234");
    assert_eq!(record.instagram, "https://instagram.com/hopyard/");
    assert_eq!(record.instagram_handle, "@hopyard");
    assert_eq!(record.contact_page_url, format!("{}/contact-us", server.uri()));
    assert_eq!(record.tech_stack, "shopify");
    assert_eq!(record.analytics_ids, "G-ABC123XYZ");
    assert_eq!(record.fb_pixel, "no");
    assert!(record.about_text_excerpt.starts_with("Hop Yard is a family-run brewery"));
    assert_eq!(record.lead_score, 4);
    assert_eq!(record.lead_grade, "A");
}

#[tokio::test]
async fn test_identical_content_gives_identical_records() {
    let server = brewery_site().await;
    let config = test_config();

    let first = enricher(&config, breaker_for(&config))
        .enrich(record_for(&server.uri()))
        .await;
    let second = enricher(&config, breaker_for(&config))
        .enrich(record_for(&server.uri()))
        .await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_homepage_failure_keeps_record() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;

    let mut config = test_config();
    config.fetcher.max_retries = 0;
    let breaker = breaker_for(&config);
    let enricher = enricher(&config, breaker.clone());

    let mut input = record_for(&server.uri());
    input.phone = "503.222.1234".to_string();
    let record = enricher.enrich(input).await;

    assert_eq!(record.notes, "fetch_failed");
    assert_eq!(record.phone, "+1-503-222-1234");
    assert_eq!(record.email_status, "missing");
    assert_eq!(breaker.snapshot(MOCK_HOST).unwrap().consecutive_failures, 1);
}

#[tokio::test]
async fn test_failing_host_goes_into_backoff() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;

    let mut config = test_config();
    config.fetcher.max_retries = 0;
    config.breaker.failure_threshold = 2;
    let breaker = breaker_for(&config);
    let enricher = enricher(&config, breaker.clone());

    let first = enricher.enrich(record_for(&server.uri())).await;
    let second = enricher.enrich(record_for(&server.uri())).await;
    assert_eq!(first.notes, "fetch_failed");
    assert_eq!(second.notes, "fetch_failed");
    assert_eq!(breaker.state_of(MOCK_HOST), CircuitState::Open);

    let third = enricher.enrich(record_for(&server.uri())).await;
    assert_eq!(third.notes, "host_backoff");
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_fetch_ceiling_keeps_homepage_fields() {
    let server = brewery_site().await;

    let mut config = test_config();
    config.enrich.max_fetches_per_record = 1;
    let enricher = enricher(&config, breaker_for(&config));

    let record = enricher.enrich(record_for(&server.uri())).await;

    assert_eq!(record.notes, "row_fetch_budget_exhausted");
    assert_eq!(record.email, "owner@gmail.com");
    assert_eq!(record.email_status, "generic");
    assert_eq!(record.phone, "+1-503-222-1234");
    assert_eq!(record.instagram_handle, "@hopyard");
    assert_eq!(record.contact_page_url, format!("{}/contact-us", server.uri()));
    assert_eq!(requests_to(&server, "/contact-us").await, 0);
}

#[tokio::test]
async fn test_existing_notes_preserved() {
    let server = brewery_site().await;
    let config = test_config();
    let enricher = enricher(&config, breaker_for(&config));

    let mut input = record_for(&server.uri());
    input.notes = "imported from osm".to_string();
    let record = enricher.enrich(input).await;

    assert_eq!(record.notes, "imported from osm; enriched");
}

#[tokio::test]
async fn test_bare_domain_website() {
    let server = brewery_site().await;
    let config = test_config();
    let enricher = enricher(&config, breaker_for(&config));

    let bare = server.uri().trim_start_matches("http://").to_string();
    let record = enricher.enrich(record_for(&bare)).await;

    assert_eq!(record.notes, "enriched");
    assert_eq!(record.tech_stack, "shopify");
}
