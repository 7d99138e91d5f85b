//! Contact page discovery against mock sites

use crate::common::*;
use lead_ripple::crawler::discover_contact_page;
use lead_ripple::extract::PageExtract;
use lead_ripple::state::Budget;
use std::time::Duration;
use url::Url;
use wiremock::MockServer;

fn home_of(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}

#[tokio::test]
async fn test_uses_homepage_contact_link() {
    let server = MockServer::start().await;
    mount(&server, "/reach-us", html("<p>Call us</p>")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse(
        r#"<a href="/beers">Beers</a><a href="/reach-us">Contact</a>"#,
        &home_url,
    );
    let mut budget = budget();

    let found = discover_contact_page(&fetcher, &home_url, &home, &mut budget, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(found.url.path(), "/reach-us");
    assert!(found.page.unwrap().body.contains("Call us"));
    assert_eq!(budget.fetches_used(), 1);
}

#[tokio::test]
async fn test_contact_link_recorded_even_when_fetch_fails() {
    let server = MockServer::start().await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse(r#"<a href="/contact">Contact</a>"#, &home_url);

    let found = discover_contact_page(&fetcher, &home_url, &home, &mut budget(), Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(found.url.path(), "/contact");
    assert!(found.page.is_none());
}

#[tokio::test]
async fn test_age_gate_probes_known_paths() {
    let server = MockServer::start().await;
    mount(&server, "/contact-us", html("<p>Visit the taproom</p>")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse("<h1>Are you over 21?</h1><button>Yes</button>", &home_url);
    assert!(home.age_gate);
    let mut budget = budget();

    let found = discover_contact_page(&fetcher, &home_url, &home, &mut budget, Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(found.url.path(), "/contact-us");
    assert!(found.page.is_some());
    // "/contact" and "/contact/" miss first
    assert_eq!(budget.fetches_used(), 3);
    assert_eq!(requests_to(&server, "/robots.txt").await, 0);
}

#[tokio::test]
async fn test_finds_contact_page_in_robots_sitemap() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount(
        &server,
        "/robots.txt",
        plain(format!(
            "User-agent: *\nDisallow: /cart\nSitemap: {}/sitemap-pages.xml # pages\n",
            uri
        )),
    )
    .await;
    mount(
        &server,
        "/sitemap-pages.xml",
        xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>{uri}/beers/</loc></url>
              <url><loc>{uri}/visit/</loc></url>
            </urlset>"#
        )),
    )
    .await;
    mount(&server, "/visit/", html("<p>Open daily</p>")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse("<p>Welcome</p>", &home_url);

    let found = discover_contact_page(&fetcher, &home_url, &home, &mut budget(), Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(found.url.path(), "/visit/");
    assert!(found.page.unwrap().body.contains("Open daily"));
    assert_eq!(requests_to(&server, "/sitemap.xml").await, 0);
}

#[tokio::test]
async fn test_falls_back_to_default_sitemap() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/sitemap.xml",
        xml(format!(
            "<urlset><url><loc>{}/pages/contact</loc></url></urlset>",
            server.uri()
        )),
    )
    .await;
    mount(&server, "/pages/contact", html("<p>Email us</p>")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse("<p>Welcome</p>", &home_url);

    let found = discover_contact_page(&fetcher, &home_url, &home, &mut budget(), Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(found.url.path(), "/pages/contact");
    assert_eq!(requests_to(&server, "/robots.txt").await, 1);
}

#[tokio::test]
async fn test_nothing_found() {
    let server = MockServer::start().await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse("<p>Welcome</p>", &home_url);

    let found =
        discover_contact_page(&fetcher, &home_url, &home, &mut budget(), Duration::ZERO).await;

    assert!(found.is_none());
}

#[tokio::test]
async fn test_spent_budget_stops_discovery() {
    let server = MockServer::start().await;
    mount(&server, "/contact", html("<p>unused</p>")).await;

    let config = test_config();
    let fetcher = fetcher_for(&config, breaker_for(&config));
    let home_url = home_of(&server);
    let home = PageExtract::parse("<p>Welcome</p>", &home_url);
    let mut budget = Budget::new(0, Duration::from_secs(30));

    let found = discover_contact_page(&fetcher, &home_url, &home, &mut budget, Duration::ZERO).await;

    assert!(found.is_none());
    assert_eq!(request_count(&server).await, 0);
}
