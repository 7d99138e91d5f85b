//! Whole runs: input CSV to output CSV through the coordinator

use crate::common::*;
use lead_ripple::config::Config;
use lead_ripple::crawler::{Coordinator, RunOptions};
use lead_ripple::output::count_output_rows;
use lead_ripple::record::Record;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

fn write_input(dir: &Path, rows: &[(&str, &str)]) -> Config {
    let input = dir.join("breweries.csv");
    let mut content = String::from("name,website_url,street,city,state\n");
    for (name, website) in rows {
        content.push_str(&format!("{},{},12 Main St,bend,or\n", name, website));
    }
    std::fs::write(&input, content).unwrap();

    let mut config = test_config();
    config.io.input_path = input.display().to_string();
    config.io.output_path = dir.join("enriched.csv").display().to_string();
    config.io.status_path = dir.join("enrich_stats.json").display().to_string();
    config
}

fn read_output(config: &Config) -> Vec<Record> {
    let mut reader = csv::Reader::from_path(&config.io.output_path).unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}

async fn mock_sites() -> MockServer {
    let server = MockServer::start().await;
    mount(
        &server,
        "/taproom",
        html(r#"<a href="mailto:hello@taproom.example">Say hello</a> (541) 555-0100"#),
    )
    .await;
    mount(
        &server,
        "/cellar",
        html(r#"<a href="https://www.facebook.com/cellarbrew">Facebook</a>"#),
    )
    .await;
    server
}

#[tokio::test]
async fn test_isolated_run_writes_one_row_per_input() {
    let server = mock_sites().await;
    let dir = tempfile::tempdir().unwrap();
    let taproom = format!("{}/taproom", server.uri());
    let cellar = format!("{}/cellar", server.uri());
    let mut config = write_input(
        dir.path(),
        &[
            ("Taproom", taproom.as_str()),
            ("No Site Co", ""),
            ("Cellar", cellar.as_str()),
        ],
    );
    config.enrich.workers = 2;
    config.enrich.isolation = true;

    let summary = Coordinator::new(config.clone(), "cfg", RunOptions::default())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stats.written, 3);
    let rows = read_output(&config);
    let names: Vec<&str> = rows.iter().map(|r| r.business_name.as_str()).collect();
    assert_eq!(names, vec!["Taproom", "No Site Co", "Cellar"]);

    assert_eq!(rows[0].notes, "enriched");
    assert_eq!(rows[0].email, "hello@taproom.example");
    assert_eq!(rows[0].email_status, "business-priority");
    assert_eq!(rows[0].address, "12 Main St");
    assert_eq!(rows[0].city, "Bend");
    assert_eq!(rows[0].state, "OR");
    assert_eq!(rows[0].data_source, "enrich:web");

    assert_eq!(rows[1].notes, "no_website");
    assert_eq!(rows[1].lead_grade, "C");

    assert_eq!(rows[2].notes, "enriched");
    assert_eq!(rows[2].facebook, "https://facebook.com/cellarbrew");
    assert_eq!(rows[2].email_status, "missing");
}

#[tokio::test]
async fn test_inline_run_matches_isolated_run() {
    let server = mock_sites().await;
    let taproom = format!("{}/taproom", server.uri());

    let isolated_dir = tempfile::tempdir().unwrap();
    let mut isolated = write_input(isolated_dir.path(), &[("Taproom", taproom.as_str())]);
    isolated.enrich.isolation = true;

    let inline_dir = tempfile::tempdir().unwrap();
    let mut inline = write_input(inline_dir.path(), &[("Taproom", taproom.as_str())]);
    inline.enrich.isolation = false;

    for config in [&isolated, &inline] {
        Coordinator::new(config.clone(), "cfg", RunOptions::default())
            .run(CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(read_output(&isolated), read_output(&inline));
}

#[tokio::test]
async fn test_slow_site_times_out_and_run_continues() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/slow",
        html("<p>eventually</p>").set_delay(Duration::from_secs(10)),
    )
    .await;
    mount(&server, "/fast", html("<p>quick</p>")).await;

    let dir = tempfile::tempdir().unwrap();
    let slow = format!("{}/slow", server.uri());
    let fast = format!("{}/fast", server.uri());
    let mut config = write_input(
        dir.path(),
        &[("Slow Brew", slow.as_str()), ("Fast Brew", fast.as_str())],
    );
    config.enrich.record_deadline_secs = 1;
    config.enrich.hard_timeout_margin_secs = 5;

    let started = std::time::Instant::now();
    let summary = Coordinator::new(config.clone(), "cfg", RunOptions::default())
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(summary.stats.timeouts, 1);

    let rows = read_output(&config);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].notes, "row_watchdog_timeout");
    assert_eq!(rows[0].business_name, "Slow Brew");
    assert_eq!(rows[1].notes, "enriched");

    let status: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config.io.status_path).unwrap())
            .unwrap();
    assert_eq!(status["timeouts"], 1);
    assert_eq!(status["written"], 2);
}

#[tokio::test]
async fn test_limit_then_resume() {
    let server = mock_sites().await;
    let dir = tempfile::tempdir().unwrap();
    let taproom = format!("{}/taproom", server.uri());
    let config = write_input(
        dir.path(),
        &[
            ("First", taproom.as_str()),
            ("Second", ""),
            ("Third", taproom.as_str()),
        ],
    );

    let first = Coordinator::new(
        config.clone(),
        "cfg",
        RunOptions {
            limit: Some(1),
            ..Default::default()
        },
    )
    .run(CancellationToken::new())
    .await
    .unwrap();
    assert_eq!(first.stats.written, 1);

    let second = Coordinator::new(config.clone(), "cfg", RunOptions::default())
        .run(CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.stats.written, 2);

    let output = Path::new(&config.io.output_path);
    assert_eq!(count_output_rows(output).unwrap(), 3);
    let content = std::fs::read_to_string(output).unwrap();
    assert_eq!(content.matches("business_name,").count(), 1);

    let names: Vec<String> = read_output(&config)
        .into_iter()
        .map(|r| r.business_name)
        .collect();
    assert_eq!(names, vec!["First", "Second", "Third"]);
}
