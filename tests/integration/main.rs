//! Integration tests for Lead-Ripple
//!
//! These tests use wiremock to stand up mock websites and exercise the
//! fetcher, contact discovery, record enrichment and whole runs end-to-end.

mod common;
mod coordinator_tests;
mod discovery_tests;
mod enricher_tests;
mod fetcher_tests;
