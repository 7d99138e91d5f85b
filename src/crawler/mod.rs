//! Crawler module for bounded per-record enrichment
//!
//! This module contains the core enrichment logic, including:
//! - HTTP fetching under a per-record budget and the host circuit breaker
//! - Contact page discovery
//! - The per-record enrichment pipeline
//! - Isolated, killable workers
//! - Overall run coordination

mod coordinator;
mod discovery;
mod enricher;
mod fetcher;
mod runner;

pub use coordinator::{run_enrichment, Coordinator, RunOptions, RunSummary};
pub use discovery::{discover_contact_page, ContactPage, CONTACT_PATHS};
pub use enricher::Enricher;
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher};
pub use runner::{IsolationRunner, PipelineFactory, RecordPipeline};
