//! Configuration module for Lead-Ripple
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[io]` falls back to defaults tuned for polite,
//! one-record-at-a-time enrichment.
//!
//! # Example
//!
//! ```no_run
//! use lead_ripple::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("enrich.toml")).unwrap();
//! println!("Fetch budget per record: {}", config.enrich.max_fetches_per_record);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BreakerConfig, Config, EmailPolicy, EnrichConfig, FetcherConfig, IoConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
