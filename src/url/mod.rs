//! URL handling module for Lead-Ripple
//!
//! This module provides website parsing, output URL cleaning, and the host
//! keys used by the circuit breaker.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{absolutize, host_key, host_key_of, root_url};
pub use normalize::{clean_url, parse_site_url};
