//! robots.txt and sitemap handling module
//!
//! This module reads robots.txt `Sitemap:` directives and sitemap `<loc>`
//! entries, and picks the sitemap entry most likely to be a contact page.

mod parser;

pub use parser::{sitemap_directives, sitemap_locations};

use regex::Regex;
use std::sync::LazyLock;

/// Path segments that mark a page likely to carry contact details
static CONTACT_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(contact|contact-us|about|visit|find-us|locations|privacy|terms|careers|jobs)(/|\.|$)")
        .expect("valid regex")
});

/// Checks if a URL has a contact-indicative path segment
///
/// # Arguments
///
/// * `url` - An absolute URL or path
///
/// # Returns
///
/// * `true` - If a segment such as `/contact/` or `/about.html` is present
/// * `false` - Otherwise
pub fn is_contact_location(url: &str) -> bool {
    CONTACT_PATH_RE.is_match(url)
}

/// Returns the first sitemap entry that looks like a contact page
pub fn find_contact_location(xml: &str) -> Option<String> {
    sitemap_locations(xml)
        .into_iter()
        .find(|loc| is_contact_location(loc))
}
