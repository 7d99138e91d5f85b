//! robots.txt and sitemap parsing
//!
//! Only the parts used for contact discovery are read: `Sitemap:`
//! directives from robots.txt and `<loc>` entries from sitemap XML.

use regex::Regex;
use std::sync::LazyLock;

static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:[\w-]+:)?loc>\s*([^<]+?)\s*</(?:[\w-]+:)?loc>").expect("valid regex")
});

/// Extracts `Sitemap:` URLs from robots.txt content
///
/// The directive name is case-insensitive and may appear anywhere in the
/// file, outside of any user-agent group. Comments are ignored.
///
/// # Arguments
///
/// * `content` - The raw robots.txt file content
///
/// # Returns
///
/// Sitemap URLs in file order; empty if there are none
pub fn sitemap_directives(content: &str) -> Vec<String> {
    let mut sitemaps = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        // Skip comments and empty lines
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case("sitemap") {
                // Strip trailing comments
                let value = value.split('#').next().unwrap_or_default().trim();
                if !value.is_empty() {
                    sitemaps.push(value.to_string());
                }
            }
        }
    }

    sitemaps
}

/// Extracts `<loc>` URLs from sitemap XML, in document order
///
/// Namespace prefixes (`<sm:loc>`) are accepted. The common XML entities
/// are decoded; the XML is not otherwise validated, so truncated documents
/// still yield the entries read so far.
pub fn sitemap_locations(xml: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(xml)
        .map(|caps| decode_entities(&caps[1]))
        .filter(|loc| !loc.is_empty())
        .collect()
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
