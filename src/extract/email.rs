//! Email address discovery, filtering and ranking
//!
//! Sites hide addresses in many ways. Candidates are gathered from every
//! known hiding place, junk is filtered out, and the survivors are ranked
//! by [`rank_emails`], which is independent of how they were found.

use crate::config::EmailPolicy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}").expect("valid regex")
});

/// `info [at] example [dot] com` style rewrites, applied in order
static OBFUSCATION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\s*\[\s*at\s*\]\s*", "@"),
        (r"(?i)\s*\(\s*at\s*\)\s*", "@"),
        (r"(?i)\s+at\s+", "@"),
        (r"(?i)\s*\[\s*dot\s*\]\s*", "."),
        (r"(?i)\s*\(\s*dot\s*\)\s*", "."),
        (r"(?i)\s+dot\s+", "."),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid regex"), replacement))
    .collect()
});

static HEX_LOCAL_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]{20,}$").expect("valid regex"));

/// Endings of asset paths that look like addresses (`sprite@2x.png`)
const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".js", ".css", ".json", ".xml",
];

/// Placeholder addresses copied from templates
const PLACEHOLDER_ADDRESSES: &[&str] = &["user@domain.com"];

/// Machine domains that never reach a person
const JUNK_DOMAINS: &[&str] = &["group.calendar.google.com"];

/// Domain fragments of error-reporting and site-builder infrastructure
const JUNK_DOMAIN_FRAGMENTS: &[&str] = &["sentry.", "wixpress."];

const CLOUDFLARE_PROTECTION_PATH: &str = "/cdn-cgi/l/email-protection";

/// Rewrites textual obfuscation into plain address syntax
pub fn deobfuscate_text(text: &str) -> String {
    OBFUSCATION_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

/// Returns true for addresses that are clearly not inboxes
pub fn is_junk_email(email: &str) -> bool {
    let email = email.to_lowercase();

    if ASSET_EXTENSIONS.iter().any(|ext| email.ends_with(ext)) {
        return true;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return true;
    };

    if PLACEHOLDER_ADDRESSES.contains(&email.as_str()) {
        return true;
    }

    if JUNK_DOMAINS.contains(&domain) || JUNK_DOMAIN_FRAGMENTS.iter().any(|f| domain.contains(f)) {
        return true;
    }

    HEX_LOCAL_PART_RE.is_match(local)
}

/// Scans text for addresses, lowercased, junk-filtered, in first-seen order
pub fn scan_emails(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for m in EMAIL_RE.find_iter(text) {
        let email = m.as_str().to_lowercase();
        if !is_junk_email(&email) && !found.contains(&email) {
            found.push(email);
        }
    }
    found
}

/// Decodes a Cloudflare-style protected address
///
/// The first byte (two hex digits) is the XOR key; every following byte is
/// XORed with it. Returns None for malformed input.
///
/// # Examples
///
/// ```
/// use lead_ripple::extract::decode_cfemail;
///
/// assert_eq!(decode_cfemail("1a1a").as_deref(), Some("\u{0}"));
/// assert_eq!(decode_cfemail("zz"), None);
/// ```
pub fn decode_cfemail(encoded: &str) -> Option<String> {
    let encoded = encoded.trim();
    if encoded.len() < 2 || encoded.len() % 2 != 0 || !encoded.is_ascii() {
        return None;
    }

    let key = u8::from_str_radix(&encoded[..2], 16).ok()?;
    let bytes = (2..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&encoded[i..i + 2], 16).map(|b| b ^ key))
        .collect::<Result<Vec<u8>, _>>()
        .ok()?;

    String::from_utf8(bytes).ok()
}

/// Gathers candidate addresses from every hiding place on a page
///
/// Sources, in order: the raw markup after de-obfuscation, `mailto:` links,
/// `data-cfemail` attributes, email-protection links, JSON-LD `email`
/// fields, `<noscript>` content, and elements whose attributes, class or id
/// mention email. Results are deduplicated but not ranked.
pub fn extract_emails(document: &Html, raw: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut add = |candidates: Vec<String>| {
        for email in candidates {
            if !found.contains(&email) {
                found.push(email);
            }
        }
    };

    add(scan_emails(&deobfuscate_text(raw)));

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();

            let is_mailto = href
                .get(..7)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("mailto:"));
            if is_mailto {
                let address = href[7..].split('?').next().unwrap_or_default();
                for part in address.split([';', ',']) {
                    add(scan_emails(part));
                }
            } else if href.contains(CLOUDFLARE_PROTECTION_PATH) {
                if let Some((_, encoded)) = href.split_once('#') {
                    if let Some(decoded) = decode_cfemail(encoded) {
                        add(scan_emails(&decoded));
                    }
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("[data-cfemail]") {
        for element in document.select(&selector) {
            if let Some(decoded) = element.value().attr("data-cfemail").and_then(decode_cfemail) {
                add(scan_emails(&decoded));
            }
        }
    }

    if let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) {
        for element in document.select(&selector) {
            let text: String = element.text().collect();
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                let mut from_json = Vec::new();
                collect_json_emails(&value, &mut from_json);
                add(from_json);
            }
        }
    }

    if let Ok(selector) = Selector::parse("noscript") {
        for element in document.select(&selector) {
            let text = element.text().collect::<Vec<_>>().join(" ");
            add(scan_emails(&deobfuscate_text(&text)));
        }
    }

    if let Ok(selector) = Selector::parse("*") {
        for element in document.select(&selector) {
            let el = element.value();
            let mentions_email = |name: &str| {
                el.attr(name)
                    .is_some_and(|v| v.to_ascii_lowercase().contains("email"))
            };
            let is_candidate = el.attr("data-email").is_some()
                || el.attr("data-mail").is_some()
                || mentions_email("class")
                || mentions_email("id");
            if !is_candidate {
                continue;
            }

            let bits = [
                el.attr("data-email").unwrap_or_default().to_string(),
                el.attr("data-mail").unwrap_or_default().to_string(),
                el.attr("content").unwrap_or_default().to_string(),
                element.text().collect::<Vec<_>>().join(" "),
            ];
            add(scan_emails(&deobfuscate_text(&bits.join(" "))));
        }
    }

    found
}

/// Walks a JSON-LD value collecting addresses under `email` keys at any depth
fn collect_json_emails(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match child {
                    Value::String(s) if key.eq_ignore_ascii_case("email") => {
                        out.extend(scan_emails(s));
                    }
                    _ => collect_json_emails(child, out),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_emails(item, out);
            }
        }
        _ => {}
    }
}

/// Ranks candidate addresses best-first and keeps the top `max_emails`
///
/// # Ranking
///
/// 0. personal address at a business domain
/// 1. role address (`info@`, `sales@`, ...) at a business domain
/// 2. personal address at a free webmail domain
/// 3. role address at a free webmail domain
///
/// Ties go to the shorter local part, then lexical order. Candidates are
/// lowercased and deduplicated first, so the output does not depend on the
/// order they were found in.
///
/// # Examples
///
/// ```
/// use lead_ripple::config::EmailPolicy;
/// use lead_ripple::extract::rank_emails;
///
/// let policy = EmailPolicy::default();
/// let ranked = rank_emails(["info@gmail.com", "jo@shop.example", "sales@shop.example"], &policy);
/// assert_eq!(ranked, vec!["jo@shop.example", "sales@shop.example", "info@gmail.com"]);
/// ```
pub fn rank_emails<I, S>(candidates: I, policy: &EmailPolicy) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = candidates
        .into_iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let mut ranked: Vec<(u8, usize, String)> = unique
        .into_iter()
        .map(|email| {
            let (local, domain) = email.split_once('@').unwrap_or((email.as_str(), ""));
            let group = match (policy.is_free_domain(domain), policy.is_role(local)) {
                (false, false) => 0,
                (false, true) => 1,
                (true, false) => 2,
                (true, true) => 3,
            };
            (group, local.len(), email)
        })
        .collect();

    ranked.sort_by(|a, b| match a.0.cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)),
        other => other,
    });

    ranked
        .into_iter()
        .take(policy.max_emails)
        .map(|(_, _, email)| email)
        .collect()
}
