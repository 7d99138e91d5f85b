//! Markup signatures: site builder, ordering and reservation platforms,
//! analytics identifiers, and age gates
//!
//! All detectors are substring or regex checks over the raw markup.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static GA4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bG-[A-Z0-9]{6,12}\b").expect("valid regex"));
static UNIVERSAL_ANALYTICS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bUA-\d{4,}-\d+\b").expect("valid regex"));
static GTM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bGTM-[A-Z0-9]{4,8}\b").expect("valid regex"));
static FB_PIXEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"fbq\(['"]init['"],\s*['"][0-9]{5,20}['"]\)"#).expect("valid regex")
});

/// Site builders in detection order: (stack name, markers)
const STACKS: &[(&str, &[&str])] = &[
    ("shopify", &["cdn.shopify.com", "myshopify.com"]),
    ("wordpress", &["wp-content", "wp-json", "wordpress"]),
    ("wix", &["wixstatic.com"]),
    ("squarespace", &["squarespace.com"]),
    ("bigcommerce", &["bigcommerce"]),
    ("weebly", &["weebly"]),
];

const ORDER_PLATFORMS: &[(&str, &[&str])] = &[
    ("toasttab", &["toasttab.com"]),
    ("square", &["square.site", "squareup.com"]),
    ("doordash", &["doordash.com"]),
    ("ubereats", &["ubereats.com"]),
    ("grubhub", &["grubhub.com"]),
    ("clover", &["clover.com"]),
];

const AGE_GATE_SIGNS: &[&str] = &[
    "you must be 21",
    "over 21",
    "21+",
    "age verification",
    "verify your age",
    "are you over 21",
    "date of birth",
];

/// Platform and tracking signals detected on a homepage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signatures {
    pub tech_stack: String,
    pub order_platforms: String,
    pub reservation_platform: String,
    pub analytics_ids: String,
    pub fb_pixel: String,
}

impl Signatures {
    /// Runs every detector over raw markup
    pub fn detect(raw: &str) -> Self {
        let (analytics_ids, fb_pixel) = detect_analytics(raw);
        Self {
            tech_stack: guess_stack(raw).to_string(),
            order_platforms: detect_order_platforms(raw),
            reservation_platform: detect_reservation_platform(raw).to_string(),
            analytics_ids,
            fb_pixel: fb_pixel.to_string(),
        }
    }
}

/// Guesses the site builder; `unknown` when none matches, empty for no markup
pub fn guess_stack(raw: &str) -> &'static str {
    if raw.is_empty() {
        return "";
    }
    let lowered = raw.to_lowercase();
    STACKS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

/// Online ordering platforms, `;`-joined in a fixed order
pub fn detect_order_platforms(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    ORDER_PLATFORMS
        .iter()
        .filter(|(_, markers)| markers.iter().any(|m| lowered.contains(m)))
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";")
}

/// Reservation platform; OpenTable wins over Resy
pub fn detect_reservation_platform(raw: &str) -> &'static str {
    let lowered = raw.to_lowercase();
    if lowered.contains("opentable.com") {
        "opentable"
    } else if lowered.contains("resy.com") {
        "resy"
    } else {
        ""
    }
}

/// Analytics ids (sorted, `;`-joined) and Facebook pixel presence (`yes`/`no`)
pub fn detect_analytics(raw: &str) -> (String, &'static str) {
    let ids: BTreeSet<&str> = GA4_RE
        .find_iter(raw)
        .chain(UNIVERSAL_ANALYTICS_RE.find_iter(raw))
        .chain(GTM_RE.find_iter(raw))
        .map(|m| m.as_str())
        .collect();

    let pixel = if FB_PIXEL_RE.is_match(raw) { "yes" } else { "no" };
    (ids.into_iter().collect::<Vec<_>>().join(";"), pixel)
}

/// Returns true if the markup looks like an age verification wall
pub fn looks_like_age_gate(raw: &str) -> bool {
    let lowered = raw.to_lowercase();
    AGE_GATE_SIGNS.iter().any(|sign| lowered.contains(sign))
}
