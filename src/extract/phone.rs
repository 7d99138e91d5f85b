//! North American phone number normalization and discovery

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Loose scan pattern; candidates are validated by [`clean_phone`]
static PHONE_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[\s\-\.)]?)?(?:\(?\d{3}\)?[\s\-.]?)\d{3}[\s\-.]?\d{4}").expect("valid regex")
});

/// Area and exchange blocks that are never real subscriber numbers
const RESERVED_BLOCKS: &[&str] = &["000", "555"];

/// Normalizes a phone number to `+1-AAA-EEE-NNNN`
///
/// Accepts ten digits, or eleven with a leading country code `1`, in any
/// punctuation. Returns None when the area or exchange code starts with 0
/// or 1, or is a reserved `000`/`555` block.
///
/// # Examples
///
/// ```
/// use lead_ripple::extract::clean_phone;
///
/// assert_eq!(clean_phone("(212) 867-5309").as_deref(), Some("+1-212-867-5309"));
/// assert_eq!(clean_phone("(212) 555-0100"), None);
/// ```
pub fn clean_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('1') => &digits[1..],
        _ => return None,
    };

    let (area, rest) = national.split_at(3);
    let (exchange, line) = rest.split_at(3);

    if area.starts_with(['0', '1']) || exchange.starts_with(['0', '1']) {
        return None;
    }
    if RESERVED_BLOCKS.contains(&area) || RESERVED_BLOCKS.contains(&exchange) {
        return None;
    }

    Some(format!("+1-{}-{}-{}", area, exchange, line))
}

/// Normalized numbers from `tel:` links, in document order
pub fn tel_links(document: &Html) -> Vec<String> {
    let mut found = Vec::new();
    let Ok(selector) = Selector::parse("a[href]") else {
        return found;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let is_tel = href
            .get(..4)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("tel:"));
        if !is_tel {
            continue;
        }
        if let Some(phone) = clean_phone(&href[4..]) {
            if !found.contains(&phone) {
                found.push(phone);
            }
        }
    }
    found
}

/// Normalized numbers found by scanning free text, in order of appearance
pub fn scan_phones(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for m in PHONE_SCAN_RE.find_iter(text) {
        if let Some(phone) = clean_phone(m.as_str()) {
            if !found.contains(&phone) {
                found.push(phone);
            }
        }
    }
    found
}
