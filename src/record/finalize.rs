use super::Record;
use crate::config::EmailPolicy;
use crate::extract::phone::clean_phone;
use crate::url::clean_url;
use regex::Regex;
use std::sync::LazyLock;

const DEFAULT_COUNTRY: &str = "United States";

/// Maximum numbers kept in the phone column
const MAX_PHONES: usize = 2;

static INSTAGRAM_HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"instagram\.com/([^/?#]+)").expect("valid regex"));
static FACEBOOK_HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"facebook\.com/([^/?#]+)").expect("valid regex"));
static TIKTOK_HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tiktok\.com/@([^/?#]+)").expect("valid regex"));

/// Scoring and normalization pass applied to every record before output
///
/// Runs on every path: successful enrichment, budget exhaustion, host
/// backoff and hard-timeout kills alike. Applying it twice yields the same
/// record as applying it once.
#[derive(Debug, Clone, Default)]
pub struct Finalizer {
    policy: EmailPolicy,
}

impl Finalizer {
    /// Creates a finalizer using the given email policy
    pub fn new(policy: EmailPolicy) -> Self {
        Self { policy }
    }

    /// The email policy used for `email_status`
    pub fn policy(&self) -> &EmailPolicy {
        &self.policy
    }

    /// Normalizes and scores a record in place
    pub fn finalize(&self, record: &mut Record) {
        record.website = clean_url(&record.website);
        record.instagram = clean_url(&record.instagram);
        record.facebook = clean_url(&record.facebook);
        record.tiktok = clean_url(&record.tiktok);
        record.contact_page_url = clean_url(&record.contact_page_url);

        record.phone = format_phone_field(&record.phone);
        record.email_status = email_status(&record.email, &self.policy).to_string();
        record.instagram_handle = handle_from_url(&record.instagram);
        record.lead_score = lead_score(record);
        record.lead_grade = lead_grade(record.lead_score).to_string();

        record.business_name = titleish(&record.business_name);
        record.city = titleish(&record.city);
        record.state = record.state.trim().to_uppercase();
        if record.country.trim().is_empty() {
            record.country = DEFAULT_COUNTRY.to_string();
        }
        record.address = record.address.trim().to_string();
        record.postal_code = record.postal_code.trim().to_string();
    }

    /// Convenience wrapper returning the finalized record
    pub fn finalized(&self, mut record: Record) -> Record {
        self.finalize(&mut record);
        record
    }
}

/// Normalizes a free-form phone column
///
/// The value is split on `;`, `,`, `|` and `/` (never on spaces, which
/// appear inside formatted numbers). Each part is normalized; invalid parts
/// are dropped, duplicates removed, and at most two numbers kept.
pub fn format_phone_field(raw: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    for part in raw.split([';', ',', '|', '/']) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some(phone) = clean_phone(part) {
            if !kept.contains(&phone) {
                kept.push(phone);
            }
        }
        if kept.len() >= MAX_PHONES {
            break;
        }
    }
    kept.join(";")
}

/// Classifies the email column
///
/// * `missing` - no address
/// * `business-priority` - at least one shared role inbox (`info@`, `sales@`, ...)
/// * `business` - at least one address on a non-free domain
/// * `generic` - only free webmail addresses
pub fn email_status(email_field: &str, policy: &EmailPolicy) -> &'static str {
    let emails: Vec<&str> = email_field
        .split(';')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();

    if emails.is_empty() {
        return "missing";
    }

    let has_role_inbox = emails.iter().any(|email| {
        email
            .split_once('@')
            .is_some_and(|(local, _)| policy.role_prefixes.iter().any(|p| p == local))
    });
    if has_role_inbox {
        return "business-priority";
    }

    let has_business = emails.iter().any(|email| match email.split_once('@') {
        Some((_, domain)) => !policy.is_free_domain(domain),
        None => false,
    });
    if has_business {
        "business"
    } else {
        "generic"
    }
}

/// Derives a social handle from a profile URL
///
/// Instagram and TikTok handles are prefixed with `@`; Facebook page names
/// are returned bare. Anything else yields an empty string.
pub fn handle_from_url(url: &str) -> String {
    let lowered = url.to_lowercase();
    if let Some(caps) = INSTAGRAM_HANDLE_RE.captures(&lowered) {
        return format!("@{}", &caps[1]);
    }
    if let Some(caps) = FACEBOOK_HANDLE_RE.captures(&lowered) {
        return caps[1].to_string();
    }
    if let Some(caps) = TIKTOK_HANDLE_RE.captures(&lowered) {
        return format!("@{}", &caps[1]);
    }
    String::new()
}

/// Lead score: +1 Instagram, +2 email, +1 Shopify or WordPress site
pub fn lead_score(record: &Record) -> u32 {
    let mut score = 0;
    if !record.instagram.is_empty() {
        score += 1;
    }
    if !record.email.is_empty() {
        score += 2;
    }
    if matches!(record.tech_stack.as_str(), "shopify" | "wordpress") {
        score += 1;
    }
    score
}

/// Letter grade for a lead score
pub fn lead_grade(score: u32) -> &'static str {
    match score {
        s if s >= 4 => "A",
        s if s >= 2 => "B",
        _ => "C",
    }
}

/// Capitalizes each whitespace-separated word and collapses spacing
pub fn titleish(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
