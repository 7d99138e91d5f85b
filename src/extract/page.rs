//! One-pass page extraction
//!
//! A fetched page is parsed exactly once into a [`PageExtract`], which owns
//! everything later stages need. The parsed DOM is dropped before the
//! function returns, so an extract can be held across await points.

use super::email::extract_emails;
use super::phone::{scan_phones, tel_links};
use super::signatures::{looks_like_age_gate, Signatures};
use super::social::{extract_socials, Socials};
use crate::url::absolutize;
use scraper::{ElementRef, Html, Selector};
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use url::Url;

/// Words in a link's text or href that suggest a contact page
const CONTACT_HINTS: &[&str] = &["contact", "visit", "find us"];

/// Minimum paragraph length used as an about excerpt
const ABOUT_MIN_CHARS: usize = 120;

/// Excerpt length before the ellipsis
const ABOUT_MAX_CHARS: usize = 240;

/// Errors raised while extracting from a page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extractor failed on malformed content: {0}")]
    Panicked(String),
}

/// Everything extracted from one fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    /// First link that looks like a contact page, resolved
    pub contact_link: Option<Url>,
    /// The page looks like an age verification wall
    pub age_gate: bool,
    /// Candidate addresses, unranked
    pub emails: Vec<String>,
    /// Normalized numbers from `tel:` links
    pub tel_phones: Vec<String>,
    /// Normalized numbers from scanning text and markup
    pub text_phones: Vec<String>,
    pub socials: Socials,
    pub about_excerpt: String,
    pub signatures: Signatures,
}

impl PageExtract {
    /// Parses a page and runs every extractor over it
    ///
    /// # Arguments
    ///
    /// * `body` - The page markup
    /// * `base` - The page's final URL, for resolving relative links
    pub fn parse(body: &str, base: &Url) -> Self {
        let document = Html::parse_document(body);
        let text = document
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            contact_link: find_contact_link(&document, base),
            age_gate: looks_like_age_gate(body),
            emails: extract_emails(&document, body),
            tel_phones: tel_links(&document),
            text_phones: scan_phones(&format!("{} {}", text, body)),
            socials: extract_socials(&document, base),
            about_excerpt: about_excerpt(&document),
            signatures: Signatures::detect(body),
        }
    }

    /// Same as [`PageExtract::parse`], but a panic inside an extractor is
    /// reported as an error instead of unwinding into the caller
    pub fn parse_guarded(body: &str, base: &Url) -> Result<Self, ExtractError> {
        catch_unwind(AssertUnwindSafe(|| Self::parse(body, base))).map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ExtractError::Panicked(message)
        })
    }
}

/// Finds the first link whose text or href suggests a contact page
///
/// Non-navigational links (`mailto:`, `tel:`, `javascript:`) and same-page
/// fragments are skipped.
pub fn find_contact_link(document: &Html, base: &Url) -> Option<Url> {
    let selector = Selector::parse("a[href]").ok()?;

    document.select(&selector).find_map(|element| {
        let href = element.value().attr("href")?.trim();
        let href_lower = href.to_lowercase();

        if href.starts_with('#')
            || ["mailto:", "tel:", "javascript:", "data:"]
                .iter()
                .any(|scheme| href_lower.starts_with(scheme))
        {
            return None;
        }

        let label = element_text(&element).to_lowercase();
        let hinted = CONTACT_HINTS
            .iter()
            .any(|hint| label.contains(hint) || href_lower.contains(hint));

        if hinted {
            absolutize(href, base)
        } else {
            None
        }
    })
}

/// First paragraph long enough to describe the business, cut to length
pub fn about_excerpt(document: &Html) -> String {
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    for paragraph in document.select(&selector) {
        let text = element_text(&paragraph);
        let length = text.chars().count();
        if length >= ABOUT_MIN_CHARS {
            if length > ABOUT_MAX_CHARS {
                let cut: String = text.chars().take(ABOUT_MAX_CHARS).collect();
                return format!("{}…", cut);
            }
            return text;
        }
    }
    String::new()
}

/// Text of an element with whitespace collapsed
fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}
