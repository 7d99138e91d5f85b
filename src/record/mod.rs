//! Business record model
//!
//! A [`Record`] is created from an input row, filled in by the enrichment
//! pipeline, finalized, and written once as an output row. Column order in
//! the output file is the field order of the struct.

mod finalize;
mod input;

pub use finalize::{
    email_status, format_phone_field, handle_from_url, lead_grade, lead_score, titleish,
    Finalizer,
};
pub use input::{InputReader, DATA_SOURCE};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator placed between note tokens
pub const NOTE_SEPARATOR: &str = "; ";

/// One business record in the fixed output schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub business_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    pub latitude: String,
    pub longitude: String,
    pub website: String,
    /// Ranked addresses, `;`-joined
    pub email: String,
    pub email_status: String,
    /// Up to two normalized numbers, `;`-joined
    pub phone: String,
    pub instagram: String,
    pub instagram_handle: String,
    pub facebook: String,
    pub tiktok: String,
    pub google_maps_url: String,
    pub yelp_url: String,
    pub hours_text: String,
    pub avg_rating: String,
    pub review_count: String,
    pub price_tier: String,
    pub tech_stack: String,
    pub employee_count_est: String,
    pub contact_page_url: String,
    pub about_text_excerpt: String,
    pub recent_post_date: String,
    pub data_source: String,
    pub last_seen_utc: String,
    pub lead_score: u32,
    pub lead_grade: String,
    /// Diagnostic tokens, one per pipeline run
    pub notes: String,
    pub order_platforms: String,
    pub reservation_platform: String,
    pub analytics_ids: String,
    pub fb_pixel: String,
}

impl Record {
    /// Appends a diagnostic token to `notes`
    ///
    /// Existing notes are never overwritten; tokens are joined with `"; "`.
    pub fn push_note(&mut self, diagnostic: Diagnostic) {
        let existing = self.notes.trim().trim_end_matches(';').trim_end();
        self.notes = if existing.is_empty() {
            diagnostic.as_token().to_string()
        } else {
            format!("{}{}{}", existing, NOTE_SEPARATOR, diagnostic.as_token())
        };
    }

    /// The most recent diagnostic token, if any
    pub fn last_note(&self) -> Option<&str> {
        self.notes
            .rsplit(';')
            .map(str::trim)
            .find(|token| !token.is_empty())
    }

    /// The diagnostic of the latest pipeline run, if the last note is one
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        self.last_note().and_then(Diagnostic::from_token)
    }

    /// Display label used in logs and the status file
    pub fn label(&self) -> &str {
        if !self.website.trim().is_empty() {
            self.website.trim()
        } else if !self.business_name.trim().is_empty() {
            self.business_name.trim()
        } else {
            "(no site)"
        }
    }
}

/// Terminal outcome of one pipeline run over a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Diagnostic {
    /// Homepage fetched and extractors ran
    Enriched,
    /// The record has no website
    NoWebsite,
    /// The homepage could not be fetched
    FetchFailed,
    /// The website's host was in backoff
    HostBackoff,
    /// The per-record fetch ceiling was reached
    FetchBudgetExhausted,
    /// The cooperative per-record deadline passed
    WatchdogTimeout,
    /// The hard timeout fired and the worker was replaced
    WatchdogKilled,
    /// An extractor failed on malformed content
    ExtractionError,
    /// The worker failed unexpectedly
    EnrichError,
}

impl Diagnostic {
    /// The token written to the `notes` column
    pub fn as_token(&self) -> &'static str {
        match self {
            Diagnostic::Enriched => "enriched",
            Diagnostic::NoWebsite => "no_website",
            Diagnostic::FetchFailed => "fetch_failed",
            Diagnostic::HostBackoff => "host_backoff",
            Diagnostic::FetchBudgetExhausted => "row_fetch_budget_exhausted",
            Diagnostic::WatchdogTimeout => "row_watchdog_timeout",
            Diagnostic::WatchdogKilled => "row_watchdog_killed",
            Diagnostic::ExtractionError => "extraction_error",
            Diagnostic::EnrichError => "enrich_error",
        }
    }

    /// Parses a `notes` token back into a diagnostic
    pub fn from_token(token: &str) -> Option<Self> {
        [
            Diagnostic::Enriched,
            Diagnostic::NoWebsite,
            Diagnostic::FetchFailed,
            Diagnostic::HostBackoff,
            Diagnostic::FetchBudgetExhausted,
            Diagnostic::WatchdogTimeout,
            Diagnostic::WatchdogKilled,
            Diagnostic::ExtractionError,
            Diagnostic::EnrichError,
        ]
        .into_iter()
        .find(|d| d.as_token() == token.trim())
    }

    /// Returns true for outcomes that count as a timeout in run statistics
    pub fn is_timeout(&self) -> bool {
        matches!(self, Diagnostic::WatchdogTimeout | Diagnostic::WatchdogKilled)
    }

    /// Returns true for outcomes that count as an error in run statistics
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::ExtractionError | Diagnostic::EnrichError)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}
