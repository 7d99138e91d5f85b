//! Bounded enrichment of a single record
//!
//! The [`Enricher`] drives one record through fetch, discovery and
//! extraction under a fresh [`Budget`], appends exactly one diagnostic
//! note, and always finishes with the scoring and normalization pass.

use super::discovery::discover_contact_page;
use super::fetcher::{FetchError, Fetcher};
use crate::config::{Config, EnrichConfig};
use crate::extract::{clean_phone, rank_emails, PageExtract};
use crate::record::{Diagnostic, Finalizer, Record};
use crate::state::{throttle, Budget, HostCircuitBreaker};
use crate::url::host_key;
use std::sync::Arc;

/// Longest value written to the email column
const MAX_EMAIL_FIELD_CHARS: usize = 255;

/// Numbers kept in the phone column
const MAX_PHONES: usize = 2;

/// Per-record enrichment pipeline
#[derive(Debug, Clone)]
pub struct Enricher {
    fetcher: Fetcher,
    settings: EnrichConfig,
    finalizer: Finalizer,
}

impl Enricher {
    /// Creates an enricher with its own HTTP client
    pub fn from_config(
        config: &Config,
        breaker: Arc<HostCircuitBreaker>,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::from_config(config, breaker)?;
        Ok(Self::new(
            fetcher,
            config.enrich.clone(),
            Finalizer::new(config.email_policy.clone()),
        ))
    }

    /// Creates an enricher around an existing fetcher
    pub fn new(fetcher: Fetcher, settings: EnrichConfig, finalizer: Finalizer) -> Self {
        Self {
            fetcher,
            settings,
            finalizer,
        }
    }

    /// Enriches one record under a fresh budget
    ///
    /// Never fails: every problem is reported through the record's notes,
    /// and the returned record is always finalized.
    pub async fn enrich(&self, record: Record) -> Record {
        let budget = Budget::new(
            self.settings.max_fetches_per_record,
            self.settings.record_deadline(),
        );
        self.enrich_with_budget(record, budget).await
    }

    /// Enriches one record under the given budget
    pub async fn enrich_with_budget(&self, mut record: Record, mut budget: Budget) -> Record {
        let diagnostic = self.run(&mut record, &mut budget).await;
        tracing::debug!(
            site = record.label(),
            note = %diagnostic,
            fetches = budget.fetches_used(),
            "record enriched"
        );
        record.push_note(diagnostic);
        self.finalizer.finalize(&mut record);
        record
    }

    async fn run(&self, record: &mut Record, budget: &mut Budget) -> Diagnostic {
        let site = record.website.trim().to_string();
        if site.is_empty() {
            return Diagnostic::NoWebsite;
        }

        let host = host_key(&site);
        let breaker = self.fetcher.breaker();
        if !breaker.allow_request(&host) {
            return Diagnostic::HostBackoff;
        }

        let pause = self.settings.throttle();

        let home = match self.fetcher.fetch(&site, budget).await {
            Ok(page) => page,
            Err(FetchError::HostBackoff { .. }) => return Diagnostic::HostBackoff,
            Err(error) => {
                tracing::debug!(site = %site, %error, "homepage fetch failed");
                return self
                    .budget_outcome(budget, &host)
                    .unwrap_or(Diagnostic::FetchFailed);
            }
        };
        throttle(pause, budget).await;

        let home_extract = match PageExtract::parse_guarded(&home.body, &home.final_url) {
            Ok(extract) => extract,
            Err(error) => {
                tracing::warn!(site = %site, %error, "homepage extraction failed");
                return self
                    .budget_outcome(budget, &host)
                    .unwrap_or(Diagnostic::ExtractionError);
            }
        };

        let mut extraction_failed = false;
        let contact = discover_contact_page(
            &self.fetcher,
            &home.final_url,
            &home_extract,
            budget,
            pause,
        )
        .await;

        let contact_extract = match contact.as_ref().and_then(|c| c.page.as_ref()) {
            Some(page) => match PageExtract::parse_guarded(&page.body, &page.final_url) {
                Ok(extract) => Some(extract),
                Err(error) => {
                    tracing::warn!(url = %page.final_url, %error, "contact page extraction failed");
                    extraction_failed = true;
                    None
                }
            },
            None => None,
        };

        let emails = rank_emails(
            home_extract
                .emails
                .iter()
                .chain(contact_extract.iter().flat_map(|c| c.emails.iter())),
            self.finalizer.policy(),
        );
        record.email = emails.join(";").chars().take(MAX_EMAIL_FIELD_CHARS).collect();

        record.phone = collect_phones(&record.phone, &home_extract, contact_extract.as_ref()).join(";");

        record.instagram = home_extract.socials.instagram.clone();
        record.facebook = home_extract.socials.facebook.clone();
        record.tiktok = home_extract.socials.tiktok.clone();
        record.contact_page_url = contact.map(|c| c.url.to_string()).unwrap_or_default();
        record.about_text_excerpt = home_extract.about_excerpt.clone();

        let signatures = home_extract.signatures;
        record.tech_stack = signatures.tech_stack;
        record.order_platforms = signatures.order_platforms;
        record.reservation_platform = signatures.reservation_platform;
        record.analytics_ids = signatures.analytics_ids;
        record.fb_pixel = signatures.fb_pixel;

        if let Some(diagnostic) = self.budget_outcome(budget, &host) {
            return diagnostic;
        }
        if extraction_failed {
            return Diagnostic::ExtractionError;
        }
        Diagnostic::Enriched
    }

    /// Diagnostic for a spent budget, counting it against the host
    fn budget_outcome(&self, budget: &Budget, host: &str) -> Option<Diagnostic> {
        let diagnostic = if budget.is_expired() {
            Diagnostic::WatchdogTimeout
        } else if budget.fetches_exhausted() {
            Diagnostic::FetchBudgetExhausted
        } else {
            return None;
        };

        tracing::debug!(host, note = %diagnostic, "record budget spent");
        self.fetcher.breaker().record_failure(host);
        Some(diagnostic)
    }
}

/// Merges phone sources in priority order, keeping two distinct numbers
///
/// Priority: contact page `tel:` links, homepage `tel:` links, the record's
/// existing number, then text scans of the contact page and homepage.
fn collect_phones(
    existing: &str,
    home: &PageExtract,
    contact: Option<&PageExtract>,
) -> Vec<String> {
    let existing = clean_phone(existing);
    let sources = contact
        .into_iter()
        .flat_map(|c| c.tel_phones.iter())
        .chain(home.tel_phones.iter())
        .chain(existing.iter())
        .chain(contact.into_iter().flat_map(|c| c.text_phones.iter()))
        .chain(home.text_phones.iter());

    let mut phones: Vec<String> = Vec::with_capacity(MAX_PHONES);
    for phone in sources {
        if !phones.contains(phone) {
            phones.push(phone.clone());
        }
        if phones.len() >= MAX_PHONES {
            break;
        }
    }
    phones
}
