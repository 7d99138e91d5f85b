//! Contact page discovery
//!
//! Finds one page beyond the homepage that is likely to carry contact
//! details. Strategies run in order and stop at the first success:
//!
//! 1. A homepage link whose text or href mentions contact, visit or find us
//! 2. Well-known paths, only when the homepage is an age gate hiding its links
//! 3. Sitemaps listed in robots.txt, then `/sitemap.xml`
//!
//! Every request draws on the record's budget; once it is spent discovery
//! gives up and reports no contact page.

use super::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::extract::PageExtract;
use crate::robots::{find_contact_location, sitemap_directives};
use crate::state::{throttle, Budget};
use crate::url::{absolutize, root_url};
use std::time::Duration;
use url::Url;

/// Paths probed behind an age gate, in order
pub const CONTACT_PATHS: &[&str] = &[
    "/contact",
    "/contact/",
    "/contact-us",
    "/contact-us/",
    "/contactus",
    "/visit",
    "/visit-us",
    "/about",
    "/about-us",
    "/find-us",
    "/privacy",
    "/privacy-policy",
    "/terms",
    "/terms-and-conditions",
    "/jobs",
    "/careers",
];

/// A discovered contact page
#[derive(Debug, Clone)]
pub struct ContactPage {
    /// Where the page was found; recorded even when fetching it failed
    pub url: Url,

    /// The fetched page, if the fetch succeeded
    pub page: Option<FetchedPage>,
}

/// Discovers and fetches the contact page for a site
///
/// # Arguments
///
/// * `fetcher` - The worker's fetcher
/// * `home_url` - The homepage's final URL after redirects
/// * `home` - What was extracted from the homepage
/// * `budget` - The record's budget
/// * `pause` - Politeness delay after each successful fetch, clamped to the budget
///
/// # Returns
///
/// The contact page, or None if no strategy found one
pub async fn discover_contact_page(
    fetcher: &Fetcher,
    home_url: &Url,
    home: &PageExtract,
    budget: &mut Budget,
    pause: Duration,
) -> Option<ContactPage> {
    if let Some(url) = &home.contact_link {
        tracing::debug!(url = %url, "contact link found on homepage");
        let page = fetch_page(fetcher, url, budget, pause).await;
        return Some(ContactPage {
            url: url.clone(),
            page,
        });
    }

    if home.age_gate {
        if let Some(found) = probe_contact_paths(fetcher, home_url, budget, pause).await {
            return Some(found);
        }
    }

    if is_spent(budget) {
        return None;
    }

    let url = find_via_sitemaps(fetcher, home_url, budget, pause).await?;
    tracing::debug!(url = %url, "contact page found in sitemap");
    let page = fetch_page(fetcher, &url, budget, pause).await;
    Some(ContactPage { url, page })
}

/// Tries the well-known contact paths until one returns a page
async fn probe_contact_paths(
    fetcher: &Fetcher,
    home_url: &Url,
    budget: &mut Budget,
    pause: Duration,
) -> Option<ContactPage> {
    tracing::debug!(url = %home_url, "age gate detected, probing contact paths");

    for path in CONTACT_PATHS {
        let Ok(url) = home_url.join(path) else {
            continue;
        };

        match fetcher.fetch(url.as_str(), budget).await {
            Ok(page) => {
                throttle(pause, budget).await;
                return Some(ContactPage {
                    url,
                    page: Some(page),
                });
            }
            Err(error) if error.is_precondition() => return None,
            Err(_) => continue,
        }
    }

    None
}

/// Looks for a contact-like `<loc>` in the site's sitemaps
async fn find_via_sitemaps(
    fetcher: &Fetcher,
    home_url: &Url,
    budget: &mut Budget,
    pause: Duration,
) -> Option<Url> {
    let root = root_url(home_url);
    let default_sitemap = root.join("/sitemap.xml").ok()?;
    let mut tried_default = false;

    let robots_url = root.join("/robots.txt").ok()?;
    match fetcher.fetch_text(robots_url.as_str(), budget).await {
        Ok(robots) => {
            for sitemap in sitemap_directives(&robots.body) {
                let Some(sitemap_url) = absolutize(&sitemap, &root) else {
                    continue;
                };
                tried_default |= sitemap_url == default_sitemap;

                if let Some(found) = search_sitemap(fetcher, &sitemap_url, budget, pause).await {
                    return Some(found);
                }
                if is_spent(budget) {
                    return None;
                }
            }
        }
        Err(error) if error.is_precondition() => return None,
        Err(_) => {}
    }

    if tried_default {
        return None;
    }
    search_sitemap(fetcher, &default_sitemap, budget, pause).await
}

/// Fetches one sitemap and returns its first contact-like entry
async fn search_sitemap(
    fetcher: &Fetcher,
    sitemap_url: &Url,
    budget: &mut Budget,
    pause: Duration,
) -> Option<Url> {
    let sitemap = fetcher.fetch_text(sitemap_url.as_str(), budget).await.ok()?;
    throttle(pause, budget).await;

    let location = find_contact_location(&sitemap.body)?;
    absolutize(&location, &sitemap.final_url)
}

/// Fetches a page, pausing politely on success
async fn fetch_page(
    fetcher: &Fetcher,
    url: &Url,
    budget: &mut Budget,
    pause: Duration,
) -> Option<FetchedPage> {
    match fetcher.fetch(url.as_str(), budget).await {
        Ok(page) => {
            throttle(pause, budget).await;
            Some(page)
        }
        Err(FetchError::BudgetExhausted) => None,
        Err(error) => {
            tracing::debug!(url = %url, %error, "contact page fetch failed");
            None
        }
    }
}

fn is_spent(budget: &Budget) -> bool {
    budget.fetches_exhausted() || budget.is_expired()
}
