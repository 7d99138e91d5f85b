use crate::url::absolutize;
use scraper::{Html, Selector};
use url::Url;

/// Social profile links found on a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Socials {
    pub instagram: String,
    pub facebook: String,
    pub tiktok: String,
}

impl Socials {
    fn is_complete(&self) -> bool {
        !self.instagram.is_empty() && !self.facebook.is_empty() && !self.tiktok.is_empty()
    }
}

/// Finds the first Instagram, Facebook and TikTok link on a page
///
/// Links are resolved against `base` and their query string is dropped.
pub fn extract_socials(document: &Html, base: &Url) -> Socials {
    let mut socials = Socials::default();
    let Ok(selector) = Selector::parse("a[href]") else {
        return socials;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = absolutize(href, base) else {
            continue;
        };
        let absolute = absolute.to_string();
        let lowered = absolute.to_lowercase();
        let without_query = || absolute.split('?').next().unwrap_or_default().to_string();

        if lowered.contains("instagram.com") {
            if socials.instagram.is_empty() {
                socials.instagram = without_query();
            }
        } else if lowered.contains("facebook.com") {
            if socials.facebook.is_empty() {
                socials.facebook = without_query();
            }
        } else if lowered.contains("tiktok.com") && socials.tiktok.is_empty() {
            socials.tiktok = without_query();
        }

        if socials.is_complete() {
            break;
        }
    }

    socials
}
