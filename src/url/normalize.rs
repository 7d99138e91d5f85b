use crate::UrlError;
use url::Url;

/// Tracking query parameters removed during cleaning
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid"];

/// Parses a website value from a record into a fetchable URL
///
/// Record values are often bare domains (`example.com`), so a missing
/// scheme is completed with `http://`; the server is expected to redirect
/// to HTTPS where it serves it.
///
/// # Arguments
///
/// * `raw` - The website string as found in the record
///
/// # Returns
///
/// * `Ok(Url)` - An absolute HTTP(S) URL with a host
/// * `Err(UrlError)` - The value cannot be turned into a fetchable URL
///
/// # Examples
///
/// ```
/// use lead_ripple::url::parse_site_url;
///
/// let url = parse_site_url("example.com/taproom").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/taproom");
/// ```
pub fn parse_site_url(raw: &str) -> Result<Url, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(UrlError::InvalidScheme(trimmed.to_string()));
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}

/// Canonicalizes a URL field for output
///
/// # Cleaning Steps
///
/// 1. Lowercase the host and remove a leading `www.`
/// 2. Remove tracking query parameters (`utm_*`, `fbclid`, `gclid`, ...)
/// 3. Remove the fragment
///
/// Scheme, path and the order of the remaining parameters are kept. Values
/// that do not parse as absolute URLs are returned trimmed but otherwise
/// untouched, and empty input stays empty.
///
/// # Examples
///
/// ```
/// use lead_ripple::url::clean_url;
///
/// let cleaned = clean_url("https://WWW.Example.com/Menu?utm_source=ig&page=2#top");
/// assert_eq!(cleaned, "https://example.com/Menu?page=2");
/// ```
pub fn clean_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut url = match Url::parse(trimmed) {
        Ok(url) if url.host_str().is_some() => url,
        _ => return trimmed.to_string(),
    };

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        let stripped = lowered.strip_prefix("www.").unwrap_or(&lowered).to_string();
        if stripped != host && url.set_host(Some(&stripped)).is_err() {
            return trimmed.to_string();
        }
    }

    url.set_fragment(None);

    if url.query_pairs().any(|(key, _)| is_tracking_param(&key)) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}
