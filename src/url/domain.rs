use super::normalize::parse_site_url;
use url::Url;

/// Returns the host key used for per-host failure tracking
///
/// The key is the lowercase host with a leading `www.` removed, so
/// `www.example.com` and `example.com` share one circuit. Bare domains
/// without a scheme are accepted.
///
/// # Arguments
///
/// * `raw` - A URL or bare domain
///
/// # Returns
///
/// The host key, or an empty string if no host can be found
///
/// # Examples
///
/// ```
/// use lead_ripple::url::host_key;
///
/// assert_eq!(host_key("https://WWW.Example.com/contact"), "example.com");
/// assert_eq!(host_key("example.com"), "example.com");
/// assert_eq!(host_key(""), "");
/// ```
pub fn host_key(raw: &str) -> String {
    parse_site_url(raw)
        .map(|url| host_key_of(&url))
        .unwrap_or_default()
}

/// Host key of an already-parsed URL
pub fn host_key_of(url: &Url) -> String {
    url.host_str()
        .map(|h| {
            let lowered = h.to_lowercase();
            lowered
                .strip_prefix("www.")
                .map(str::to_string)
                .unwrap_or(lowered)
        })
        .unwrap_or_default()
}

/// Resolves an href against a base URL
///
/// Returns None for empty hrefs and for anything that does not resolve to
/// an HTTP(S) URL.
pub fn absolutize(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// The scheme-and-host root of a URL (`https://example.com/`)
pub fn root_url(url: &Url) -> Url {
    let mut root = url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}
