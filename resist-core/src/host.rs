//! Hostname normalization for list entries and tab URLs

use url::Url;

/// Normalize user input into a bare lowercase hostname.
///
/// Accepts either a hostname or a full URL; a scheme is assumed when absent.
/// Returns `None` for empty or unparsable input.
pub fn normalize_host(input: &str) -> Option<String> {
    let host = input.trim().to_lowercase();
    if host.is_empty() {
        return None;
    }

    let candidate = if host.contains("://") {
        host
    } else {
        format!("https://{host}")
    };

    host_from_url(&candidate)
}

/// Hostname of a page URL, lowercased. Pages without a host (`about:blank`,
/// `data:` URLs) yield `None`.
pub fn host_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}
