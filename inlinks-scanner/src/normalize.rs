//! Link canonicalization and domain confinement.
//!
//! Every href found on a page goes through [`normalize_and_filter`] before it
//! can become a frontier entry or a graph edge. The returned string is the
//! URL key used everywhere else in the crawl.

use tracing::debug;
use url::Url;

/// Suffixes of resources that are never HTML pages, plus the `tel:` marker
/// and a bare trailing `#`.
pub const DENIED_SUFFIXES: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".css", ".js", ".pdf", ".webp", ".svg", ".ico", ".xml",
    ".xlsx", ".json", ".zip", "tel:", "#",
];

/// Path fragments that mark outbound redirectors, feeds and search helpers.
const DENIED_PATH_MARKERS: &[&str] = &["/out/", "/feed/", "site:"];

/// `host[:port]` of a URL, or `None` when the URL has no host.
///
/// The port is only present when it is not the scheme default, which is how
/// the `url` crate serializes it.
pub fn network_location(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// True when both URLs point at the same network location.
pub fn is_same_location(a: &Url, b: &Url) -> bool {
    network_location(a) == network_location(b)
}

/// Resolve `raw_href` against the page it was found on and decide whether it
/// is an in-scope crawl target.
///
/// Returns the fragment-less absolute URL on acceptance. Scheme differences
/// on the same host are accepted; trailing slashes and query strings are
/// left exactly as written.
pub fn normalize_and_filter(raw_href: &str, base_url: &Url, current_page_url: &Url) -> Option<String> {
    // An empty href resolves to the page itself.
    let resolved = current_page_url.join(raw_href.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        debug!("Rejecting non-web link: {}", resolved);
        return None;
    }

    let mut canonical = resolved.clone();
    canonical.set_fragment(None);

    if has_denied_suffix(resolved.as_str()) || has_denied_suffix(canonical.as_str()) {
        debug!("Rejecting resource link: {}", resolved);
        return None;
    }

    if resolved.as_str().contains("mailto:") {
        return None;
    }

    let path = resolved.path();
    if DENIED_PATH_MARKERS.iter().any(|marker| path.contains(marker)) {
        debug!("Rejecting marked path: {}", resolved);
        return None;
    }

    // A location-less result inherits the base domain.
    if let Some(location) = network_location(&resolved)
        && Some(&location) != network_location(base_url).as_ref()
    {
        debug!("Rejecting off-domain link: {}", resolved);
        return None;
    }

    Some(canonical.to_string())
}

fn has_denied_suffix(url: &str) -> bool {
    let lowered = url.to_ascii_lowercase();
    DENIED_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}
