//! Shared utilities for provider modules: host matching, URL rebasing and scraping helpers.

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Normalizes a host string: lowercases, then strips a leading "www." and trailing '.'.
#[must_use]
pub(crate) fn canonical_host(host: &str) -> String {
    host.trim()
        .to_ascii_lowercase()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_string()
}

/// Returns true if the URL's host is `domain` or a subdomain of it.
#[must_use]
pub(crate) fn host_matches(url: &Url, domain: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = canonical_host(host);
    let domain = canonical_host(domain);
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Returns true for http(s) URLs.
#[must_use]
pub(crate) fn is_http_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.host_str().is_some()
}

/// Returns the non-empty path segments of `url`.
#[must_use]
pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Moves `url`'s path and query onto `base`.
///
/// Scraping providers fetch the user's URL; tests point them at a mock
/// server by rebasing onto its address.
#[must_use]
pub(crate) fn rebase(url: &Url, base: &Url) -> Url {
    let mut rebased = base.clone();
    let prefix = base.path().trim_end_matches('/');
    rebased.set_path(&format!("{prefix}{}", url.path()));
    rebased.set_query(url.query());
    rebased
}

/// Joins an API endpoint path onto a base URL that may carry its own path prefix.
#[must_use]
pub(crate) fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
    url
}

/// Resolves a possibly relative URL string against a base URL.
#[must_use]
pub(crate) fn absolutize_url(value: &str, base_url: &Url) -> Option<Url> {
    if value.starts_with("//") {
        return Url::parse(&format!("{}:{value}", base_url.scheme())).ok();
    }
    base_url.join(value).ok()
}

/// Returns the first capture of `regex` in `html`, trimmed.
#[must_use]
pub(crate) fn first_capture(html: &str, regex: &Regex) -> Option<String> {
    regex
        .captures(html)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
}

/// Returns true if the status means the session or credentials were rejected.
#[must_use]
pub(crate) fn is_auth_rejected_status(status: u16) -> bool {
    matches!(status, 401 | 403)
}
