//! URL normalization and comparison.
//!
//! URLs are resolved against the location of the running context. Same-origin URLs
//! are reduced to their path and query, so `http://app.test/users` and `/users`
//! produce the same cache key.

use tracing::trace;
use url::Url;

use crate::protocol::BuildError;

/// Splits `url` at the first `#`.
///
/// The returned hash includes the leading `#`. An empty fragment (`/path#`) is removed
/// from the URL but yields no hash.
pub fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.find('#') {
        Some(index) if index + 1 < url.len() => (&url[..index], Some(&url[index..])),
        Some(index) => (&url[..index], None),
        None => (url, None),
    }
}

/// Resolves `url` against `location` and strips scheme and host from same-origin URLs.
///
/// Normalizing an already normalized URL returns it unchanged.
pub fn normalize_url(url: &str, location: &Url) -> Result<String, BuildError> {
    let resolved = location.join(url).map_err(|e| BuildError::invalid_url(url, e))?;

    if resolved.origin() != location.origin() {
        return Ok(resolved.into());
    }

    let mut normalized = resolved.path().to_owned();
    if let Some(query) = resolved.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    if let Some(fragment) = resolved.fragment() {
        normalized.push('#');
        normalized.push_str(fragment);
    }
    Ok(normalized)
}

/// Returns whether `url` points to another origin than `location`.
///
/// URLs that cannot be resolved are treated as same-origin, since they
/// are never sent anywhere else.
pub fn is_cross_origin(url: &str, location: &Url) -> bool {
    match location.join(url) {
        Ok(resolved) => resolved.origin() != location.origin(),
        Err(e) => {
            trace!(url, cause = %e, "cannot resolve url for origin check");
            false
        }
    }
}

/// Compares two URLs, ignoring fragments, a trailing slash and the
/// difference between absolute and root-relative same-origin forms.
pub fn match_urls(a: &str, b: &str, location: &Url) -> bool {
    comparable(a, location) == comparable(b, location)
}

fn comparable(url: &str, location: &Url) -> String {
    let (url, _hash) = split_fragment(url);
    let mut normalized = normalize_url(url, location).unwrap_or_else(|_| url.to_owned());

    let path_end = normalized.find('?').unwrap_or(normalized.len());
    if path_end > 1 && normalized[..path_end].ends_with('/') {
        normalized.remove(path_end - 1);
    }
    normalized
}
