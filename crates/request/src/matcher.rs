//! Selecting requests, e.g. the cached requests a `clear_cache` instruction applies to.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::request::{ClearCache, Request};
use crate::urls;

pub type Predicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Decides whether a request is selected.
#[derive(Clone)]
pub enum RequestMatcher {
    Predicate(Predicate),
    /// Selects this very request, not requests that merely look the same.
    Request(Request),
    Pattern(UrlPattern),
    Constant(bool),
}

impl RequestMatcher {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        RequestMatcher::Predicate(Arc::new(f))
    }

    /// Selects the requests a cache should drop for `clear_cache`.
    pub fn for_clear_cache(clear_cache: &ClearCache, location: &Url) -> Self {
        match clear_cache {
            ClearCache::Keep => RequestMatcher::Constant(false),
            ClearCache::All => RequestMatcher::Constant(true),
            ClearCache::Pattern(pattern) => RequestMatcher::Pattern(UrlPattern::new(pattern, location)),
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        match self {
            RequestMatcher::Predicate(predicate) => predicate(request),
            RequestMatcher::Request(selected) => selected.ptr_eq(request),
            RequestMatcher::Pattern(pattern) => pattern.matches(request.url()),
            RequestMatcher::Constant(value) => *value,
        }
    }
}

impl From<bool> for RequestMatcher {
    fn from(value: bool) -> Self {
        RequestMatcher::Constant(value)
    }
}

impl From<Request> for RequestMatcher {
    fn from(request: Request) -> Self {
        RequestMatcher::Request(request)
    }
}

impl From<UrlPattern> for RequestMatcher {
    fn from(pattern: UrlPattern) -> Self {
        RequestMatcher::Pattern(pattern)
    }
}

impl fmt::Debug for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMatcher::Predicate(_) => f.write_str("Predicate(..)"),
            RequestMatcher::Request(request) => f.debug_tuple("Request").field(request).finish(),
            RequestMatcher::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            RequestMatcher::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// A set of URL globs, separated by whitespace.
///
/// `*` matches any run of characters. An alternative prefixed with `-` excludes the URLs
/// it matches. Alternatives without a query also match URLs that have one, so
/// `/users/*` selects `/users/1?tab=posts`.
///
/// ```
/// use micro_request::UrlPattern;
/// use url::Url;
///
/// let location = Url::parse("https://app.test/").unwrap();
/// let pattern = UrlPattern::new("/users/* -/users/admin", &location);
///
/// assert!(pattern.matches("/users/7"));
/// assert!(!pattern.matches("/users/admin"));
/// assert!(!pattern.matches("/posts/7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl UrlPattern {
    /// Parses `pattern`, resolving each alternative like a request URL against `location`.
    pub fn new(pattern: &str, location: &Url) -> Self {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for alternative in pattern.split_whitespace() {
            let (list, glob) = match alternative.strip_prefix('-') {
                Some(glob) => (&mut excludes, glob),
                None => (&mut includes, alternative),
            };
            let (glob, _hash) = urls::split_fragment(glob);
            list.push(urls::normalize_url(glob, location).unwrap_or_else(|_| glob.to_owned()));
        }
        Self { includes, excludes }
    }

    /// Tests a normalized URL.
    pub fn matches(&self, url: &str) -> bool {
        let (url, _hash) = urls::split_fragment(url);
        self.includes.iter().any(|glob| glob_matches_url(glob, url))
            && !self.excludes.iter().any(|glob| glob_matches_url(glob, url))
    }
}

fn glob_matches_url(glob: &str, url: &str) -> bool {
    if glob_matches(glob, url) {
        return true;
    }
    match url.split_once('?') {
        Some((path, _query)) if !glob.contains('?') => glob_matches(glob, path),
        _ => false,
    }
}

fn glob_matches(glob: &str, text: &str) -> bool {
    let glob = glob.as_bytes();
    let text = text.as_bytes();
    let (mut g, mut t) = (0, 0);
    // position of the last `*` and the text index it currently covers up to
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if g < glob.len() && glob[g] == b'*' {
            backtrack = Some((g, t));
            g += 1;
        } else if g < glob.len() && glob[g] == text[t] {
            g += 1;
            t += 1;
        } else if let Some((star, covered)) = backtrack {
            g = star + 1;
            t = covered + 1;
            backtrack = Some((star, t));
        } else {
            return false;
        }
    }
    glob[g..].iter().all(|&byte| byte == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::request::RequestOptions;

    fn location() -> Url {
        Url::parse("http://app.test/").unwrap()
    }

    fn request(url: &str) -> Request {
        let config = NetworkConfig::builder().location("http://app.test/").build().unwrap();
        Request::new(RequestOptions::new(url), Arc::new(config)).unwrap()
    }

    #[test]
    fn globs() {
        assert!(glob_matches("/users/*", "/users/1"));
        assert!(glob_matches("/users/*/edit", "/users/1/edit"));
        assert!(glob_matches("*", ""));
        assert!(glob_matches("/a*b*c", "/aXbYbZc"));
        assert!(!glob_matches("/users/*/edit", "/users/1/show"));
        assert!(!glob_matches("/users", "/users/1"));
    }

    #[test]
    fn pattern_alternatives_and_queries() {
        let pattern = UrlPattern::new("/users/* http://app.test/posts", &location());

        assert!(pattern.matches("/users/1?tab=posts"));
        assert!(pattern.matches("/posts"));
        assert!(pattern.matches("/posts#comments"));
        assert!(!pattern.matches("/posts/1"));

        let with_query = UrlPattern::new("/search?q=*", &location());
        assert!(with_query.matches("/search?q=rust"));
        assert!(!with_query.matches("/search"));
    }

    #[test]
    fn matcher_kinds() {
        let selected = request("/users/1");
        let twin = request("/users/1");

        assert!(RequestMatcher::from(selected.clone()).matches(&selected));
        assert!(!RequestMatcher::from(selected.clone()).matches(&twin));
        assert!(RequestMatcher::from(true).matches(&twin));
        assert!(RequestMatcher::predicate(|request| request.is_safe()).matches(&twin));
        assert!(RequestMatcher::from(UrlPattern::new("/users/*", &location())).matches(&twin));
    }

    #[test]
    fn clear_cache_instructions() {
        let request = request("/users/1");

        assert!(!RequestMatcher::for_clear_cache(&ClearCache::Keep, &location()).matches(&request));
        assert!(RequestMatcher::for_clear_cache(&ClearCache::All, &location()).matches(&request));
        let pattern = ClearCache::Pattern("/posts/* /users/*".to_owned());
        assert!(RequestMatcher::for_clear_cache(&pattern, &location()).matches(&request));
    }
}
