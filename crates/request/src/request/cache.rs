use std::fmt;

/// Whether the response to a request may be cached by the surrounding queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    Enabled,
    #[default]
    Disabled,
    /// Delegate the decision to the configured auto-cache policy.
    Auto,
}

impl From<bool> for CachePolicy {
    fn from(enabled: bool) -> Self {
        if enabled { CachePolicy::Enabled } else { CachePolicy::Disabled }
    }
}

/// Which cached responses to drop after a request, or after a response that says so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearCache {
    /// Keep the cache as it is.
    Keep,
    /// Drop every cached response.
    All,
    /// Drop responses whose URL matches this pattern, see [`crate::UrlPattern`].
    Pattern(String),
}

impl ClearCache {
    /// Parses the wire form: `false` keeps the cache, `*` or `true` clears everything,
    /// anything else is a URL pattern.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "false" => ClearCache::Keep,
            "*" | "true" => ClearCache::All,
            pattern => ClearCache::Pattern(pattern.to_owned()),
        }
    }
}

impl fmt::Display for ClearCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearCache::Keep => f.write_str("false"),
            ClearCache::All => f.write_str("*"),
            ClearCache::Pattern(pattern) => f.write_str(pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        for raw in ["false", "*", "/users/*"] {
            assert_eq!(ClearCache::parse(raw).to_string(), raw);
        }
        assert_eq!(ClearCache::parse(" true "), ClearCache::All);
    }

    #[test]
    fn cache_policy_from_bool() {
        assert_eq!(CachePolicy::from(true), CachePolicy::Enabled);
        assert_eq!(CachePolicy::from(false), CachePolicy::Disabled);
        assert_eq!(CachePolicy::default(), CachePolicy::Disabled);
    }
}
