//! The canonical form of a request.
//!
//! A [`Descriptor`] is built once from [`RequestOptions`] and normalized for caching:
//!
//! 1. the method is uppercased, defaulting to `GET`
//! 2. the `#hash` is cut off the URL and kept separately
//! 3. params of methods without a body are moved into the URL's query
//! 4. the URL is resolved, same-origin URLs lose scheme and host
//!
//! After normalization the descriptor is shared immutably, so its [`Descriptor::cache_key`]
//! cannot change while the request is queued, in flight, or cached.

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Value, json};
use url::Url;

use super::{CachePolicy, ClearCache, Context, MetaKey, MetaProps, RequestOptions};
use crate::config::NetworkConfig;
use crate::params::Params;
use crate::protocol::BuildError;
use crate::urls;

#[derive(Debug, Clone)]
pub struct Descriptor {
    method: Method,
    url: String,
    hash: Option<String>,
    params: Params,
    target: Option<String>,
    fail_target: Option<String>,
    headers: HeaderMap,
    timeout: Option<Duration>,
    preload: bool,
    cache: CachePolicy,
    clear_cache: Option<ClearCache>,
    mode: Option<String>,
    fail_mode: Option<String>,
    context: Option<Context>,
    fail_context: Option<Context>,
    wrap_method: bool,
    content_type: Option<String>,
    payload: Option<String>,
}

impl Descriptor {
    /// Builds and normalizes a descriptor. Layer, origin and callback options are not
    /// part of the descriptor and are ignored here.
    pub(crate) fn from_options(options: RequestOptions, config: &NetworkConfig) -> Result<Self, BuildError> {
        let cache = if options.preload { CachePolicy::Enabled } else { options.cache.unwrap_or_default() };

        let mut descriptor = Descriptor {
            method: normalize_method(options.method.as_deref())?,
            url: options.url.unwrap_or_default(),
            hash: None,
            params: options.params,
            target: options.target,
            fail_target: options.fail_target,
            headers: build_headers(options.headers)?,
            timeout: options.timeout.or_else(|| config.timeout()),
            preload: options.preload,
            cache,
            clear_cache: options.clear_cache,
            mode: options.mode,
            fail_mode: options.fail_mode,
            context: options.context,
            fail_context: options.fail_context,
            wrap_method: options.wrap_method.unwrap_or_else(|| config.wrap_method()),
            content_type: options.content_type,
            payload: options.payload,
        };
        descriptor.normalize(config.location())?;
        Ok(descriptor)
    }

    /// Normalizes the URL and params for caching. Normalizing twice changes nothing.
    ///
    /// An empty URL is left alone.
    pub fn normalize(&mut self, location: &Url) -> Result<(), BuildError> {
        if self.url.is_empty() {
            return Ok(());
        }

        self.extract_hash();
        self.transfer_params_to_url();
        self.url = urls::normalize_url(&self.url, location)?;
        Ok(())
    }

    fn extract_hash(&mut self) {
        let (url, hash) = urls::split_fragment(&self.url);
        if url.len() == self.url.len() {
            return;
        }

        let (url, hash) = (url.to_owned(), hash.map(str::to_owned));
        self.url = url;
        if hash.is_some() {
            self.hash = hash;
        }
    }

    fn transfer_params_to_url(&mut self) {
        if self.allows_payload() || self.params.is_empty() {
            return;
        }

        // methods without a body carry their params in the query
        self.url = self.params.to_url(&self.url);
        self.params.clear();
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The fragment cut off the original URL, including the leading `#`.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn fail_target(&self) -> Option<&str> {
        self.fail_target.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn preload(&self) -> bool {
        self.preload
    }

    pub fn cache(&self) -> CachePolicy {
        self.cache
    }

    pub fn clear_cache(&self) -> Option<&ClearCache> {
        self.clear_cache.as_ref()
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn fail_mode(&self) -> Option<&str> {
        self.fail_mode.as_deref()
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn fail_context(&self) -> Option<&Context> {
        self.fail_context.as_ref()
    }

    pub fn wrap_method(&self) -> bool {
        self.wrap_method
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Whether the method is read-only, i.e. cannot change server state.
    pub fn is_safe(&self) -> bool {
        matches!(&self.method, &Method::GET | &Method::HEAD | &Method::OPTIONS)
    }

    pub fn allows_payload(&self) -> bool {
        !matches!(&self.method, &Method::GET | &Method::HEAD)
    }

    /// Whether a `302 Found` redirect for this request is followed with `GET`.
    pub fn will_302_redirect_with_get(&self) -> bool {
        self.is_safe() || self.method == Method::POST
    }

    pub fn description(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Reads the given meta fields, leaving out fields without a value.
    pub fn meta_props(&self, keys: &[MetaKey]) -> MetaProps {
        let mut props = MetaProps::new();
        for key in keys {
            let value = match key {
                MetaKey::Target => self.target.clone().map(Value::String),
                MetaKey::FailTarget => self.fail_target.clone().map(Value::String),
                MetaKey::Mode => self.mode.clone().map(Value::String),
                MetaKey::FailMode => self.fail_mode.clone().map(Value::String),
                MetaKey::Context => self.context.clone().map(Value::Object),
                MetaKey::FailContext => self.fail_context.clone().map(Value::Object),
            };
            if let Some(value) = value {
                props.insert(*key, value);
            }
        }
        props
    }

    /// A canonical JSON array of method, URL, params and meta props.
    ///
    /// Meta props serialize with sorted keys, so equal requests always produce equal keys.
    pub fn cache_key(&self, keys: &[MetaKey]) -> String {
        json!([self.method.as_str(), self.url, self.params.to_query(), self.meta_props(keys)]).to_string()
    }
}

/// Uppercases a method name. A missing or blank method means `GET`.
pub fn normalize_method(method: Option<&str>) -> Result<Method, BuildError> {
    let method = method.map(str::trim).unwrap_or_default();
    if method.is_empty() {
        return Ok(Method::GET);
    }

    match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
        Ok(method) => Ok(method),
        Err(_) => Err(BuildError::InvalidMethod(method.to_owned())),
    }
}

fn build_headers(pairs: Vec<(String, String)>) -> Result<HeaderMap, BuildError> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BuildError::invalid_header(format!("{name}: {e}")))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|e| BuildError::invalid_header(format!("{name}: {e}")))?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> NetworkConfig {
        NetworkConfig::builder().location("http://app.test/").build().unwrap()
    }

    fn build(options: RequestOptions) -> Descriptor {
        Descriptor::from_options(options, &config()).unwrap()
    }

    #[test]
    fn get_params_move_into_url() {
        let descriptor = build(RequestOptions::new("/path#sec").method("get").params([("q", "x")]));

        assert_eq!(descriptor.method(), &Method::GET);
        assert_eq!(descriptor.url(), "/path?q=x");
        assert_eq!(descriptor.hash(), Some("#sec"));
        assert!(descriptor.params().is_empty());
    }

    #[test]
    fn transferred_params_merge_with_existing_query() {
        let descriptor = build(RequestOptions::new("http://app.test/search?page=2#results").params([("q", "a b")]));

        assert_eq!(descriptor.url(), "/search?page=2&q=a+b");
        assert_eq!(descriptor.hash(), Some("#results"));
    }

    #[test]
    fn post_params_stay_in_body() {
        let descriptor = build(RequestOptions::new("/users").method("post").params([("name", "Ada")]));

        assert_eq!(descriptor.method(), &Method::POST);
        assert_eq!(descriptor.url(), "/users");
        assert_eq!(descriptor.params().to_query(), "name=Ada");
    }

    #[test]
    fn normalize_is_idempotent() {
        let location = Url::parse("http://app.test/").unwrap();
        for options in [
            RequestOptions::new("/path#sec").params([("q", "x")]),
            RequestOptions::new("http://app.test/a/../b?c=1").method("delete").params([("id", "5")]),
            RequestOptions::new("https://cdn.test/x#y").method("head"),
        ] {
            let once = build(options);
            let mut twice = once.clone();
            twice.normalize(&location).unwrap();

            assert_eq!(once.url(), twice.url());
            assert_eq!(once.hash(), twice.hash());
            assert_eq!(once.params(), twice.params());
            assert_eq!(once.cache_key(&MetaKey::ALL), twice.cache_key(&MetaKey::ALL));
        }
    }

    #[test]
    fn empty_url_short_circuits() {
        let descriptor = build(RequestOptions::default().params([("q", "x")]));

        assert_eq!(descriptor.url(), "");
        assert_eq!(descriptor.hash(), None);
        assert_eq!(descriptor.params().to_query(), "q=x");
    }

    #[test]
    fn method_normalization() {
        assert_eq!(normalize_method(None).unwrap(), Method::GET);
        assert_eq!(normalize_method(Some("  ")).unwrap(), Method::GET);
        assert_eq!(normalize_method(Some("patch")).unwrap(), Method::PATCH);
        assert!(matches!(normalize_method(Some("get it")), Err(BuildError::InvalidMethod(_))));
    }

    #[test]
    fn invalid_headers_are_rejected() {
        let result = Descriptor::from_options(RequestOptions::new("/").header("bad name", "x"), &config());
        assert!(matches!(result, Err(BuildError::InvalidHeader { .. })));

        let result = Descriptor::from_options(RequestOptions::new("/").header("X-Note", "line\nbreak"), &config());
        assert!(matches!(result, Err(BuildError::InvalidHeader { .. })));
    }

    #[test]
    fn preload_forces_cache() {
        let descriptor = build(RequestOptions::new("/").cache(false).preload(true));
        assert_eq!(descriptor.cache(), CachePolicy::Enabled);
    }

    #[test]
    fn defaults_from_config() {
        let config = NetworkConfig::builder()
            .location("http://app.test/")
            .wrap_method(false)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let descriptor = Descriptor::from_options(RequestOptions::new("/"), &config).unwrap();
        assert!(!descriptor.wrap_method());
        assert_eq!(descriptor.timeout(), Some(Duration::from_secs(5)));

        let options = RequestOptions::new("/").timeout(Duration::from_secs(1)).wrap_method(true);
        let descriptor = Descriptor::from_options(options, &config).unwrap();
        assert!(descriptor.wrap_method());
        assert_eq!(descriptor.timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn safe_methods_and_payloads() {
        let get = build(RequestOptions::new("/"));
        let head = build(RequestOptions::new("/").method("HEAD"));
        let options = build(RequestOptions::new("/").method("options"));
        let post = build(RequestOptions::new("/").method("post"));
        let delete = build(RequestOptions::new("/").method("delete"));

        assert!(get.is_safe() && head.is_safe() && options.is_safe());
        assert!(!post.is_safe() && !delete.is_safe());

        assert!(!get.allows_payload() && !head.allows_payload());
        assert!(options.allows_payload() && post.allows_payload() && delete.allows_payload());

        assert!(get.will_302_redirect_with_get());
        assert!(post.will_302_redirect_with_get());
        assert!(!delete.will_302_redirect_with_get());
    }

    #[test]
    fn meta_props_skip_missing_fields() {
        let descriptor = build(
            RequestOptions::new("/")
                .target(".content")
                .mode("modal")
                .context(json!({ "lives": 3 }).as_object().unwrap().clone()),
        );

        let props = descriptor.meta_props(&MetaKey::ALL);
        assert_eq!(props.len(), 3);
        assert_eq!(props[&MetaKey::Target], json!(".content"));
        assert_eq!(props[&MetaKey::Mode], json!("modal"));
        assert_eq!(props[&MetaKey::Context], json!({ "lives": 3 }));

        let props = descriptor.meta_props(&[MetaKey::Target]);
        assert_eq!(props.keys().copied().collect::<Vec<_>>(), vec![MetaKey::Target]);
    }

    #[test]
    fn cache_key_format() {
        let descriptor = build(RequestOptions::new("/path").params([("q", "x")]).target(".main"));
        assert_eq!(descriptor.cache_key(&MetaKey::ALL), r#"["GET","/path?q=x","",{"target":".main"}]"#);

        let descriptor = build(RequestOptions::new("/path").method("post").params([("q", "x")]));
        assert_eq!(descriptor.cache_key(&MetaKey::ALL), r#"["POST","/path","q=x",{}]"#);
    }

    #[test]
    fn cache_key_ignores_header_and_meta_order() {
        let a = build(
            RequestOptions::new("/")
                .header("X-A", "1")
                .header("X-B", "2")
                .target(".a")
                .mode("root")
                .context(json!({ "x": 1, "y": 2 }).as_object().unwrap().clone()),
        );
        let b = build(
            RequestOptions::new("/")
                .context(json!({ "y": 2, "x": 1 }).as_object().unwrap().clone())
                .mode("root")
                .target(".a")
                .header("X-B", "2")
                .header("X-A", "1"),
        );

        assert_eq!(a.cache_key(&MetaKey::ALL), b.cache_key(&MetaKey::ALL));
        assert_eq!(
            a.cache_key(&[MetaKey::Mode, MetaKey::Target]),
            a.cache_key(&[MetaKey::Target, MetaKey::Mode])
        );
    }

    #[test]
    fn cache_key_tracks_every_input() {
        let base = build(RequestOptions::new("/a").target(".x"));
        let key = base.cache_key(&MetaKey::ALL);

        for other in [
            build(RequestOptions::new("/a").target(".x").method("post")),
            build(RequestOptions::new("/b").target(".x")),
            build(RequestOptions::new("/a").target(".x").params([("p", "1")])),
            build(RequestOptions::new("/a").target(".y")),
            build(RequestOptions::new("/a").target(".x").fail_mode("modal")),
        ] {
            assert_ne!(other.cache_key(&MetaKey::ALL), key);
        }

        // untracked fields don't matter
        let untracked = build(RequestOptions::new("/a").target(".x").fail_mode("modal"));
        assert_eq!(untracked.cache_key(&[MetaKey::Target]), base.cache_key(&[MetaKey::Target]));
    }
}
