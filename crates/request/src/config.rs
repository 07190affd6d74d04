//! Network configuration shared by all requests.
//!
//! A [`NetworkConfig`] is built once and handed to every request as an `Arc`. It holds the
//! defaults a request falls back to, the policies it delegates to, and the collaborators
//! it notifies (the [`Scheduler`] and the [`EventEmitter`]).
//!
//! # Example
//!
//! ```
//! use micro_request::config::NetworkConfig;
//! use std::time::Duration;
//!
//! let config = NetworkConfig::builder()
//!     .location("https://app.test/")
//!     .timeout(Duration::from_secs(30))
//!     .csrf_token("secret")
//!     .build()
//!     .unwrap();
//!
//! assert!(config.wrap_method());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::events::{EventEmitter, TracingEmitter};
use crate::protocol::BuildError;
use crate::request::{Descriptor, MetaKey};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::utils::ensure;

pub type AutoCache = Arc<dyn Fn(&Descriptor) -> bool + Send + Sync>;

pub type MetaKeysFn = Arc<dyn Fn(&Descriptor) -> Vec<MetaKey> + Send + Sync>;

/// Which descriptor fields are sent as request metadata (and thus become part of the cache key).
#[derive(Clone)]
pub enum RequestMetaKeys {
    Fixed(Vec<MetaKey>),
    /// Chosen per request, e.g. to omit the context for cross-origin requests.
    Dynamic(MetaKeysFn),
}

impl RequestMetaKeys {
    pub fn resolve(&self, descriptor: &Descriptor) -> Vec<MetaKey> {
        match self {
            RequestMetaKeys::Fixed(keys) => keys.clone(),
            RequestMetaKeys::Dynamic(f) => f(descriptor),
        }
    }
}

impl Default for RequestMetaKeys {
    fn default() -> Self {
        RequestMetaKeys::Fixed(MetaKey::ALL.to_vec())
    }
}

impl fmt::Debug for RequestMetaKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMetaKeys::Fixed(keys) => f.debug_tuple("Fixed").field(keys).finish(),
            RequestMetaKeys::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Cross-site request forgery protection settings.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    header: String,
    param: Option<String>,
    token: Option<String>,
}

impl CsrfConfig {
    /// The header carrying the token in fragment requests.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// The form field carrying the token in full-page submissions.
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self { header: "X-CSRF-Token".to_owned(), param: None, token: None }
    }
}

pub struct NetworkConfig {
    location: Url,
    wrap_method: bool,
    method_param: String,
    auto_cache: AutoCache,
    request_meta_keys: RequestMetaKeys,
    timeout: Option<Duration>,
    csrf: CsrfConfig,
    scheduler: Arc<dyn Scheduler>,
    emitter: Arc<dyn EventEmitter>,
}

impl NetworkConfig {
    pub fn builder() -> NetworkConfigBuilder {
        NetworkConfigBuilder::new()
    }

    /// The URL of the running context. Requests resolve against it and
    /// compare their origin with it.
    pub fn location(&self) -> &Url {
        &self.location
    }

    /// Whether methods other than GET and POST are sent as POST with a method param.
    pub fn wrap_method(&self) -> bool {
        self.wrap_method
    }

    pub fn method_param(&self) -> &str {
        &self.method_param
    }

    /// Decides caching for requests with [`CachePolicy::Auto`](crate::request::CachePolicy::Auto).
    pub fn auto_cache(&self, descriptor: &Descriptor) -> bool {
        (self.auto_cache)(descriptor)
    }

    pub fn request_meta_keys(&self, descriptor: &Descriptor) -> Vec<MetaKey> {
        self.request_meta_keys.resolve(descriptor)
    }

    /// The timeout for requests that don't set their own.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn csrf(&self) -> &CsrfConfig {
        &self.csrf
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn emitter(&self) -> &dyn EventEmitter {
        self.emitter.as_ref()
    }
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("location", &self.location.as_str())
            .field("wrap_method", &self.wrap_method)
            .field("method_param", &self.method_param)
            .field("request_meta_keys", &self.request_meta_keys)
            .field("timeout", &self.timeout)
            .field("csrf", &self.csrf)
            .finish_non_exhaustive()
    }
}

pub struct NetworkConfigBuilder {
    location: Option<String>,
    wrap_method: bool,
    method_param: String,
    auto_cache: Option<AutoCache>,
    request_meta_keys: RequestMetaKeys,
    timeout: Option<Duration>,
    csrf: CsrfConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    emitter: Option<Arc<dyn EventEmitter>>,
}

impl NetworkConfigBuilder {
    fn new() -> Self {
        Self {
            location: None,
            wrap_method: true,
            method_param: "_method".to_owned(),
            auto_cache: None,
            request_meta_keys: RequestMetaKeys::default(),
            timeout: None,
            csrf: CsrfConfig::default(),
            scheduler: None,
            emitter: None,
        }
    }

    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    #[must_use]
    pub fn wrap_method(mut self, wrap_method: bool) -> Self {
        self.wrap_method = wrap_method;
        self
    }

    #[must_use]
    pub fn method_param(mut self, method_param: impl Into<String>) -> Self {
        self.method_param = method_param.into();
        self
    }

    #[must_use]
    pub fn auto_cache<F>(mut self, auto_cache: F) -> Self
    where
        F: Fn(&Descriptor) -> bool + Send + Sync + 'static,
    {
        self.auto_cache = Some(Arc::new(auto_cache));
        self
    }

    #[must_use]
    pub fn request_meta_keys(mut self, keys: impl Into<Vec<MetaKey>>) -> Self {
        self.request_meta_keys = RequestMetaKeys::Fixed(keys.into());
        self
    }

    #[must_use]
    pub fn request_meta_keys_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Descriptor) -> Vec<MetaKey> + Send + Sync + 'static,
    {
        self.request_meta_keys = RequestMetaKeys::Dynamic(Arc::new(f));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn csrf_header(mut self, header: impl Into<String>) -> Self {
        self.csrf.header = header.into();
        self
    }

    #[must_use]
    pub fn csrf_param(mut self, param: impl Into<String>) -> Self {
        self.csrf.param = Some(param.into());
        self
    }

    #[must_use]
    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn build(self) -> Result<NetworkConfig, BuildError> {
        let raw_location = self.location.ok_or(BuildError::MissingField("location"))?;
        let location = Url::parse(&raw_location).map_err(|e| BuildError::invalid_url(&raw_location, e))?;
        ensure!(!location.cannot_be_a_base(), BuildError::invalid_url(raw_location, "location cannot be a base url"));
        ensure!(!self.method_param.is_empty(), BuildError::invalid_params("method param must not be empty"));
        http::HeaderName::from_bytes(self.csrf.header.as_bytes()).map_err(BuildError::invalid_header)?;

        Ok(NetworkConfig {
            location,
            wrap_method: self.wrap_method,
            method_param: self.method_param,
            auto_cache: self.auto_cache.unwrap_or_else(|| Arc::new(Descriptor::is_safe)),
            request_meta_keys: self.request_meta_keys,
            timeout: self.timeout,
            csrf: self.csrf,
            scheduler: self.scheduler.unwrap_or_else(|| Arc::new(TokioScheduler::new())),
            emitter: self.emitter.unwrap_or_else(|| Arc::new(TracingEmitter)),
        })
    }
}

impl fmt::Debug for NetworkConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfigBuilder")
            .field("location", &self.location)
            .field("wrap_method", &self.wrap_method)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
