use std::fmt;
use std::time::Duration;

use super::{CachePolicy, ClearCache, Context, LayerHandle, OriginHandle, QueuedCallback, Request};
use crate::params::Params;

/// The loose input a [`Request`] is built from.
///
/// Everything except the URL is optional. The options are normalized once when
/// the request is built and never read again.
#[derive(Default)]
pub struct RequestOptions {
    pub(crate) url: Option<String>,
    pub(crate) method: Option<String>,
    pub(crate) params: Params,
    pub(crate) target: Option<String>,
    pub(crate) fail_target: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) preload: bool,
    pub(crate) cache: Option<CachePolicy>,
    pub(crate) clear_cache: Option<ClearCache>,
    pub(crate) layer: Option<LayerHandle>,
    pub(crate) fail_layer: Option<LayerHandle>,
    pub(crate) mode: Option<String>,
    pub(crate) fail_mode: Option<String>,
    pub(crate) context: Option<Context>,
    pub(crate) fail_context: Option<Context>,
    pub(crate) origin: Option<OriginHandle>,
    pub(crate) wrap_method: Option<bool>,
    pub(crate) content_type: Option<String>,
    pub(crate) payload: Option<String>,
    pub(crate) on_queued: Option<QueuedCallback>,
    pub(crate) basic: bool,
}

macro_rules! option_setters {
    ($($(#[$doc:meta])* $name:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $name(mut self, $name: impl Into<$ty>) -> Self {
                self.$name = Some($name.into());
                self
            }
        )*
    };
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: Some(url.into()), ..Self::default() }
    }

    option_setters! {
        /// The http method, case-insensitive. Defaults to `GET`.
        method: String,
        /// The selector to update, sent as `X-Up-Target`.
        target: String,
        /// The selector to update when the server responds with an error status.
        fail_target: String,
        cache: CachePolicy,
        clear_cache: ClearCache,
        mode: String,
        fail_mode: String,
        context: Context,
        fail_context: Context,
        content_type: String,
        /// A raw body that is sent instead of the encoded params.
        payload: String,
    }

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn params(mut self, params: impl Into<Params>) -> Self {
        self.params = params.into();
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Marks the request as a preload. Preloading only makes sense with caching,
    /// so this forces the cache policy to [`CachePolicy::Enabled`].
    #[must_use]
    pub fn preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    #[must_use]
    pub fn layer(mut self, layer: LayerHandle) -> Self {
        self.layer = Some(layer);
        self
    }

    #[must_use]
    pub fn fail_layer(mut self, fail_layer: LayerHandle) -> Self {
        self.fail_layer = Some(fail_layer);
        self
    }

    #[must_use]
    pub fn origin(mut self, origin: OriginHandle) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub fn wrap_method(mut self, wrap_method: bool) -> Self {
        self.wrap_method = Some(wrap_method);
        self
    }

    #[must_use]
    pub fn on_queued<F>(mut self, on_queued: F) -> Self
    where
        F: FnOnce(&Request) + Send + 'static,
    {
        self.on_queued = Some(Box::new(on_queued));
        self
    }

    /// Skips deriving modes and contexts from the given layers.
    #[must_use]
    pub fn basic(mut self, basic: bool) -> Self {
        self.basic = basic;
        self
    }

    /// Fills in what the targeted layers imply.
    ///
    /// The fail layer defaults to the layer. Contexts default to the layer's context, or an
    /// empty context for layers that have none yet (e.g. a layer about to be opened). Modes
    /// default to the layer's mode. Explicit options always win.
    pub(crate) fn derive_layer_fields(&mut self) {
        if self.fail_layer.is_none() {
            self.fail_layer.clone_from(&self.layer);
        }

        let layer = self.layer.as_deref();
        let fail_layer = self.fail_layer.as_deref();

        if self.context.is_none() {
            self.context = Some(layer.and_then(|layer| layer.context()).unwrap_or_default());
        }
        if self.fail_context.is_none() {
            self.fail_context = Some(fail_layer.and_then(|layer| layer.context()).unwrap_or_default());
        }
        if self.mode.is_none() {
            self.mode = layer.and_then(|layer| layer.mode());
        }
        if self.fail_mode.is_none() {
            self.fail_mode = fail_layer.and_then(|layer| layer.mode());
        }
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("target", &self.target)
            .field("fail_target", &self.fail_target)
            .field("cache", &self.cache)
            .field("preload", &self.preload)
            .field("basic", &self.basic)
            .finish_non_exhaustive()
    }
}
