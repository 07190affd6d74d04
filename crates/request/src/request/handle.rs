use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, Weak};

use arc_swap::ArcSwap;
use bytes::Bytes;
use futures::FutureExt;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, Method};
use serde_json::Value;
use tracing::{debug, error, trace};

use super::lifecycle::{Lifecycle, Member, MemberRef};
use super::{
    CachePolicy, Descriptor, LayerHandle, MetaProps, OriginHandle, Outcome, QueuedCallback, RequestOptions,
    RequestState, ResponseFuture,
};
use crate::config::NetworkConfig;
use crate::events::RequestEvent;
use crate::params::Payload;
use crate::protocol::{BuildError, RequestError, Response, headers};
use crate::transport::{
    OutgoingRequest, PageSubmission, Transport, TransportCallbacks, TransportHandle, TransportResponse,
};
use crate::urls;
use crate::utils::lock;

/// A shared handle to one request.
///
/// Cloning the handle is cheap and every clone observes the same state. The request
/// settles its [`ResponseFuture`] exactly once: with the [`Response`] for a 2xx status,
/// or with a [`RequestError`] for any other status, an abort, a timeout or a transport
/// failure.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use micro_request::config::NetworkConfig;
/// use micro_request::request::{Request, RequestOptions, RequestState};
///
/// let config = Arc::new(NetworkConfig::builder().location("https://app.test/").build().unwrap());
/// let request = Request::new(RequestOptions::new("/search#results").params([("q", "rust")]), config).unwrap();
///
/// assert_eq!(request.url(), "/search?q=rust");
/// assert_eq!(request.hash(), Some("#results"));
/// assert_eq!(request.state(), RequestState::New);
/// ```
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

struct Inner {
    descriptor: Arc<Descriptor>,
    lifecycle: ArcSwap<Lifecycle>,
    ui: Mutex<UiRefs>,
    transport: Mutex<Option<Box<dyn TransportHandle>>>,
    on_queued: Mutex<Option<QueuedCallback>>,
    config: Arc<NetworkConfig>,
}

#[derive(Default)]
struct UiRefs {
    layer: Option<LayerHandle>,
    fail_layer: Option<LayerHandle>,
    origin: Option<OriginHandle>,
}

impl Member for Inner {
    fn abort_transport(&self) {
        let handle = lock(&self.transport).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn evict(&self) {
        *lock(&self.ui) = UiRefs::default();
        // the handle may hold callbacks pointing back at this request
        let handle = lock(&self.transport).take();
        drop(handle);
        trace!(request = %self.descriptor.description(), "released ui handles of settled request");
    }
}

impl Request {
    /// Normalizes `options` into a new request in the `New` state.
    pub fn new(mut options: RequestOptions, config: Arc<NetworkConfig>) -> Result<Self, BuildError> {
        if !options.basic {
            options.derive_layer_fields();
        }

        let ui = UiRefs {
            layer: options.layer.take(),
            fail_layer: options.fail_layer.take(),
            origin: options.origin.take(),
        };
        let on_queued = options.on_queued.take();
        let descriptor = Descriptor::from_options(options, &config)?;
        let lifecycle = Arc::new(Lifecycle::new(descriptor.preload()));

        let request = Self {
            inner: Arc::new(Inner {
                descriptor: Arc::new(descriptor),
                lifecycle: ArcSwap::new(Arc::clone(&lifecycle)),
                ui: Mutex::new(ui),
                transport: Mutex::new(None),
                on_queued: Mutex::new(on_queued),
                config,
            }),
        };
        lifecycle.join(request.member());
        Ok(request)
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.inner.descriptor
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<Descriptor> {
        Arc::clone(&self.inner.descriptor)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.inner.config
    }

    pub fn method(&self) -> &Method {
        self.descriptor().method()
    }

    pub fn url(&self) -> &str {
        self.descriptor().url()
    }

    pub fn hash(&self) -> Option<&str> {
        self.descriptor().hash()
    }

    /// `METHOD url`, for log messages.
    pub fn description(&self) -> String {
        self.descriptor().description()
    }

    pub fn state(&self) -> RequestState {
        self.lifecycle().state()
    }

    pub fn preload(&self) -> bool {
        self.lifecycle().preload()
    }

    /// The targeted layer. `None` once the request settled and released its handles.
    pub fn layer(&self) -> Option<LayerHandle> {
        lock(&self.inner.ui).layer.clone()
    }

    pub fn fail_layer(&self) -> Option<LayerHandle> {
        lock(&self.inner.ui).fail_layer.clone()
    }

    pub fn origin(&self) -> Option<OriginHandle> {
        lock(&self.inner.ui).origin.clone()
    }

    pub fn is_safe(&self) -> bool {
        self.descriptor().is_safe()
    }

    pub fn allows_payload(&self) -> bool {
        self.descriptor().allows_payload()
    }

    pub fn will_302_redirect_with_get(&self) -> bool {
        self.descriptor().will_302_redirect_with_get()
    }

    pub fn is_cross_origin(&self) -> bool {
        urls::is_cross_origin(self.url(), self.inner.config.location())
    }

    /// Whether the response may be served from and stored in a cache.
    pub fn will_cache(&self) -> bool {
        match self.descriptor().cache() {
            CachePolicy::Enabled => true,
            CachePolicy::Disabled => false,
            CachePolicy::Auto => self.inner.config.auto_cache(self.descriptor()),
        }
    }

    /// The meta fields the configuration sends to the server.
    pub fn meta_props(&self) -> MetaProps {
        let keys = self.inner.config.request_meta_keys(self.descriptor());
        self.descriptor().meta_props(&keys)
    }

    pub fn cache_key(&self) -> String {
        let keys = self.inner.config.request_meta_keys(self.descriptor());
        self.descriptor().cache_key(&keys)
    }

    pub fn csrf_header(&self) -> &str {
        self.inner.config.csrf().header()
    }

    pub fn csrf_param(&self) -> Option<&str> {
        self.inner.config.csrf().param()
    }

    /// The CSRF token to send. Safe and cross-origin requests send none.
    pub fn csrf_token(&self) -> Option<&str> {
        if self.is_safe() || self.is_cross_origin() {
            return None;
        }
        self.inner.config.csrf().token()
    }

    /// Whether both handles point to the same request.
    pub fn ptr_eq(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A future for the outcome. Can be called any number of times.
    pub fn response(&self) -> ResponseFuture {
        self.lifecycle().future()
    }

    /// The outcome if the request has settled.
    pub fn outcome(&self) -> Option<Outcome> {
        self.response().now_or_never()
    }

    /// Runs the `on_queued` callback. Later calls do nothing.
    pub fn run_queued_callbacks(&self) {
        let callback = lock(&self.inner.on_queued).take();
        if let Some(callback) = callback {
            callback(self);
        }
    }

    /// Mirrors the state and outcome of `source` from now on.
    ///
    /// Used when a cached request stands in for this one. This request keeps its own
    /// descriptor and UI handles, and releases them when the shared lifecycle settles.
    /// Aborting either request aborts both.
    pub fn follow_state(&self, source: &Request) {
        if self.ptr_eq(source) {
            return;
        }
        let lifecycle = source.lifecycle();
        self.inner.lifecycle.store(Arc::clone(&lifecycle));
        if !lifecycle.join(self.member()) {
            // the source settled before we followed it
            self.schedule_eviction(vec![self.member()]);
        }
    }

    /// Sends the request through `transport`.
    ///
    /// Only a new request is sent. A request that was aborted while queued stays unsent.
    pub fn load(&self, transport: &dyn Transport) {
        if !self.lifecycle().transition(&[RequestState::New], RequestState::Loading) {
            debug!(request = %self.description(), state = %self.state(), "skip loading request that is not new");
            return;
        }

        let outgoing = match self.outgoing() {
            Ok(outgoing) => outgoing,
            Err(e) => {
                error!(request = %self.description(), cause = %e, "failed to encode request");
                self.on_error();
                return;
            }
        };

        trace!(request = %self.description(), "sending request");
        let handle = transport.send(outgoing, TransportCallbacks::new(self.clone()));

        let mut slot = lock(&self.inner.transport);
        match self.state() {
            RequestState::Loading => *slot = Some(handle),
            RequestState::Aborted => {
                // aborted while the transport was starting up
                drop(slot);
                handle.abort();
            }
            _ => {}
        }
    }

    /// Replaces the current page with the result of this request.
    ///
    /// Exchanges still in flight are cancelled first, their callbacks must not touch the
    /// page that is about to be replaced.
    pub fn load_page(&self, transport: &dyn Transport) {
        transport.abort_in_flight();
        transport.navigate(self.page_submission());
    }

    /// Aborts a new or loading request. Returns `false` if the request had already settled.
    ///
    /// The transport exchange is cancelled, also when it was sent by the request this one
    /// follows.
    pub fn abort(&self) -> bool {
        let Some(members) = self.set_aborted_state(None) else {
            return false;
        };
        for member in members.iter().filter_map(Weak::upgrade) {
            member.abort_transport();
        }
        self.schedule_eviction(members);
        true
    }

    /// Encodes the request for the wire.
    ///
    /// Methods other than GET and POST are wrapped in a POST with a method param, unless
    /// wrapping is disabled. Meta props and the CSRF token become headers.
    pub fn outgoing(&self) -> Result<OutgoingRequest, BuildError> {
        let descriptor = self.descriptor();
        let config = &self.inner.config;

        let mut method = descriptor.method().clone();
        let mut params = descriptor.params().clone();
        if descriptor.wrap_method() && method != Method::GET && method != Method::POST {
            params.add(config.method_param(), method.as_str());
            method = Method::POST;
        }

        let mut headers = descriptor.headers().clone();
        for (key, value) in self.meta_props() {
            let value = match value {
                Value::String(value) => value,
                other => other.to_string(),
            };
            headers.insert(headers::meta_header(key), header_value(&key.to_string(), &value)?);
        }

        if let Some(token) = self.csrf_token() {
            let name = self.csrf_header();
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BuildError::invalid_header(format!("{name}: {e}")))?;
            headers.insert(header_name, header_value(name, token)?);
        }

        let payload = match descriptor.payload() {
            Some(raw) => Some(Payload {
                content_type: descriptor.content_type().map(str::to_owned).unwrap_or_default(),
                body: Bytes::copy_from_slice(raw.as_bytes()),
            }),
            None if method != Method::GET && method != Method::HEAD && !params.is_empty() => {
                Some(match descriptor.content_type() {
                    None => params.to_payload(),
                    Some(content_type) if content_type.starts_with(mime::MULTIPART_FORM_DATA.essence_str()) => {
                        params.to_multipart()
                    }
                    Some(content_type) => {
                        Payload { content_type: content_type.to_owned(), body: Bytes::from(params.to_query()) }
                    }
                })
            }
            None => None,
        };

        let body = match payload {
            Some(Payload { content_type, body }) => {
                if !content_type.is_empty() {
                    headers.insert(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), &content_type)?);
                }
                Some(body)
            }
            None => None,
        };

        Ok(OutgoingRequest { method, url: descriptor.url().to_owned(), headers, body, timeout: descriptor.timeout() })
    }

    /// Describes the request as a browser form submission.
    ///
    /// A page can only be submitted with GET or POST, other methods always travel as POST
    /// with a method param. The CSRF token becomes a field. Custom headers and binary
    /// params cannot be expressed and are dropped.
    pub fn page_submission(&self) -> PageSubmission {
        let descriptor = self.descriptor();

        let mut method = descriptor.method().clone();
        let mut params = descriptor.params().clone();
        if method != Method::GET && method != Method::POST {
            params.add(self.inner.config.method_param(), method.as_str());
            method = Method::POST;
        }
        if let (Some(param), Some(token)) = (self.csrf_param(), self.csrf_token()) {
            params.add(param, token);
        }
        if params.has_binary() {
            debug!(request = %self.description(), "binary params cannot be submitted with a page load");
        }

        let hash = descriptor.hash().unwrap_or_default();
        if method == Method::GET {
            let url = params.to_url(descriptor.url());
            PageSubmission { method, url: format!("{url}{hash}"), fields: Vec::new() }
        } else {
            PageSubmission { method, url: format!("{}{hash}", descriptor.url()), fields: params.text_pairs() }
        }
    }

    pub(crate) fn on_load(&self, raw: TransportResponse) {
        if self.state() != RequestState::Loading {
            trace!(
                request = %self.description(),
                state = %self.state(),
                "ignore response of request that is not loading"
            );
            return;
        }

        let response = Response::from_transport(self.shared_descriptor(), raw, self.inner.config.location());
        self.respond_with(response);
    }

    pub(crate) fn on_error(&self) {
        let lifecycle = self.lifecycle();
        if !lifecycle.transition(&[RequestState::New, RequestState::Loading], RequestState::Failed) {
            trace!(request = %self.description(), "ignore transport error of settled request");
            return;
        }

        // transports cannot tell why the network failed
        let reason = "Fatal error during request";
        lifecycle.settle(Err(RequestError::failed(reason)));
        self.emit(&RequestEvent::Fatal { request: self, reason });
        self.schedule_eviction(lifecycle.take_members());
    }

    pub(crate) fn on_timeout(&self) {
        if let Some(members) = self.set_aborted_state(Some("Request timed out")) {
            self.schedule_eviction(members);
        }
    }

    pub(crate) fn on_abort(&self) {
        if let Some(members) = self.set_aborted_state(None) {
            self.schedule_eviction(members);
        }
    }

    fn respond_with(&self, response: Response) {
        let lifecycle = self.lifecycle();
        if !lifecycle.transition(&[RequestState::Loading], RequestState::Loaded) {
            return;
        }

        self.emit(&RequestEvent::Loaded { request: self, response: &response });
        let outcome = if response.ok() { Ok(response) } else { Err(RequestError::Response(Box::new(response))) };
        lifecycle.settle(outcome);
        self.schedule_eviction(lifecycle.take_members());
    }

    /// Settles as aborted and returns the members to release, or `None` if already settled.
    fn set_aborted_state(&self, reason: Option<&str>) -> Option<Vec<MemberRef>> {
        let lifecycle = self.lifecycle();
        if !lifecycle.transition(&[RequestState::New, RequestState::Loading], RequestState::Aborted) {
            return None;
        }

        let reason = reason.map_or_else(|| format!("Request to {} was aborted", self.description()), str::to_owned);
        self.emit(&RequestEvent::Aborted { request: self, reason: &reason });
        lifecycle.settle(Err(RequestError::aborted(&reason)));
        Some(lifecycle.take_members())
    }

    fn emit(&self, event: &RequestEvent<'_>) {
        self.inner.config.emitter().emit(event);
    }

    /// Releases the handles of `members` on a later tick.
    fn schedule_eviction(&self, members: Vec<MemberRef>) {
        if members.is_empty() {
            return;
        }
        self.inner.config.scheduler().defer(Box::new(move || {
            for member in members.iter().filter_map(Weak::upgrade) {
                member.evict();
            }
        }));
    }

    fn member(&self) -> MemberRef {
        Arc::downgrade(&(self.inner.clone() as Arc<dyn Member>))
    }

    fn lifecycle(&self) -> Arc<Lifecycle> {
        self.inner.lifecycle.load_full()
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, BuildError> {
    HeaderValue::from_bytes(value.as_bytes()).map_err(|e| BuildError::invalid_header(format!("{name}: {e}")))
}

impl IntoFuture for Request {
    type Output = Outcome;
    type IntoFuture = ResponseFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.response()
    }
}

impl IntoFuture for &Request {
    type Output = Outcome;
    type IntoFuture = ResponseFuture;

    fn into_future(self) -> Self::IntoFuture {
        self.response()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", self.method())
            .field("url", &self.url())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
