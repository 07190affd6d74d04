//! The seam between a request and the code that actually performs I/O.
//!
//! A request never talks to the network itself. [`Request::load`] encodes itself as an
//! [`OutgoingRequest`] and hands it to a [`Transport`] together with a set of
//! [`TransportCallbacks`]. The transport reports back exactly one of load, error, timeout
//! or abort; any report after the first one is ignored by the request.
//!
//! Full-page navigation is a separate path: [`Request::load_page`] describes the
//! navigation as a [`PageSubmission`] and the transport performs it.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::request::Request;

pub trait Transport: Send + Sync {
    /// Starts sending `request`. The returned handle cancels the exchange.
    ///
    /// Callbacks may be invoked before `send` returns.
    fn send(&self, request: OutgoingRequest, callbacks: TransportCallbacks) -> Box<dyn TransportHandle>;

    /// Replaces the current page with the result of `submission`.
    fn navigate(&self, submission: PageSubmission);

    /// Cancels every exchange started through this transport that has not finished yet.
    fn abort_in_flight(&self);
}

/// A single exchange in flight.
pub trait TransportHandle: Send {
    /// Cancels the exchange. The transport may still report `on_abort` afterwards.
    fn abort(&self);
}

/// A request as it goes over the wire.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

/// A full-page navigation, expressed like a browser form submission.
///
/// `GET` submissions carry their params in the URL and have no fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSubmission {
    pub method: Method,
    pub url: String,
    pub fields: Vec<(String, String)>,
}

/// What the transport received from the server.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    /// The URL the transport ended up at after following redirects.
    pub final_url: Option<String>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, text: impl Into<String>) -> Self {
        Self { status, headers: HeaderMap::new(), text: text.into(), final_url: None }
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    #[must_use]
    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = Some(final_url.into());
        self
    }
}

/// Reports the outcome of an exchange back to its request.
#[derive(Debug, Clone)]
pub struct TransportCallbacks {
    request: Request,
}

impl TransportCallbacks {
    pub(crate) fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The server answered, with any status.
    pub fn on_load(&self, response: TransportResponse) {
        self.request.on_load(response);
    }

    /// The exchange failed without a response, e.g. the network is down.
    pub fn on_error(&self) {
        self.request.on_error();
    }

    pub fn on_timeout(&self) {
        self.request.on_timeout();
    }

    pub fn on_abort(&self) {
        self.request.on_abort();
    }
}
