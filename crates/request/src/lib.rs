//! A request descriptor and lifecycle engine for client-side HTTP
//!
//! This crate turns a loose request intent (method, URL, params, headers and the fragment
//! update it is made for) into a canonical, cacheable request, drives it from creation to
//! settlement, and translates the transport's result into a domain-level response.
//!
//! It does not perform any I/O itself. Sending is delegated to a [`transport::Transport`],
//! queueing and caching are left to the caller, who gets the primitives they need: a
//! stable cache key, an idempotent abort and a settle-once response future.
//!
//! # Features
//!
//! - Normalization of method, URL, fragment and params into a stable cache key
//! - A race-safe lifecycle: abort before send, abort during send, timeout as abort
//! - Distinct rejections for aborts, transport failures and error statuses
//! - A header protocol for target metadata and the server's instructions
//! - Method wrapping and CSRF tokens for the wire and for full-page submissions
//! - Deferred release of UI handles after settlement
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use http::{Method, StatusCode};
//! use micro_request::config::NetworkConfig;
//! use micro_request::request::{Request, RequestOptions, RequestState};
//! use micro_request::transport::{
//!     OutgoingRequest, PageSubmission, Transport, TransportCallbacks, TransportHandle, TransportResponse,
//! };
//!
//! // answers every request immediately
//! struct Echo;
//!
//! struct Done;
//!
//! impl TransportHandle for Done {
//!     fn abort(&self) {}
//! }
//!
//! impl Transport for Echo {
//!     fn send(&self, request: OutgoingRequest, callbacks: TransportCallbacks) -> Box<dyn TransportHandle> {
//!         callbacks.on_load(TransportResponse::new(StatusCode::OK, format!("{} {}", request.method, request.url)));
//!         Box::new(Done)
//!     }
//!
//!     fn navigate(&self, _submission: PageSubmission) {}
//!
//!     fn abort_in_flight(&self) {}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Arc::new(NetworkConfig::builder().location("https://app.test/").build().unwrap());
//!     let request = Request::new(
//!         RequestOptions::new("/items/1").method("delete").target(".items"),
//!         config,
//!     )
//!     .unwrap();
//!
//!     request.load(&Echo);
//!     let response = request.clone().await.unwrap();
//!
//!     assert_eq!(request.state(), RequestState::Loaded);
//!     // wrapped in a POST with a `_method` param
//!     assert_eq!(response.text(), "POST /items/1");
//!     assert_eq!(response.method(), Method::DELETE);
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`request`]: options, the normalized descriptor and the request lifecycle
//! - [`params`]: ordered params and their query, urlencoded and multipart forms
//! - [`protocol`]: the `X-Up-*` header protocol, responses and errors
//! - [`transport`]: the seam to the code that performs I/O
//! - [`config`]: network defaults and policies shared by all requests
//! - [`events`]: milestone events of settled requests
//! - [`scheduler`]: deferred work after settlement
//! - [`matcher`]: selecting requests, e.g. for cache invalidation
//!
//! # Core Components
//!
//! ## Request Lifecycle
//!
//! A [`request::Request`] starts `New`, moves to `Loading` when handed to a transport, and
//! ends in exactly one of `Loaded`, `Aborted` or `Failed`. Every terminal transition
//! settles the response future once, emits one [`events::RequestEvent`], and schedules
//! the release of the request's layer and origin handles.
//!
//! ## Cache Keys
//!
//! [`request::Request::cache_key`] serializes method, URL, params and the configured meta
//! props as one canonical JSON array. The same meta props are sent to the server as
//! `X-Up-*` headers, so whatever may change the server's answer is part of the key.
//!
//! ## Error Handling
//!
//! - [`protocol::BuildError`]: invalid options or configuration
//! - [`protocol::RequestError`]: why a response future was rejected

pub mod config;
pub mod events;
pub mod matcher;
pub mod params;
pub mod protocol;
pub mod request;
pub mod scheduler;
pub mod transport;
pub mod urls;

mod utils;

pub use matcher::{RequestMatcher, UrlPattern};
