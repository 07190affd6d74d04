//! The header protocol spoken between client and server.
//!
//! Requests carry metadata about the fragment update they are made for (target selectors,
//! layer modes and contexts) in `X-Up-*` request headers. The server may answer with
//! `X-Up-*` response headers that override what the client assumed: the final location
//! and method after redirects, a document title, a new target, layer signals,
//! events to emit, context changes and cache invalidation.
//!
//! # Components
//!
//! - [`headers`]: header names and extraction of the server's instructions
//! - [`Response`]: the domain-level response translated from a transport result
//! - [`BuildError`] / [`RequestError`]: construction errors and rejection reasons

pub mod headers;

mod error;
pub use error::BuildError;
pub use error::RequestError;

mod response;
pub use response::Response;

pub use headers::EventPlan;
