//! Milestone events of the request lifecycle.
//!
//! Every settled request emits exactly one event: `request:loaded` when the server
//! answered (with any status), `request:aborted` when it was aborted or timed out,
//! `request:fatal` when the transport failed. Events are delivered synchronously to
//! the configured [`EventEmitter`] while the request still holds its UI handles.

use tracing::{info, warn};

use crate::protocol::Response;
use crate::request::{LayerHandle, OriginHandle, Request};

#[derive(Debug)]
pub enum RequestEvent<'a> {
    Loaded { request: &'a Request, response: &'a Response },
    Aborted { request: &'a Request, reason: &'a str },
    Fatal { request: &'a Request, reason: &'a str },
}

impl<'a> RequestEvent<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            RequestEvent::Loaded { .. } => "request:loaded",
            RequestEvent::Aborted { .. } => "request:aborted",
            RequestEvent::Fatal { .. } => "request:fatal",
        }
    }

    pub fn request(&self) -> &'a Request {
        match self {
            RequestEvent::Loaded { request, .. }
            | RequestEvent::Aborted { request, .. }
            | RequestEvent::Fatal { request, .. } => request,
        }
    }

    /// The layer the event belongs to, if the request still holds it.
    pub fn layer(&self) -> Option<LayerHandle> {
        self.request().layer()
    }

    pub fn origin(&self) -> Option<OriginHandle> {
        self.request().origin()
    }

    /// A human-readable description for logging.
    pub fn log(&self) -> String {
        match self {
            RequestEvent::Loaded { request, response } => format!(
                "Server responded HTTP {} to {} ({} characters)",
                response.status().as_u16(),
                request.description(),
                response.text().chars().count()
            ),
            RequestEvent::Aborted { reason, .. } | RequestEvent::Fatal { reason, .. } => (*reason).to_owned(),
        }
    }
}

/// Receives the milestone events of requests.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &RequestEvent<'_>);
}

/// Writes every event as one `tracing` line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

impl EventEmitter for TracingEmitter {
    fn emit(&self, event: &RequestEvent<'_>) {
        match event {
            RequestEvent::Loaded { response, .. } => {
                info!(event = event.name(), status = response.status().as_u16(), "{}", event.log());
            }
            RequestEvent::Aborted { request, .. } => {
                info!(event = event.name(), request = %request.description(), "{}", event.log());
            }
            RequestEvent::Fatal { request, .. } => {
                warn!(event = event.name(), request = %request.description(), "{}", event.log());
            }
        }
    }
}

struct FnEmitter<F>(F);

impl<F> EventEmitter for FnEmitter<F>
where
    F: Fn(&RequestEvent<'_>) + Send + Sync,
{
    fn emit(&self, event: &RequestEvent<'_>) {
        (self.0)(event);
    }
}

/// Creates an emitter from a closure.
pub fn fn_emitter<F>(f: F) -> impl EventEmitter
where
    F: Fn(&RequestEvent<'_>) + Send + Sync,
{
    FnEmitter(f)
}
