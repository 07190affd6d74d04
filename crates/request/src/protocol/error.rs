use thiserror::Error;

use crate::protocol::Response;

/// Errors raised while building a request or one of its wire forms.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid http method: {0:?}")]
    InvalidMethod(String),

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("{0} must be set")]
    MissingField(&'static str),
}

impl BuildError {
    pub fn invalid_url<U: ToString, S: ToString>(url: U, reason: S) -> Self {
        Self::InvalidUrl { url: url.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_params<S: ToString>(str: S) -> Self {
        Self::InvalidParams { reason: str.to_string() }
    }
}

/// The reason a request's deferred response was rejected.
///
/// Every awaiter of a request observes the same rejection, so the error is `Clone`.
/// A server that answered with an error status is reported as [`RequestError::Response`]
/// and is never confused with a transport that could not complete.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// The request was aborted by the caller or timed out.
    #[error("{reason}")]
    Aborted { reason: String },

    /// The transport failed without an http status (network failure).
    #[error("{reason}")]
    Failed { reason: String },

    /// The server responded with a status outside the success range.
    #[error("server responded with http {}", .0.status())]
    Response(Box<Response>),
}

impl RequestError {
    pub fn aborted<S: ToString>(reason: S) -> Self {
        Self::Aborted { reason: reason.to_string() }
    }

    pub fn failed<S: ToString>(reason: S) -> Self {
        Self::Failed { reason: reason.to_string() }
    }

    /// A stable name for the error kind, e.g. for logging or matching in bindings.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aborted { .. } => "AbortError",
            Self::Failed { .. } => "FailedError",
            Self::Response(_) => "ResponseError",
        }
    }

    #[inline]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the server's response if this rejection was caused by an error status.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Response(response) => Some(response),
            Self::Aborted { .. } | Self::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_and_fatal_are_distinct_kinds() {
        let aborted = RequestError::aborted("Request timed out");
        let failed = RequestError::failed("Fatal error during request");

        assert!(aborted.is_abort());
        assert!(!aborted.is_fatal());
        assert!(failed.is_fatal());
        assert!(!failed.is_abort());

        assert_eq!(aborted.name(), "AbortError");
        assert_eq!(failed.name(), "FailedError");
        assert_eq!(aborted.to_string(), "Request timed out");
    }

    #[test]
    fn build_error_messages() {
        let error = BuildError::invalid_url("http://[::1", "invalid IPv6 address");
        assert_eq!(error.to_string(), "invalid url `http://[::1`: invalid IPv6 address");

        assert_eq!(BuildError::MissingField("location").to_string(), "location must be set");
    }
}
