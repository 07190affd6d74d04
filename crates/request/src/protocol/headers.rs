//! Protocol header names and parsers for the server's response instructions.
//!
//! All parsers are lenient: a header that is missing yields `None`, a header
//! that cannot be decoded is logged and ignored instead of failing the response.

use http::{HeaderMap, HeaderName, Method};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::request::{ClearCache, Context, MetaKey};

pub const X_UP_TARGET: HeaderName = HeaderName::from_static("x-up-target");
pub const X_UP_FAIL_TARGET: HeaderName = HeaderName::from_static("x-up-fail-target");
pub const X_UP_MODE: HeaderName = HeaderName::from_static("x-up-mode");
pub const X_UP_FAIL_MODE: HeaderName = HeaderName::from_static("x-up-fail-mode");
pub const X_UP_CONTEXT: HeaderName = HeaderName::from_static("x-up-context");
pub const X_UP_FAIL_CONTEXT: HeaderName = HeaderName::from_static("x-up-fail-context");

pub const X_UP_LOCATION: HeaderName = HeaderName::from_static("x-up-location");
pub const X_UP_METHOD: HeaderName = HeaderName::from_static("x-up-method");
pub const X_UP_TITLE: HeaderName = HeaderName::from_static("x-up-title");
pub const X_UP_ACCEPT_LAYER: HeaderName = HeaderName::from_static("x-up-accept-layer");
pub const X_UP_DISMISS_LAYER: HeaderName = HeaderName::from_static("x-up-dismiss-layer");
pub const X_UP_EVENTS: HeaderName = HeaderName::from_static("x-up-events");
pub const X_UP_CLEAR_CACHE: HeaderName = HeaderName::from_static("x-up-clear-cache");

/// Returns the request header that carries the given meta prop to the server.
pub fn meta_header(key: MetaKey) -> HeaderName {
    match key {
        MetaKey::Target => X_UP_TARGET,
        MetaKey::FailTarget => X_UP_FAIL_TARGET,
        MetaKey::Mode => X_UP_MODE,
        MetaKey::FailMode => X_UP_FAIL_MODE,
        MetaKey::Context => X_UP_CONTEXT,
        MetaKey::FailContext => X_UP_FAIL_CONTEXT,
    }
}

/// An event the server asks the client to emit after the response was processed.
///
/// Sent as a JSON array in the `X-Up-Events` header, e.g.
/// `[{ "type": "user:created", "id": 5 }]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventPlan {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(flatten)]
    pub props: Map<String, Value>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(str) => Some(str),
        Err(e) => {
            warn!(header = %name, cause = %e, "ignore protocol header with non visible ascii value");
            None
        }
    }
}

fn json_header<T: for<'de> Deserialize<'de>>(headers: &HeaderMap, name: &HeaderName) -> Option<T> {
    let raw = header_str(headers, name)?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(header = %name, cause = %e, "ignore protocol header with malformed json");
            None
        }
    }
}

/// The final URL as declared by the server.
pub fn location_from(headers: &HeaderMap) -> Option<String> {
    header_str(headers, &X_UP_LOCATION).map(str::to_owned)
}

/// The final request method as declared by the server.
pub fn method_from(headers: &HeaderMap) -> Option<Method> {
    let raw = header_str(headers, &X_UP_METHOD)?;
    match Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes()) {
        Ok(method) => Some(method),
        Err(_) => {
            warn!(method = raw, "ignore invalid method in protocol header");
            None
        }
    }
}

/// The document title. Servers send it JSON-encoded so it can hold any character,
/// a plain value is accepted as well.
pub fn title_from(headers: &HeaderMap) -> Option<String> {
    let raw = header_str(headers, &X_UP_TITLE)?;
    match serde_json::from_str::<String>(raw) {
        Ok(title) => Some(title),
        Err(_) => Some(raw.to_owned()),
    }
}

/// A target selector that replaces the one the client requested.
pub fn target_from(headers: &HeaderMap) -> Option<String> {
    header_str(headers, &X_UP_TARGET).map(str::to_owned)
}

fn layer_value_from(headers: &HeaderMap, name: &HeaderName) -> Option<Value> {
    let raw = header_str(headers, name)?;
    Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned())))
}

/// The value the targeted overlay should be accepted with.
pub fn accept_layer_from(headers: &HeaderMap) -> Option<Value> {
    layer_value_from(headers, &X_UP_ACCEPT_LAYER)
}

/// The value the targeted overlay should be dismissed with.
pub fn dismiss_layer_from(headers: &HeaderMap) -> Option<Value> {
    layer_value_from(headers, &X_UP_DISMISS_LAYER)
}

pub fn event_plans_from(headers: &HeaderMap) -> Vec<EventPlan> {
    json_header(headers, &X_UP_EVENTS).unwrap_or_default()
}

/// Changes the server made to the targeted layer's context.
pub fn context_from(headers: &HeaderMap) -> Option<Context> {
    json_header(headers, &X_UP_CONTEXT)
}

pub fn clear_cache_from(headers: &HeaderMap) -> Option<ClearCache> {
    header_str(headers, &X_UP_CLEAR_CACHE).map(ClearCache::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn missing_headers_yield_nothing() {
        let map = HeaderMap::new();
        assert_eq!(location_from(&map), None);
        assert_eq!(method_from(&map), None);
        assert_eq!(title_from(&map), None);
        assert_eq!(accept_layer_from(&map), None);
        assert!(event_plans_from(&map).is_empty());
        assert_eq!(context_from(&map), None);
        assert_eq!(clear_cache_from(&map), None);
    }

    #[test]
    fn method_is_uppercased() {
        let map = headers(&[(X_UP_METHOD, "patch")]);
        assert_eq!(method_from(&map), Some(Method::PATCH));
    }

    #[test]
    fn title_accepts_json_and_plain_values() {
        assert_eq!(title_from(&headers(&[(X_UP_TITLE, r#""Caf\u00e9 \"menu\"""#)])), Some("Café \"menu\"".to_owned()));
        assert_eq!(title_from(&headers(&[(X_UP_TITLE, "Plain title")])), Some("Plain title".to_owned()));
    }

    #[test]
    fn layer_signals_parse_json_or_fall_back_to_strings() {
        let map = headers(&[(X_UP_ACCEPT_LAYER, r#"{"id":5}"#), (X_UP_DISMISS_LAYER, "closed")]);
        assert_eq!(accept_layer_from(&map), Some(json!({ "id": 5 })));
        assert_eq!(dismiss_layer_from(&map), Some(json!("closed")));

        let map = headers(&[(X_UP_ACCEPT_LAYER, "null")]);
        assert_eq!(accept_layer_from(&map), Some(Value::Null));
    }

    #[test]
    fn event_plans_are_typed() {
        let map = headers(&[(X_UP_EVENTS, r#"[{"type":"user:created","id":5,"layer":"current"}]"#)]);
        let plans = event_plans_from(&map);

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].event_type, "user:created");
        assert_eq!(plans[0].props.get("id"), Some(&json!(5)));
        assert_eq!(plans[0].props.get("layer"), Some(&json!("current")));
    }

    #[test]
    fn malformed_json_is_ignored() {
        let map = headers(&[(X_UP_EVENTS, "[{"), (X_UP_CONTEXT, "not json")]);
        assert!(event_plans_from(&map).is_empty());
        assert_eq!(context_from(&map), None);
    }

    #[test]
    fn context_changes() {
        let map = headers(&[(X_UP_CONTEXT, r#"{"lives":2}"#)]);
        let context = context_from(&map).unwrap();
        assert_eq!(context.get("lives"), Some(&json!(2)));
    }

    #[test]
    fn clear_cache_instruction() {
        assert_eq!(clear_cache_from(&headers(&[(X_UP_CLEAR_CACHE, "*")])), Some(ClearCache::All));
        assert_eq!(clear_cache_from(&headers(&[(X_UP_CLEAR_CACHE, "false")])), Some(ClearCache::Keep));
        assert_eq!(
            clear_cache_from(&headers(&[(X_UP_CLEAR_CACHE, "/users/*")])),
            Some(ClearCache::Pattern("/users/*".to_owned()))
        );
    }

    #[test]
    fn meta_headers() {
        assert_eq!(meta_header(MetaKey::Target), X_UP_TARGET);
        assert_eq!(meta_header(MetaKey::FailContext).as_str(), "x-up-fail-context");
    }
}
