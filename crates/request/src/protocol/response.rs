use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, Method, StatusCode};
use mime::Mime;
use serde_json::Value;
use tracing::trace;
use url::Url;

use super::headers::{self, EventPlan};
use crate::request::{ClearCache, Context, Descriptor};
use crate::transport::TransportResponse;
use crate::urls;

/// The server's answer to a request, with the server's protocol instructions applied.
///
/// A response is only ever built by the request it answers. It keeps the request's
/// [`Descriptor`], never the request itself, so a cached response does not keep the
/// request's UI handles alive.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    text: String,
    method: Method,
    url: String,
    headers: HeaderMap,
    request: Arc<Descriptor>,
    title: Option<String>,
    target: Option<String>,
    accept_layer: Option<Value>,
    dismiss_layer: Option<Value>,
    event_plans: Vec<EventPlan>,
    context: Option<Context>,
    clear_cache: Option<ClearCache>,
}

impl Response {
    pub(crate) fn from_transport(request: Arc<Descriptor>, raw: TransportResponse, location: &Url) -> Self {
        let TransportResponse { status, headers, text, final_url } = raw;

        let url = match headers::location_from(&headers).or(final_url) {
            Some(url) => urls::normalize_url(&url, location).unwrap_or(url),
            None => request.url().to_owned(),
        };

        let method = match headers::method_from(&headers) {
            Some(method) => method,
            None if !urls::match_urls(&url, request.url(), location) => {
                // redirects like 302 continue with GET
                trace!(request = %request.description(), url, "assume GET after redirect");
                Method::GET
            }
            None => request.method().clone(),
        };

        Self {
            status,
            text,
            method,
            url,
            title: headers::title_from(&headers),
            target: headers::target_from(&headers),
            accept_layer: headers::accept_layer_from(&headers),
            dismiss_layer: headers::dismiss_layer_from(&headers),
            event_plans: headers::event_plans_from(&headers),
            context: headers::context_from(&headers),
            clear_cache: headers::clear_cache_from(&headers),
            headers,
            request,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the status is in the 2xx range.
    #[inline]
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The method of the final request, after redirects.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The URL of the final request, after redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of header `name` if it is valid text.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes()).ok()?;
        self.headers.get(name)?.to_str().ok()
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    /// The request this response answers.
    pub fn request(&self) -> &Descriptor {
        &self.request
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn accept_layer(&self) -> Option<&Value> {
        self.accept_layer.as_ref()
    }

    pub fn dismiss_layer(&self) -> Option<&Value> {
        self.dismiss_layer.as_ref()
    }

    pub fn event_plans(&self) -> &[EventPlan] {
        &self.event_plans
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn clear_cache(&self) -> Option<&ClearCache> {
        self.clear_cache.as_ref()
    }

    /// `HTTP 200 from GET /path`, for log messages.
    pub fn description(&self) -> String {
        format!("HTTP {} from {} {}", self.status.as_u16(), self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;
    use crate::config::NetworkConfig;
    use crate::request::RequestOptions;

    fn location() -> Url {
        Url::parse("http://app.test/").unwrap()
    }

    fn descriptor(method: &str, url: &str) -> Arc<Descriptor> {
        let config = NetworkConfig::builder().location("http://app.test/").build().unwrap();
        Arc::new(Descriptor::from_options(RequestOptions::new(url).method(method), &config).unwrap())
    }

    #[test]
    fn keeps_request_url_and_method_without_redirect() {
        let raw = TransportResponse::new(StatusCode::OK, "<p>hi</p>");
        let response = Response::from_transport(descriptor("POST", "/form"), raw, &location());

        assert!(response.ok());
        assert_eq!(response.url(), "/form");
        assert_eq!(response.method(), Method::POST);
        assert_eq!(response.text(), "<p>hi</p>");
        assert_eq!(response.description(), "HTTP 200 from POST /form");
    }

    #[test]
    fn redirect_to_other_url_becomes_get() {
        let raw = TransportResponse::new(StatusCode::OK, "").with_final_url("http://app.test/thanks");
        let response = Response::from_transport(descriptor("POST", "/form"), raw, &location());

        assert_eq!(response.url(), "/thanks");
        assert_eq!(response.method(), Method::GET);
    }

    #[test]
    fn final_url_differing_only_in_form_keeps_method() {
        let raw = TransportResponse::new(StatusCode::OK, "").with_final_url("http://app.test/form/");
        let response = Response::from_transport(descriptor("PUT", "/form"), raw, &location());

        assert_eq!(response.method(), Method::PUT);
    }

    #[test]
    fn method_header_wins_over_redirect_heuristic() {
        let raw = TransportResponse::new(StatusCode::OK, "")
            .with_header(headers::X_UP_LOCATION, HeaderValue::from_static("/elsewhere"))
            .with_header(headers::X_UP_METHOD, HeaderValue::from_static("patch"));
        let response = Response::from_transport(descriptor("POST", "/form"), raw, &location());

        assert_eq!(response.url(), "/elsewhere");
        assert_eq!(response.method(), Method::PATCH);
    }

    #[test]
    fn location_header_wins_over_final_url() {
        let raw = TransportResponse::new(StatusCode::OK, "")
            .with_final_url("/from-transport")
            .with_header(headers::X_UP_LOCATION, HeaderValue::from_static("http://app.test/from-server"));
        let response = Response::from_transport(descriptor("GET", "/start"), raw, &location());

        assert_eq!(response.url(), "/from-server");
    }

    #[test]
    fn error_status_is_not_ok() {
        let raw = TransportResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        let response = Response::from_transport(descriptor("GET", "/"), raw, &location());

        assert!(!response.ok());
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn protocol_headers_are_extracted() {
        let raw = TransportResponse::new(StatusCode::OK, "")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
            .with_header(headers::X_UP_TITLE, HeaderValue::from_static("\"Inbox\""))
            .with_header(headers::X_UP_TARGET, HeaderValue::from_static(".messages"))
            .with_header(headers::X_UP_ACCEPT_LAYER, HeaderValue::from_static("{\"id\":7}"))
            .with_header(headers::X_UP_EVENTS, HeaderValue::from_static("[{\"type\":\"mail:read\",\"id\":7}]"))
            .with_header(headers::X_UP_CONTEXT, HeaderValue::from_static("{\"unread\":0}"))
            .with_header(headers::X_UP_CLEAR_CACHE, HeaderValue::from_static("/messages/*"));
        let response = Response::from_transport(descriptor("GET", "/messages"), raw, &location());

        assert_eq!(response.content_type(), Some(mime::TEXT_HTML_UTF_8));
        assert_eq!(response.header("X-Up-Target"), Some(".messages"));
        assert_eq!(response.title(), Some("Inbox"));
        assert_eq!(response.target(), Some(".messages"));
        assert_eq!(response.accept_layer(), Some(&json!({ "id": 7 })));
        assert_eq!(response.dismiss_layer(), None);
        assert_eq!(response.event_plans()[0].event_type, "mail:read");
        assert_eq!(response.context().unwrap()["unread"], json!(0));
        assert_eq!(response.clear_cache(), Some(&ClearCache::Pattern("/messages/*".to_owned())));
        assert_eq!(response.request().url(), "/messages");
    }
}
