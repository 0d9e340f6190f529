//! HTTP request/response value types and the transport seam.
//!
//! The crate performs no network I/O of its own. Requests and responses are
//! plain value types so any HTTP stack can adapt to [`NetworkTransport`];
//! a default `reqwest`-backed implementation lives in
//! [`transport`](crate::transport) behind the `transport` feature.

use async_trait::async_trait;
use futures::future::BoxFuture;
use url::Url;

/// Boxed error type returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The `Authorization` header name.
pub const AUTHORIZATION: &str = "Authorization";

/// The `Content-Type` header name.
pub const CONTENT_TYPE: &str = "Content-Type";

/// MIME type for form-encoded token endpoint bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// An outgoing HTTP request
///
/// Authorizers never mutate a request in place; they return an authorized
/// copy and leave the input untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method (e.g., `GET`, `POST`)
    pub method: String,

    /// Target URL, including any query parameters
    pub url: Url,

    headers: Vec<(String, String)>,

    /// Request body, if any
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request with the given method and URL.
    #[must_use]
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url, headers: Vec::new(), body: None }
    }

    /// Create a `GET` request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Create a `POST` request.
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::new("POST", url)
    }

    /// Set a header, consuming and returning the request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the body, consuming and returning the request.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a header, replacing any existing value.
    ///
    /// Header names compare case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Get a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate over all headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// An HTTP response as seen by this crate
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: Vec<(String, String)>,

    /// Raw response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response from a status code and body.
    #[must_use]
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, headers: Vec::new(), body }
    }

    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for sending HTTP requests
///
/// The only capability the toolkit needs from an HTTP stack. Timeouts are
/// the transport's responsibility; a timeout surfaces as a transport error
/// and is treated like any other network failure.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Send a request and return the response, or a transport-level error.
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError>;
}

type TransportHandler =
    Box<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, BoxError>> + Send + Sync>;

/// A closure-based implementation of [`NetworkTransport`]
///
/// Lets call sites plug in an arbitrary async function without defining a
/// new type.
pub struct AnyTransport {
    handler: TransportHandler,
}

impl AnyTransport {
    /// Wrap an async function as a transport.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<HttpResponse, BoxError>> + Send + 'static,
    {
        Self { handler: Box::new(move |request| Box::pin(handler(request))) }
    }
}

impl std::fmt::Debug for AnyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl NetworkTransport for AnyTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        (self.handler)(request.clone()).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for http.
    use super::*;

    fn request() -> HttpRequest {
        let url = Url::parse("https://api.example.com/resource").expect("valid url");
        HttpRequest::get(url)
    }

    /// Validates header replacement semantics.
    ///
    /// Assertions:
    /// - Ensures setting a header twice keeps a single value.
    /// - Ensures lookup is case-insensitive.
    #[test]
    fn test_header_replace_case_insensitive() {
        let mut request = request();
        request.set_header("Authorization", "Bearer one");
        request.set_header("authorization", "Bearer two");

        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer two"));
        assert_eq!(request.headers().count(), 1);
    }

    /// Validates `HttpResponse::is_success` boundaries.
    ///
    /// Assertions:
    /// - Ensures 200 and 299 are success.
    /// - Ensures 199, 300 and 400 are not.
    #[test]
    fn test_is_success_boundaries() {
        assert!(HttpResponse::new(200, Vec::new()).is_success());
        assert!(HttpResponse::new(299, Vec::new()).is_success());
        assert!(!HttpResponse::new(199, Vec::new()).is_success());
        assert!(!HttpResponse::new(300, Vec::new()).is_success());
        assert!(!HttpResponse::new(400, Vec::new()).is_success());
    }

    /// Validates the closure transport adapter scenario.
    ///
    /// Assertions:
    /// - Confirms the wrapped closure observes the request URL.
    /// - Confirms the scripted response is returned.
    #[tokio::test]
    async fn test_any_transport_roundtrip() {
        let transport = AnyTransport::new(|request: HttpRequest| async move {
            assert_eq!(request.url.path(), "/resource");
            Ok(HttpResponse::new(204, Vec::new()))
        });

        let response = transport.send(&request()).await.expect("transport should succeed");
        assert_eq!(response.status, 204);
    }
}
