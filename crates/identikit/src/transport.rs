//! Default `reqwest`-backed transport.
//!
//! The only module that touches a real HTTP client. Everything else in the
//! crate goes through the [`NetworkTransport`] seam, so swapping this out
//! is a one-line change at construction time.

use async_trait::async_trait;
use reqwest::Client;

use crate::http::{BoxError, HttpRequest, HttpResponse, NetworkTransport};

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// [`NetworkTransport`] implementation over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with a 30-second request timeout.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Create a transport over a caller-configured client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status, headers, body })
    }
}
