//! Refresh-token grant execution against the token endpoint.
//!
//! [`TokenEndpointRefresher`] is the one place that speaks the token
//! endpoint wire format for refresh grants: a form-encoded POST authorized
//! by a client authorizer, answered by a JSON token response or an RFC 6749
//! error body. It carries no retry policy of its own; retries and the
//! fallback to interactive authentication belong to the identity manager.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::authorizer::RequestAuthorizer;
use crate::error::{ErrorResponse, IdentityError};
use crate::http::{HttpRequest, HttpResponse, NetworkTransport, CONTENT_TYPE, FORM_URLENCODED};
use crate::scope::Scope;
use crate::token::AccessTokenResponse;

/// Grant parameters for requesting a new access token
///
/// A value object serialized to a form-encoded body with
/// `grant_type=refresh_token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRefreshRequest {
    /// The refresh token obtained from a previous grant
    pub refresh_token: String,

    /// Scope to request; servers may narrow but never widen it
    pub scope: Option<Scope>,

    /// Extension parameters appended to the form body
    pub additional_parameters: Vec<(String, String)>,
}

impl AccessTokenRefreshRequest {
    /// Create a request for the given refresh token.
    #[must_use]
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            scope: None,
            additional_parameters: Vec::new(),
        }
    }

    /// Request a specific scope.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Append an extension parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_parameters.push((name.into(), value.into()));
        self
    }

    pub(crate) fn form_parameters(&self) -> Vec<(String, String)> {
        let mut parameters = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), self.refresh_token.clone()),
        ];
        if let Some(scope) = &self.scope {
            if !scope.is_empty() {
                parameters.push(("scope".to_string(), scope.to_string()));
            }
        }
        parameters.extend(self.additional_parameters.iter().cloned());
        parameters
    }
}

/// Trait for exchanging a refresh token for a fresh access token response
#[async_trait]
pub trait AccessTokenRefresher: Send + Sync {
    /// Perform the refresh grant.
    ///
    /// # Errors
    /// Returns [`IdentityError::NetworkFailure`] on transport errors,
    /// [`IdentityError::InvalidResponse`] on malformed grant bodies, and
    /// [`IdentityError::AuthenticationFailed`] when the server rejects the
    /// grant.
    async fn refresh(
        &self,
        request: &AccessTokenRefreshRequest,
    ) -> Result<AccessTokenResponse, IdentityError>;
}

/// Refreshes access tokens against an OAuth 2.0 token endpoint
pub struct TokenEndpointRefresher<T, A> {
    token_endpoint: Url,
    transport: Arc<T>,
    client_authorizer: Arc<A>,
}

impl<T, A> TokenEndpointRefresher<T, A>
where
    T: NetworkTransport,
    A: RequestAuthorizer,
{
    /// Create a refresher for the given endpoint.
    ///
    /// The client authorizer (typically
    /// [`BasicClientAuthorizer`](crate::authorizer::BasicClientAuthorizer))
    /// authenticates the client on every exchange.
    #[must_use]
    pub fn new(token_endpoint: Url, transport: Arc<T>, client_authorizer: Arc<A>) -> Self {
        Self { token_endpoint, transport, client_authorizer }
    }

    /// The configured token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }
}

impl<T, A> std::fmt::Debug for TokenEndpointRefresher<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEndpointRefresher")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, A> AccessTokenRefresher for TokenEndpointRefresher<T, A>
where
    T: NetworkTransport,
    A: RequestAuthorizer,
{
    async fn refresh(
        &self,
        request: &AccessTokenRefreshRequest,
    ) -> Result<AccessTokenResponse, IdentityError> {
        let exchange = token_request(self.token_endpoint.clone(), &request.form_parameters());
        let exchange = self.client_authorizer.authorize(&exchange).await?;

        debug!(endpoint = %self.token_endpoint, "exchanging refresh token");
        let response = self
            .transport
            .send(&exchange)
            .await
            .map_err(|e| IdentityError::NetworkFailure(e.to_string()))?;

        handle_token_response(&response)
    }
}

/// Build a form-encoded POST to a token endpoint.
pub(crate) fn token_request(endpoint: Url, parameters: &[(String, String)]) -> HttpRequest {
    HttpRequest::post(endpoint)
        .with_header(CONTENT_TYPE, FORM_URLENCODED)
        .with_body(encode_form(parameters).into_bytes())
}

pub(crate) fn encode_form(parameters: &[(String, String)]) -> String {
    parameters
        .iter()
        .map(|(name, value)| {
            format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Interpret a token endpoint response as a grant result or failure.
///
/// Shared by the refresh grant and the authorization-code exchange.
pub(crate) fn handle_token_response(
    response: &HttpResponse,
) -> Result<AccessTokenResponse, IdentityError> {
    if response.is_success() {
        return AccessTokenResponse::from_json_bytes(&response.body);
    }

    match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(error) if !error.error.is_empty() => Err(IdentityError::AuthenticationFailed(error)),
        _ => {
            // Not a recognizable OAuth2 error body; keep the raw evidence.
            let mut error = ErrorResponse::new(format!("HTTP {}", response.status));
            let body = String::from_utf8_lossy(&response.body);
            let body = body.trim();
            if !body.is_empty() {
                error = error.with_description(body.to_string());
            }
            Err(IdentityError::AuthenticationFailed(error))
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for refresh.
    use super::*;

    /// Validates the form body produced for a refresh grant.
    ///
    /// Assertions:
    /// - Confirms `grant_type=refresh_token` leads the body.
    /// - Ensures scope and extension parameters are appended.
    /// - Ensures values are percent-encoded.
    #[test]
    fn test_form_parameters_encoding() {
        let request = AccessTokenRefreshRequest::new("tok/en+1")
            .with_scope(Scope::from("read write"))
            .with_parameter("audience", "https://api.example.com");

        let body = encode_form(&request.form_parameters());

        assert!(body.starts_with("grant_type=refresh_token&refresh_token=tok%2Fen%2B1"));
        assert!(body.contains("scope=read%20write"));
        assert!(body.contains("audience=https%3A%2F%2Fapi.example.com"));
    }

    /// Validates that an empty scope is omitted from the body.
    ///
    /// Assertions:
    /// - Ensures no `scope` pair is produced.
    #[test]
    fn test_empty_scope_omitted() {
        let request = AccessTokenRefreshRequest::new("token").with_scope(Scope::new());
        let body = encode_form(&request.form_parameters());
        assert!(!body.contains("scope="));
    }

    /// Validates parsing of a successful token endpoint response.
    ///
    /// Assertions:
    /// - Confirms the access token and lifetime are extracted.
    #[test]
    fn test_handle_success_response() {
        let response = HttpResponse::new(
            200,
            br#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#.to_vec(),
        );

        let token = handle_token_response(&response).expect("valid grant body");
        assert_eq!(token.access_token(), "abc");
        assert_eq!(token.expires_in(), Some(3600));
    }

    /// Validates the malformed success body scenario.
    ///
    /// Assertions:
    /// - Ensures parsing fails with `InvalidResponse`.
    #[test]
    fn test_handle_malformed_success_body() {
        let response = HttpResponse::new(200, b"not json at all".to_vec());
        let result = handle_token_response(&response);
        assert!(matches!(result, Err(IdentityError::InvalidResponse(_))));
    }

    /// Validates the structured OAuth2 error body scenario.
    ///
    /// Assertions:
    /// - Confirms the failure reason equals `invalid_grant`.
    #[test]
    fn test_handle_structured_error_body() {
        let response = HttpResponse::new(
            400,
            br#"{"error":"invalid_grant","error_description":"revoked"}"#.to_vec(),
        );

        match handle_token_response(&response) {
            Err(IdentityError::AuthenticationFailed(error)) => {
                assert_eq!(error.error, "invalid_grant");
                assert_eq!(error.error_description.as_deref(), Some("revoked"));
            }
            other => panic!("expected AuthenticationFailed, got {other:?}"),
        }
    }

    /// Validates the unrecognizable error body scenario.
    ///
    /// Assertions:
    /// - Ensures the failure wraps the status and raw body.
    #[test]
    fn test_handle_unrecognizable_error_body() {
        let response = HttpResponse::new(502, b"<html>Bad Gateway</html>".to_vec());

        match handle_token_response(&response) {
            Err(IdentityError::AuthenticationFailed(error)) => {
                assert_eq!(error.error, "HTTP 502");
                assert_eq!(error.error_description.as_deref(), Some("<html>Bad Gateway</html>"));
            }
            other => panic!("expected AuthenticationFailed, got {other:?}"),
        }
    }
}
