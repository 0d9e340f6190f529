//! Request authorization strategies.
//!
//! A [`RequestAuthorizer`] turns a request into an authorized copy of
//! itself. The input is never mutated: on failure the caller still holds
//! the original, untouched request and can decide what to do with it.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::BoxFuture;

use crate::error::IdentityError;
use crate::http::{HttpRequest, AUTHORIZATION};
use crate::token::CredentialStore;

/// Trait for attaching authorization data to outgoing requests
#[async_trait]
pub trait RequestAuthorizer: Send + Sync {
    /// Return an authorized copy of `request`.
    ///
    /// # Errors
    /// Returns an error when no authorization data can be produced; the
    /// input request is left untouched either way.
    async fn authorize(&self, request: &HttpRequest) -> Result<HttpRequest, IdentityError>;
}

/// Authorizes requests with the current bearer access token
///
/// Reads the credential from a shared [`CredentialStore`], typically the
/// one owned by the identity manager.
#[derive(Debug, Clone)]
pub struct BearerAuthorizer {
    credentials: CredentialStore,
}

impl BearerAuthorizer {
    /// Create an authorizer reading from the given store.
    #[must_use]
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl RequestAuthorizer for BearerAuthorizer {
    async fn authorize(&self, request: &HttpRequest) -> Result<HttpRequest, IdentityError> {
        let credential = self.credentials.get().await.ok_or(IdentityError::NoCredential)?;

        let mut authorized = request.clone();
        authorized
            .set_header(AUTHORIZATION, format!("Bearer {}", credential.access_token()));
        Ok(authorized)
    }
}

/// Authorizes requests with static client credentials as HTTP Basic auth
///
/// Used to authenticate the client itself against the token endpoint
/// (RFC 6749 §2.3.1).
#[derive(Debug, Clone)]
pub struct BasicClientAuthorizer {
    client_id: String,
    client_secret: String,
}

impl BasicClientAuthorizer {
    /// Create an authorizer for the given client credentials.
    ///
    /// # Errors
    /// Returns [`IdentityError::Config`] when the client id contains a `:`,
    /// which cannot be represented in the Basic scheme.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let client_id = client_id.into();
        if client_id.contains(':') {
            return Err(IdentityError::Config(
                "client id must not contain ':' for HTTP Basic authorization".to_string(),
            ));
        }
        Ok(Self { client_id, client_secret: client_secret.into() })
    }
}

#[async_trait]
impl RequestAuthorizer for BasicClientAuthorizer {
    async fn authorize(&self, request: &HttpRequest) -> Result<HttpRequest, IdentityError> {
        let encoded = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let mut authorized = request.clone();
        authorized.set_header(AUTHORIZATION, format!("Basic {encoded}"));
        Ok(authorized)
    }
}

/// Applies a sequence of authorizers in order
///
/// Short-circuits on the first failure, leaving the caller's request
/// untouched.
#[derive(Clone, Default)]
pub struct CompositeAuthorizer {
    authorizers: Vec<Arc<dyn RequestAuthorizer>>,
}

impl CompositeAuthorizer {
    /// Create a composite over the given authorizers.
    #[must_use]
    pub fn new(authorizers: Vec<Arc<dyn RequestAuthorizer>>) -> Self {
        Self { authorizers }
    }

    /// Append an authorizer to the sequence.
    pub fn push(&mut self, authorizer: Arc<dyn RequestAuthorizer>) {
        self.authorizers.push(authorizer);
    }
}

impl std::fmt::Debug for CompositeAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeAuthorizer").field("len", &self.authorizers.len()).finish()
    }
}

#[async_trait]
impl RequestAuthorizer for CompositeAuthorizer {
    async fn authorize(&self, request: &HttpRequest) -> Result<HttpRequest, IdentityError> {
        let mut current = request.clone();
        for authorizer in &self.authorizers {
            current = authorizer.authorize(&current).await?;
        }
        Ok(current)
    }
}

type AuthorizerHandler =
    Box<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpRequest, IdentityError>> + Send + Sync>;

/// A closure-based implementation of [`RequestAuthorizer`]
pub struct AnyAuthorizer {
    handler: AuthorizerHandler,
}

impl AnyAuthorizer {
    /// Wrap an async function as an authorizer.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<HttpRequest, IdentityError>> + Send + 'static,
    {
        Self { handler: Box::new(move |request| Box::pin(handler(request))) }
    }
}

impl std::fmt::Debug for AnyAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyAuthorizer").finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestAuthorizer for AnyAuthorizer {
    async fn authorize(&self, request: &HttpRequest) -> Result<HttpRequest, IdentityError> {
        (self.handler)(request.clone()).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for authorizer.
    use url::Url;

    use super::*;
    use crate::token::AccessTokenResponse;

    fn request() -> HttpRequest {
        HttpRequest::get(Url::parse("https://api.example.com/me").expect("valid url"))
    }

    /// Validates bearer authorization with a stored credential.
    ///
    /// Assertions:
    /// - Confirms the `Authorization` header carries the bearer token.
    /// - Ensures the input request is left untouched.
    #[tokio::test]
    async fn test_bearer_attaches_token() {
        let store = CredentialStore::with_credential(AccessTokenResponse::new(
            "abc123", "Bearer", None, None, None,
        ));
        let authorizer = BearerAuthorizer::new(store);

        let original = request();
        let authorized = authorizer.authorize(&original).await.expect("should authorize");

        assert_eq!(authorized.header(AUTHORIZATION), Some("Bearer abc123"));
        assert_eq!(original.header(AUTHORIZATION), None);
    }

    /// Validates the bearer-without-credential failure scenario.
    ///
    /// Assertions:
    /// - Ensures authorization fails with `NoCredential`.
    /// - Ensures the original request carries no authorization data.
    #[tokio::test]
    async fn test_bearer_without_credential_fails() {
        let authorizer = BearerAuthorizer::new(CredentialStore::new());

        let original = request();
        let result = authorizer.authorize(&original).await;

        assert!(matches!(result, Err(IdentityError::NoCredential)));
        assert_eq!(original.header(AUTHORIZATION), None);
    }

    /// Validates the HTTP Basic encoding of client credentials.
    ///
    /// Assertions:
    /// - Confirms the header equals the base64 of `id:secret`.
    #[tokio::test]
    async fn test_basic_client_authorization() {
        let authorizer =
            BasicClientAuthorizer::new("client", "secret").expect("valid client id");

        let authorized = authorizer.authorize(&request()).await.expect("should authorize");

        // base64("client:secret")
        assert_eq!(authorized.header(AUTHORIZATION), Some("Basic Y2xpZW50OnNlY3JldA=="));
    }

    /// Validates rejection of a malformed client id.
    ///
    /// Assertions:
    /// - Ensures construction fails with `Config`.
    #[test]
    fn test_basic_client_rejects_colon_in_id() {
        let result = BasicClientAuthorizer::new("bad:id", "secret");
        assert!(matches!(result, Err(IdentityError::Config(_))));
    }

    /// Validates composite ordering and short-circuit behavior.
    ///
    /// Assertions:
    /// - Confirms authorizers apply in sequence, later ones seeing earlier
    ///   output.
    /// - Ensures a failing member stops the chain.
    #[tokio::test]
    async fn test_composite_applies_in_order() {
        let first = Arc::new(AnyAuthorizer::new(|request: HttpRequest| async move {
            Ok(request.with_header("X-First", "1"))
        }));
        let second = Arc::new(AnyAuthorizer::new(|request: HttpRequest| async move {
            assert_eq!(request.header("X-First"), Some("1"));
            Ok(request.with_header("X-Second", "2"))
        }));

        let composite = CompositeAuthorizer::new(vec![first, second]);
        let authorized = composite.authorize(&request()).await.expect("should authorize");

        assert_eq!(authorized.header("X-First"), Some("1"));
        assert_eq!(authorized.header("X-Second"), Some("2"));
    }

    /// Validates the composite short-circuit failure scenario.
    ///
    /// Assertions:
    /// - Ensures the first failure is returned.
    /// - Ensures later authorizers never run.
    #[tokio::test]
    async fn test_composite_short_circuits() {
        let failing = Arc::new(AnyAuthorizer::new(
            |_request: HttpRequest| async move { Err(IdentityError::NoCredential) },
        ));
        let unreachable = Arc::new(AnyAuthorizer::new(|_request: HttpRequest| async move {
            panic!("second authorizer must not run after a failure");
        }));

        let composite = CompositeAuthorizer::new(vec![failing, unreachable]);
        let result = composite.authorize(&request()).await;

        assert!(matches!(result, Err(IdentityError::NoCredential)));
    }
}
