//! Provider configuration.
//!
//! A [`ProviderConfig`] is plain data describing one authorization server
//! and client registration. It is injected into whatever component needs
//! it — there is no process-wide default instance. The type derives serde
//! so applications can load it from their own configuration files.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::authorizer::BasicClientAuthorizer;
use crate::error::IdentityError;
use crate::scope::Scope;

/// OAuth 2.0 provider and client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint serving the interactive authorization page
    pub authorization_endpoint: Url,

    /// Endpoint answering token grants
    pub token_endpoint: Url,

    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret; absent for public clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Redirect URI registered for this client
    pub redirect_uri: Url,

    /// Scopes to request
    #[serde(default)]
    pub scope: Scope,
}

impl ProviderConfig {
    /// Create a configuration for a public client with no scopes.
    #[must_use]
    pub fn new(
        authorization_endpoint: Url,
        token_endpoint: Url,
        client_id: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            authorization_endpoint,
            token_endpoint,
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri,
            scope: Scope::new(),
        }
    }

    /// Attach a client secret (confidential client).
    #[must_use]
    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the scopes to request.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Build the HTTP Basic client authorizer for this registration.
    ///
    /// Public clients get an empty secret, which token endpoints accepting
    /// `client_id`-only Basic credentials handle per RFC 6749 §2.3.1.
    ///
    /// # Errors
    /// Returns [`IdentityError::Config`] when the client id cannot be
    /// represented in the Basic scheme.
    pub fn client_authorizer(&self) -> Result<BasicClientAuthorizer, IdentityError> {
        BasicClientAuthorizer::new(
            self.client_id.clone(),
            self.client_secret.clone().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for config.
    use super::*;

    fn config() -> ProviderConfig {
        ProviderConfig::new(
            Url::parse("https://login.example.com/authorize").expect("valid url"),
            Url::parse("https://login.example.com/oauth/token").expect("valid url"),
            "client_123",
            Url::parse("http://localhost:8888/callback").expect("valid url"),
        )
    }

    /// Validates the builder-style configuration scenario.
    ///
    /// Assertions:
    /// - Confirms endpoints and client id are stored.
    /// - Confirms secret and scope attach via the builders.
    #[test]
    fn test_config_builders() {
        let config = config()
            .with_client_secret("s3cret")
            .with_scope(Scope::from("openid profile"));

        assert_eq!(config.client_id, "client_123");
        assert_eq!(config.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.scope, Scope::from("profile openid"));
        assert_eq!(config.token_endpoint.path(), "/oauth/token");
    }

    /// Validates serde deserialization from a config-file shape.
    ///
    /// Assertions:
    /// - Confirms URLs parse from strings.
    /// - Ensures omitted optional fields default.
    #[test]
    fn test_config_deserialization() {
        let json = r#"{
            "authorization_endpoint": "https://login.example.com/authorize",
            "token_endpoint": "https://login.example.com/oauth/token",
            "client_id": "client_123",
            "redirect_uri": "http://localhost:8888/callback"
        }"#;

        let config: ProviderConfig = serde_json::from_str(json).expect("valid config");
        assert_eq!(config.client_id, "client_123");
        assert!(config.client_secret.is_none());
        assert!(config.scope.is_empty());
    }
}
