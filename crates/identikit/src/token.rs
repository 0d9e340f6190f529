//! Access token grant results, expiry policy, and shared credential state.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::IdentityError;
use crate::scope::Scope;

const ACCESS_TOKEN: &str = "access_token";
const TOKEN_TYPE: &str = "token_type";
const EXPIRES_IN: &str = "expires_in";
const REFRESH_TOKEN: &str = "refresh_token";
const SCOPE: &str = "scope";

/// The result of a successful token grant (RFC 6749 §5.1)
///
/// Immutable once constructed; a refresh produces a new instance that
/// supersedes the old one. Unrecognized response fields are preserved in
/// `additional_parameters` in their original order.
#[derive(Debug, Clone)]
pub struct AccessTokenResponse {
    access_token: String,
    token_type: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<Scope>,
    additional_parameters: Map<String, Value>,
    created_at: DateTime<Utc>,
}

impl AccessTokenResponse {
    /// Create a response from its recognized fields.
    ///
    /// The creation timestamp is stamped now and drives the expiry check.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: Option<i64>,
        refresh_token: Option<String>,
        scope: Option<Scope>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_in,
            refresh_token,
            scope,
            additional_parameters: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Construct from a parameters map, typically a decoded JSON body.
    ///
    /// Recognized fields are extracted; everything else is kept verbatim as
    /// extension parameters.
    ///
    /// # Errors
    /// Returns [`IdentityError::InvalidResponse`] when `access_token` or
    /// `token_type` is missing or not a string.
    pub fn from_parameters(mut parameters: Map<String, Value>) -> Result<Self, IdentityError> {
        let access_token = take_string(&mut parameters, ACCESS_TOKEN)?;
        let token_type = take_string(&mut parameters, TOKEN_TYPE)?;

        let expires_in = parameters
            .remove(EXPIRES_IN)
            .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|secs| secs as i64)));
        let refresh_token = parameters
            .remove(REFRESH_TOKEN)
            .and_then(|value| value.as_str().map(ToOwned::to_owned));
        let scope =
            parameters.remove(SCOPE).and_then(|value| value.as_str().map(Scope::from));

        Ok(Self {
            access_token,
            token_type,
            expires_in,
            refresh_token,
            scope,
            additional_parameters: parameters,
            created_at: Utc::now(),
        })
    }

    /// Construct from a raw JSON body.
    ///
    /// # Errors
    /// Returns [`IdentityError::InvalidResponse`] when the body is not a
    /// JSON object or required fields are missing.
    pub fn from_json_bytes(body: &[u8]) -> Result<Self, IdentityError> {
        let parameters: Map<String, Value> = serde_json::from_slice(body)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
        Self::from_parameters(parameters)
    }

    /// Project every field, recognized and extension, back into a map.
    ///
    /// Reconstructing a response from this map reproduces the original.
    #[must_use]
    pub fn parameters(&self) -> Map<String, Value> {
        let mut parameters = Map::new();
        parameters.insert(ACCESS_TOKEN.to_string(), Value::from(self.access_token.clone()));
        parameters.insert(TOKEN_TYPE.to_string(), Value::from(self.token_type.clone()));
        if let Some(expires_in) = self.expires_in {
            parameters.insert(EXPIRES_IN.to_string(), Value::from(expires_in));
        }
        if let Some(refresh_token) = &self.refresh_token {
            parameters.insert(REFRESH_TOKEN.to_string(), Value::from(refresh_token.clone()));
        }
        if let Some(scope) = &self.scope {
            parameters.insert(SCOPE.to_string(), Value::from(scope.to_string()));
        }
        for (key, value) in &self.additional_parameters {
            parameters.insert(key.clone(), value.clone());
        }
        parameters
    }

    /// The access token itself.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Token type reported by the server (usually `Bearer`).
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Token lifetime in seconds, when the server communicated one.
    #[must_use]
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }

    /// Refresh token issued with this grant, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Granted scope, if the server reported one.
    #[must_use]
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Extension fields preserved from the grant body.
    #[must_use]
    pub fn additional_parameters(&self) -> &Map<String, Value> {
        &self.additional_parameters
    }

    /// When this response was constructed.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Absolute expiry instant, when `expires_in` is present.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in.map(|seconds| self.created_at + Duration::seconds(seconds))
    }

    /// Whether the server-communicated expiry window has elapsed.
    ///
    /// When the server supplied no `expires_in`, this is always false; the
    /// manager's pluggable expiration predicate decides instead.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// [`is_expired`](Self::is_expired) evaluated at a caller-chosen instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }

    /// Carry the previous grant's refresh token forward when the server
    /// omitted one from the refresh response.
    pub(crate) fn inherit_refresh_token(&mut self, previous: &Self) {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.refresh_token.clone();
        }
    }
}

fn take_string(parameters: &mut Map<String, Value>, key: &str) -> Result<String, IdentityError> {
    match parameters.remove(key) {
        Some(Value::String(value)) => Ok(value),
        _ => Err(IdentityError::InvalidResponse(format!(
            "missing or non-string `{key}` in token response"
        ))),
    }
}

/// Shared credential state
///
/// The single mutable resource of the toolkit: the current
/// [`AccessTokenResponse`] or none. All reads and writes go through an
/// async `RwLock`, so the state behaves as if confined to one serialized
/// execution context. The manager and its bearer authorizer hold clones of
/// the same store.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<AccessTokenResponse>>>,
}

impl CredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a credential.
    #[must_use]
    pub fn with_credential(credential: AccessTokenResponse) -> Self {
        Self { inner: Arc::new(RwLock::new(Some(credential))) }
    }

    /// Current credential, if any.
    pub async fn get(&self) -> Option<AccessTokenResponse> {
        self.inner.read().await.clone()
    }

    /// Atomically replace the credential.
    pub async fn replace(&self, credential: AccessTokenResponse) {
        *self.inner.write().await = Some(credential);
    }

    /// Drop the credential (logout).
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    /// Whether a credential is present.
    pub async fn is_present(&self) -> bool {
        self.inner.read().await.is_some()
    }
}
