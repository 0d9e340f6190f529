//! Authorization-code grant flow over an abstract user agent.
//!
//! The interactive path of the toolkit: build the authorization request,
//! let a [`UserAgent`] drive the login, validate the redirect, exchange the
//! code at the token endpoint. The identity manager only sees the
//! [`AuthorizationFlow`] trait, so other grants can be plugged in.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::authorizer::RequestAuthorizer;
use crate::config::ProviderConfig;
use crate::error::{ErrorResponse, IdentityError};
use crate::http::{HttpRequest, NetworkTransport};
use crate::pkce::PkceChallenge;
use crate::refresh::{handle_token_response, token_request};
use crate::token::AccessTokenResponse;
use crate::user_agent::{RedirectionHandler, UserAgent};

/// Trait for obtaining a fresh grant through user interaction
///
/// Implementations run a complete authentication exchange and return the
/// resulting token response; the manager stores it.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Run the flow to completion.
    ///
    /// # Errors
    /// Returns [`IdentityError::InteractiveAuthCancelled`] when the user
    /// aborts, or the underlying exchange error otherwise.
    async fn authenticate(&self) -> Result<AccessTokenResponse, IdentityError>;
}

/// The OAuth 2.0 authorization-code grant (RFC 6749 §4.1) with PKCE
pub struct AuthorizationCodeGrantFlow<T, A, U> {
    config: ProviderConfig,
    transport: Arc<T>,
    client_authorizer: Arc<A>,
    user_agent: Arc<U>,
    use_pkce: bool,
}

impl<T, A, U> AuthorizationCodeGrantFlow<T, A, U>
where
    T: NetworkTransport,
    A: RequestAuthorizer,
    U: UserAgent,
{
    /// Create a flow for the given provider.
    ///
    /// PKCE is on by default; disable it only for servers that reject the
    /// `code_challenge` parameters.
    #[must_use]
    pub fn new(
        config: ProviderConfig,
        transport: Arc<T>,
        client_authorizer: Arc<A>,
        user_agent: Arc<U>,
    ) -> Self {
        Self { config, transport, client_authorizer, user_agent, use_pkce: true }
    }

    /// Enable or disable PKCE.
    #[must_use]
    pub fn with_pkce(mut self, use_pkce: bool) -> Self {
        self.use_pkce = use_pkce;
        self
    }

    fn authorization_request(&self, challenge: &PkceChallenge) -> HttpRequest {
        let mut url = self.config.authorization_endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "code");
            pairs.append_pair("client_id", &self.config.client_id);
            pairs.append_pair("redirect_uri", self.config.redirect_uri.as_str());
            if !self.config.scope.is_empty() {
                pairs.append_pair("scope", &self.config.scope.to_string());
            }
            pairs.append_pair("state", &challenge.state);
            if self.use_pkce {
                pairs.append_pair("code_challenge", &challenge.code_challenge);
                pairs.append_pair("code_challenge_method", challenge.challenge_method());
            }
        }
        HttpRequest::get(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        challenge: &PkceChallenge,
    ) -> Result<AccessTokenResponse, IdentityError> {
        let mut parameters = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.config.redirect_uri.to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
        ];
        if self.use_pkce {
            parameters.push(("code_verifier".to_string(), challenge.code_verifier.clone()));
        }

        let exchange = token_request(self.config.token_endpoint.clone(), &parameters);
        let exchange = self.client_authorizer.authorize(&exchange).await?;

        debug!(endpoint = %self.config.token_endpoint, "exchanging authorization code");
        let response = self
            .transport
            .send(&exchange)
            .await
            .map_err(|e| IdentityError::NetworkFailure(e.to_string()))?;

        handle_token_response(&response)
    }
}

impl<T, A, U> std::fmt::Debug for AuthorizationCodeGrantFlow<T, A, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeGrantFlow")
            .field("client_id", &self.config.client_id)
            .field("use_pkce", &self.use_pkce)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, A, U> AuthorizationFlow for AuthorizationCodeGrantFlow<T, A, U>
where
    T: NetworkTransport,
    A: RequestAuthorizer,
    U: UserAgent,
{
    async fn authenticate(&self) -> Result<AccessTokenResponse, IdentityError> {
        let challenge = PkceChallenge::generate();
        let request = self.authorization_request(&challenge);
        let capture = Arc::new(RedirectCapture::new(self.config.redirect_uri.clone()));

        info!(client_id = %self.config.client_id, "starting interactive authorization-code flow");
        self.user_agent.perform(request, capture.clone()).await?;

        // An agent that finished without a matching redirect was abandoned.
        let redirect = capture.take().ok_or(IdentityError::InteractiveAuthCancelled)?;
        let (code, state) = parse_redirect(&redirect)?;

        if state.as_deref() != Some(challenge.state.as_str()) {
            return Err(IdentityError::AuthenticationFailed(
                ErrorResponse::new("state_mismatch")
                    .with_description("redirect state did not match the authorization request"),
            ));
        }

        let response = self.exchange_code(&code, &challenge).await?;
        info!("interactive authentication completed");
        Ok(response)
    }
}

/// Captures the redirect matching the expected callback URI
struct RedirectCapture {
    redirect_uri: Url,
    captured: Mutex<Option<HttpRequest>>,
}

impl RedirectCapture {
    fn new(redirect_uri: Url) -> Self {
        Self { redirect_uri, captured: Mutex::new(None) }
    }

    fn matches(&self, candidate: &Url) -> bool {
        candidate.scheme() == self.redirect_uri.scheme()
            && candidate.host() == self.redirect_uri.host()
            && candidate.port_or_known_default() == self.redirect_uri.port_or_known_default()
            && candidate.path() == self.redirect_uri.path()
    }

    fn take(&self) -> Option<HttpRequest> {
        self.captured.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl RedirectionHandler for RedirectCapture {
    fn handle(&self, redirect: &HttpRequest) -> bool {
        if !self.matches(&redirect.url) {
            return false;
        }
        if let Ok(mut captured) = self.captured.lock() {
            *captured = Some(redirect.clone());
        }
        true
    }
}

/// Extract the grant result from an accepted redirect.
fn parse_redirect(redirect: &HttpRequest) -> Result<(String, Option<String>), IdentityError> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    let mut error_uri = None;

    for (name, value) in redirect.url.query_pairs() {
        match name.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            "error_uri" => error_uri = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        if error == "access_denied" {
            return Err(IdentityError::InteractiveAuthCancelled);
        }
        return Err(IdentityError::AuthenticationFailed(ErrorResponse {
            error,
            error_description,
            error_uri,
        }));
    }

    let code = code.ok_or_else(|| {
        IdentityError::InvalidResponse("authorization redirect carried no code".to_string())
    })?;
    Ok((code, state))
}
