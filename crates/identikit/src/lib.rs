//! Client-side OAuth 2.0 identity and request-authorization toolkit.
//!
//! Authorizes outgoing HTTP requests with bearer credentials, refreshes
//! expired access tokens, and coordinates interactive authentication
//! through an abstract user agent when no valid token exists.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │  IdentityManager  │  Facade: authorize / refresh / re-authenticate
//! └─────────┬─────────┘
//!           │
//!           ├──► RequestAuthorizer        (Bearer, Basic client, composite)
//!           ├──► AccessTokenRefresher     (refresh-token grant)
//!           │         │
//!           │         └──► NetworkTransport   (any HTTP stack)
//!           │
//!           └──► AuthorizationFlow        (authorization-code grant + PKCE)
//!                     │
//!                     └──► UserAgent          (browser, web view, test double)
//! ```
//!
//! Concurrent `authorize` calls over an expired credential share a single
//! in-flight recovery: exactly one token exchange (and at most one
//! interactive prompt) serves the whole batch, and one caller abandoning
//! its request does not cancel the recovery for the rest.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use identikit::{
//!     AuthorizationCodeGrantFlow, HttpRequest, IdentityManager, ProviderConfig,
//!     ReqwestTransport, Scope, TokenEndpointRefresher,
//! };
//! use identikit::user_agent::AnyUserAgent;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProviderConfig::new(
//!     Url::parse("https://login.example.com/authorize")?,
//!     Url::parse("https://login.example.com/oauth/token")?,
//!     "client_id",
//!     Url::parse("http://localhost:8888/callback")?,
//! )
//! .with_client_secret("client_secret")
//! .with_scope(Scope::from("openid profile offline_access"));
//!
//! let transport = Arc::new(ReqwestTransport::new());
//! let client_authorizer = Arc::new(config.client_authorizer()?);
//!
//! let refresher = TokenEndpointRefresher::new(
//!     config.token_endpoint.clone(),
//!     transport.clone(),
//!     client_authorizer.clone(),
//! );
//!
//! // The user agent is whatever can show a login page; here, a stub.
//! let user_agent = Arc::new(AnyUserAgent::new(|_request, _redirects| async move {
//!     Err(identikit::IdentityError::InteractiveAuthCancelled)
//! }));
//! let flow = AuthorizationCodeGrantFlow::new(config, transport, client_authorizer, user_agent);
//!
//! let manager = IdentityManager::new(refresher, Some(flow));
//!
//! // Authorize a request; refresh and login happen as needed.
//! let request = HttpRequest::get(Url::parse("https://api.example.com/me")?);
//! let authorized = manager.authorize(&request, false).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - **[`http`]**: request/response value types and the transport seam
//! - **[`authorizer`]**: bearer, Basic-client and composite authorizers
//! - **[`token`]**: `AccessTokenResponse`, expiry policy, credential state
//! - **[`refresh`]**: refresh-token grant against the token endpoint
//! - **[`flow`]**: authorization-code grant over an abstract user agent
//! - **[`manager`]**: the `IdentityManager` facade with single-flight
//!   recovery
//! - **[`transport`]**: default `reqwest` transport (feature `transport`)
//! - **[`testing`]**: mock capability implementations (feature
//!   `test-utils`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod authorizer;
pub mod config;
pub mod error;
pub mod flow;
pub mod http;
pub mod manager;
pub mod pkce;
pub mod refresh;
pub mod scope;
pub mod token;
pub mod user_agent;

#[cfg(feature = "transport")]
pub mod transport;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types for convenience
// ------------------------
pub use authorizer::{
    AnyAuthorizer, BasicClientAuthorizer, BearerAuthorizer, CompositeAuthorizer,
    RequestAuthorizer,
};
pub use config::ProviderConfig;
pub use error::{ErrorResponse, IdentityError};
pub use flow::{AuthorizationCodeGrantFlow, AuthorizationFlow};
pub use http::{AnyTransport, BoxError, HttpRequest, HttpResponse, NetworkTransport};
pub use manager::{ExpirationPredicate, IdentityManager, IdentityManagerOptions};
pub use pkce::PkceChallenge;
pub use refresh::{AccessTokenRefreshRequest, AccessTokenRefresher, TokenEndpointRefresher};
pub use scope::Scope;
pub use token::{AccessTokenResponse, CredentialStore};
#[cfg(feature = "transport")]
pub use transport::ReqwestTransport;
pub use user_agent::{AnyUserAgent, RedirectionHandler, UserAgent};
