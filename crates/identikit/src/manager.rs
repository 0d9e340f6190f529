//! Authorization orchestration facade.
//!
//! [`IdentityManager`] hides the OAuth 2.0 state machine behind a single
//! operation: authorize a request. It decides between attaching the current
//! token, refreshing it, and escalating to interactive authentication, and
//! it guarantees that concurrent callers never trigger redundant token
//! exchanges or duplicate login prompts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::authorizer::{BearerAuthorizer, RequestAuthorizer};
use crate::error::IdentityError;
use crate::flow::AuthorizationFlow;
use crate::http::HttpRequest;
use crate::refresh::{AccessTokenRefreshRequest, AccessTokenRefresher};
use crate::token::{AccessTokenResponse, CredentialStore};

/// Pluggable expiry decision for tokens without a server-communicated
/// lifetime. The default never reports a token expired, relying on
/// server-side rejection to trigger recovery.
pub type ExpirationPredicate = Arc<dyn Fn(&AccessTokenResponse) -> bool + Send + Sync>;

type RecoveryFuture = Shared<BoxFuture<'static, Result<AccessTokenResponse, IdentityError>>>;

/// One in-flight credential recovery shared by every waiter.
#[derive(Clone)]
struct Recovery {
    id: u64,
    future: RecoveryFuture,
    interactive: bool,
}

/// Tuning knobs for the manager
pub struct IdentityManagerOptions {
    /// Treat tokens expiring within this window as already expired, so a
    /// refresh happens before the token dies mid-request.
    pub refresh_leeway: Duration,

    /// Expiry decision for tokens without `expires_in`.
    pub expiration_predicate: Option<ExpirationPredicate>,
}

impl Default for IdentityManagerOptions {
    fn default() -> Self {
        Self { refresh_leeway: Duration::zero(), expiration_predicate: None }
    }
}

impl std::fmt::Debug for IdentityManagerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityManagerOptions")
            .field("refresh_leeway", &self.refresh_leeway)
            .field("expiration_predicate", &self.expiration_predicate.is_some())
            .finish()
    }
}

/// Facade that authorizes requests and manages credential state
///
/// Cloning is cheap and every clone shares the same credential state and
/// in-flight recovery, so a manager can be handed to as many tasks as
/// needed.
pub struct IdentityManager<R, F> {
    inner: Arc<Inner<R, F>>,
}

impl<R, F> Clone for IdentityManager<R, F> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<R, F> std::fmt::Debug for IdentityManager<R, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityManager").finish_non_exhaustive()
    }
}

struct Inner<R, F> {
    refresher: R,
    flow: Option<F>,
    credentials: CredentialStore,
    authorizer: BearerAuthorizer,
    in_flight: Mutex<Option<Recovery>>,
    recovery_seq: AtomicU64,
    refresh_leeway: Duration,
    expiration_predicate: Option<ExpirationPredicate>,
}

impl<R, F> IdentityManager<R, F>
where
    R: AccessTokenRefresher + 'static,
    F: AuthorizationFlow + 'static,
{
    /// Create a manager with default options.
    ///
    /// `flow` is the interactive fallback; pass `None` when no user
    /// interaction is possible, in which case refresh failures surface
    /// directly.
    #[must_use]
    pub fn new(refresher: R, flow: Option<F>) -> Self {
        Self::with_options(refresher, flow, IdentityManagerOptions::default())
    }

    /// Create a manager with explicit options.
    #[must_use]
    pub fn with_options(refresher: R, flow: Option<F>, options: IdentityManagerOptions) -> Self {
        let credentials = CredentialStore::new();
        let authorizer = BearerAuthorizer::new(credentials.clone());
        Self {
            inner: Arc::new(Inner {
                refresher,
                flow,
                credentials,
                authorizer,
                in_flight: Mutex::new(None),
                recovery_seq: AtomicU64::new(0),
                refresh_leeway: options.refresh_leeway,
                expiration_predicate: options.expiration_predicate,
            }),
        }
    }

    /// Handle to the shared credential state.
    ///
    /// Useful for seeding a persisted credential at startup or inspecting
    /// the current one; the manager and its bearer authorizer observe every
    /// change.
    #[must_use]
    pub fn credentials(&self) -> CredentialStore {
        self.inner.credentials.clone()
    }

    /// Whether a credential is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.credentials.is_present().await
    }

    /// Drop the current credential (logout).
    pub async fn clear(&self) {
        self.inner.credentials.clear().await;
        info!("credential cleared");
    }

    /// Authorize a request, refreshing or re-authenticating as needed.
    ///
    /// With `force_authenticate` the interactive flow always runs,
    /// regardless of the credential state. On success the returned request
    /// is an authorized copy of `request`; on failure `request` is left
    /// untouched and the error describes the first unrecoverable step.
    ///
    /// Concurrent calls observe a consistent view: either they all attach
    /// the same valid token, or exactly one token exchange (and at most one
    /// interactive prompt) serves the whole batch.
    ///
    /// # Errors
    /// See [`IdentityError`]; `NetworkFailure` is retryable, everything
    /// else is not.
    pub async fn authorize(
        &self,
        request: &HttpRequest,
        force_authenticate: bool,
    ) -> Result<HttpRequest, IdentityError> {
        if !force_authenticate {
            if let Some(credential) = self.inner.credentials.get().await {
                if !self.inner.credential_expired(&credential) {
                    debug!("credential valid, attaching without network calls");
                    return self.inner.authorizer.authorize(request).await;
                }
            }
        }

        self.acquire_credential(force_authenticate).await?;
        self.inner.authorizer.authorize(request).await
    }

    /// Join or start the single-flight credential recovery.
    async fn acquire_credential(
        &self,
        force: bool,
    ) -> Result<AccessTokenResponse, IdentityError> {
        loop {
            let (recovery, joined) = {
                let mut in_flight = self.inner.in_flight.lock().await;
                match in_flight.clone() {
                    Some(existing) if !force || existing.interactive => (existing, true),
                    Some(existing) => {
                        // A forced caller never settles for a refresh-only
                        // recovery; wait it out and start an interactive one.
                        drop(in_flight);
                        let _ = existing.future.clone().await;
                        self.clear_recovery(existing.id).await;
                        continue;
                    }
                    None => {
                        let id = self.inner.recovery_seq.fetch_add(1, Ordering::Relaxed);
                        let future =
                            Inner::recover(Arc::clone(&self.inner), force).boxed().shared();
                        let recovery = Recovery { id, future, interactive: force };
                        *in_flight = Some(recovery.clone());
                        (recovery, false)
                    }
                }
            };

            if joined {
                debug!("joining in-flight credential recovery");
            }
            let result = recovery.future.clone().await;
            self.clear_recovery(recovery.id).await;
            return result;
        }
    }

    /// Retire the marker once its recovery has settled, unless a newer one
    /// already replaced it.
    async fn clear_recovery(&self, finished: u64) {
        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight.as_ref().is_some_and(|current| current.id == finished) {
            *in_flight = None;
        }
    }
}

impl<R, F> Inner<R, F>
where
    R: AccessTokenRefresher + 'static,
    F: AuthorizationFlow + 'static,
{
    fn credential_expired(&self, credential: &AccessTokenResponse) -> bool {
        if credential.expires_at().is_some() {
            credential.is_expired_at(Utc::now() + self.refresh_leeway)
        } else {
            self.expiration_predicate.as_ref().is_some_and(|expired| expired(credential))
        }
    }

    /// Obtain a fresh credential: refresh when possible, fall back to the
    /// interactive flow. Runs at most once per batch of concurrent callers.
    async fn recover(
        inner: Arc<Self>,
        interactive_only: bool,
    ) -> Result<AccessTokenResponse, IdentityError> {
        if !interactive_only {
            if let Some(credential) = inner.credentials.get().await {
                // Re-check under the flight: a recovery that completed while
                // this caller was acquiring the marker may already have
                // replaced the credential.
                if !inner.credential_expired(&credential) {
                    return Ok(credential);
                }

                if let Some(refresh_token) = credential.refresh_token() {
                    let request = match credential.scope() {
                        Some(scope) => AccessTokenRefreshRequest::new(refresh_token)
                            .with_scope(scope.clone()),
                        None => AccessTokenRefreshRequest::new(refresh_token),
                    };

                    match inner.refresher.refresh(&request).await {
                        Ok(mut fresh) => {
                            fresh.inherit_refresh_token(&credential);
                            inner.credentials.replace(fresh.clone()).await;
                            info!("access token refreshed");
                            return Ok(fresh);
                        }
                        Err(error @ IdentityError::NetworkFailure(_)) => {
                            // Transient transport trouble is the caller's
                            // retry decision, not a reason to put a login
                            // screen in front of the user.
                            warn!(%error, "token refresh hit a network failure");
                            return Err(error);
                        }
                        Err(error) => {
                            warn!(%error, "token refresh rejected, escalating to interactive authentication");
                            return Self::authenticate_interactively(&inner, Some(error)).await;
                        }
                    }
                }

                debug!("credential expired without a refresh token");
            }
        }

        Self::authenticate_interactively(&inner, None).await
    }

    async fn authenticate_interactively(
        inner: &Arc<Self>,
        refresh_error: Option<IdentityError>,
    ) -> Result<AccessTokenResponse, IdentityError> {
        let Some(flow) = &inner.flow else {
            // No interactive fallback configured; surface the refresh error
            // when there is one.
            return Err(refresh_error.unwrap_or(IdentityError::NoCredential));
        };

        match flow.authenticate().await {
            Ok(credential) => {
                inner.credentials.replace(credential.clone()).await;
                info!("interactive authentication succeeded");
                Ok(credential)
            }
            Err(IdentityError::InteractiveAuthCancelled) => {
                Err(IdentityError::InteractiveAuthCancelled)
            }
            Err(error) => match refresh_error {
                // The refresh rejection is the root cause; the failed login
                // attempt only confirmed it.
                Some(root) => {
                    warn!(%error, "interactive authentication failed after a rejected refresh");
                    Err(root)
                }
                None => Err(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for manager.
    use super::*;
    use crate::testing::{MockAuthorizationFlow, MockRefresher};

    fn sample_token(access_token: &str, expires_in: Option<i64>) -> AccessTokenResponse {
        AccessTokenResponse::new(
            access_token,
            "Bearer",
            expires_in,
            Some("refresh_1".to_string()),
            None,
        )
    }

    fn request() -> HttpRequest {
        HttpRequest::get(url::Url::parse("https://api.example.com/me").expect("valid url"))
    }

    /// Validates the valid-credential fast path.
    ///
    /// Assertions:
    /// - Confirms the bearer token is attached.
    /// - Ensures neither the refresher nor the flow runs.
    #[tokio::test]
    async fn test_valid_credential_attaches_without_network() {
        let refresher = MockRefresher::new();
        let flow = MockAuthorizationFlow::failing(IdentityError::NoCredential);
        let manager = IdentityManager::new(refresher.clone(), Some(flow.clone()));
        manager.credentials().replace(sample_token("live", Some(3600))).await;

        let authorized =
            manager.authorize(&request(), false).await.expect("should authorize");

        assert_eq!(authorized.header("Authorization"), Some("Bearer live"));
        assert_eq!(refresher.refresh_count(), 0);
        assert_eq!(flow.authenticate_count(), 0);
    }

    /// Validates idempotence of authorize on a valid credential.
    ///
    /// Assertions:
    /// - Confirms two calls produce identical output with no side effects.
    #[tokio::test]
    async fn test_authorize_is_idempotent_when_valid() {
        let refresher = MockRefresher::new();
        let manager = IdentityManager::<MockRefresher, MockAuthorizationFlow>::new(
            refresher.clone(),
            None,
        );
        manager.credentials().replace(sample_token("live", Some(3600))).await;

        let original = request();
        let first = manager.authorize(&original, false).await.expect("first call");
        let second = manager.authorize(&original, false).await.expect("second call");

        assert_eq!(first, second);
        assert_eq!(refresher.refresh_count(), 0);
    }

    /// Validates the expired-credential refresh path.
    ///
    /// Assertions:
    /// - Confirms the refreshed token is attached.
    /// - Confirms the credential state was replaced.
    #[tokio::test]
    async fn test_expired_credential_refreshes() {
        let refresher = MockRefresher::returning(sample_token("fresh", Some(3600)));
        let manager = IdentityManager::<MockRefresher, MockAuthorizationFlow>::new(
            refresher.clone(),
            None,
        );
        manager.credentials().replace(sample_token("stale", Some(0))).await;

        let authorized =
            manager.authorize(&request(), false).await.expect("should refresh");

        assert_eq!(authorized.header("Authorization"), Some("Bearer fresh"));
        assert_eq!(refresher.refresh_count(), 1);
        let stored = manager.credentials().get().await.expect("credential stored");
        assert_eq!(stored.access_token(), "fresh");
    }

    /// Validates the no-credential, no-flow failure scenario.
    ///
    /// Assertions:
    /// - Ensures authorize fails with `NoCredential`.
    #[tokio::test]
    async fn test_no_credential_without_flow_fails() {
        let manager = IdentityManager::<MockRefresher, MockAuthorizationFlow>::new(
            MockRefresher::new(),
            None,
        );

        let result = manager.authorize(&request(), false).await;
        assert!(matches!(result, Err(IdentityError::NoCredential)));
    }

    /// Validates the custom expiration predicate scenario for tokens
    /// without a server-communicated lifetime.
    ///
    /// Assertions:
    /// - Ensures the predicate drives the refresh decision.
    #[tokio::test]
    async fn test_expiration_predicate_triggers_refresh() {
        let refresher = MockRefresher::returning(sample_token("fresh", Some(3600)));
        let options = IdentityManagerOptions {
            refresh_leeway: Duration::zero(),
            expiration_predicate: Some(Arc::new(|_credential| true)),
        };
        let manager = IdentityManager::<MockRefresher, MockAuthorizationFlow>::with_options(
            refresher.clone(),
            None,
            options,
        );
        manager.credentials().replace(sample_token("undated", None)).await;

        manager.authorize(&request(), false).await.expect("should refresh");
        assert_eq!(refresher.refresh_count(), 1);
    }

    /// Validates the refresh leeway scenario.
    ///
    /// Assertions:
    /// - Ensures a token inside the leeway window refreshes early.
    #[tokio::test]
    async fn test_refresh_leeway_refreshes_early() {
        let refresher = MockRefresher::returning(sample_token("fresh", Some(3600)));
        let options = IdentityManagerOptions {
            refresh_leeway: Duration::seconds(300),
            expiration_predicate: None,
        };
        let manager = IdentityManager::<MockRefresher, MockAuthorizationFlow>::with_options(
            refresher.clone(),
            None,
            options,
        );
        // Expires in one minute, well inside the five-minute leeway.
        manager.credentials().replace(sample_token("closing", Some(60))).await;

        manager.authorize(&request(), false).await.expect("should refresh");
        assert_eq!(refresher.refresh_count(), 1);
    }
}
