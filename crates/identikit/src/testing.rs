//! Mock implementations of the crate's capability traits
//!
//! Provides test doubles for transports, refreshers, flows and user
//! agents. Enabled with the `test-utils` feature or within the crate's own
//! tests.

// Allow missing error/panic docs for test mocks - they are designed to be
// simple and errors are clearly indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use crate::error::IdentityError;
use crate::flow::AuthorizationFlow;
use crate::http::{BoxError, HttpRequest, HttpResponse, NetworkTransport};
use crate::refresh::{AccessTokenRefreshRequest, AccessTokenRefresher};
use crate::token::AccessTokenResponse;
use crate::user_agent::{RedirectionHandler, UserAgent};

/// Mock transport with scripted responses and a request log
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse, String>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockTransport {
    /// Create a transport with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next response.
    pub fn push_response(&self, status: u16, body: Vec<u8>) {
        // SAFETY: Mutex poisoning is acceptable in test mocks - if a test
        // panics, the entire test fails anyway
        self.responses.lock().unwrap().push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Script the next send to fail at the transport level.
    pub fn push_error(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(message.to_string()));
    }

    /// Requests captured so far, in send order.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of sends performed.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl NetworkTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, BoxError> {
        self.requests.lock().unwrap().push(request.clone());

        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(message.into()),
            None => Err(format!("no scripted response for {}", request.url).into()),
        }
    }
}

/// Mock refresher with scripted results and an invocation counter
#[derive(Clone)]
pub struct MockRefresher {
    queue: Arc<Mutex<VecDeque<Result<AccessTokenResponse, IdentityError>>>>,
    default: Arc<Mutex<Result<AccessTokenResponse, IdentityError>>>,
    calls: Arc<Mutex<Vec<AccessTokenRefreshRequest>>>,
    delay: Option<std::time::Duration>,
}

impl MockRefresher {
    /// Create a refresher that fails until a result is scripted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            default: Arc::new(Mutex::new(Err(IdentityError::Config(
                "no scripted refresh result".to_string(),
            )))),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Create a refresher that always returns the given response.
    #[must_use]
    pub fn returning(response: AccessTokenResponse) -> Self {
        let refresher = Self::new();
        *refresher.default.lock().unwrap() = Ok(response);
        refresher
    }

    /// Create a refresher that always fails with the given error.
    #[must_use]
    pub fn failing(error: IdentityError) -> Self {
        let refresher = Self::new();
        *refresher.default.lock().unwrap() = Err(error);
        refresher
    }

    /// Script a one-shot result consumed before the default.
    pub fn push_result(&self, result: Result<AccessTokenResponse, IdentityError>) {
        self.queue.lock().unwrap().push_back(result);
    }

    /// Sleep this long inside every refresh, to widen race windows in
    /// concurrency tests.
    #[must_use]
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of refresh invocations so far.
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The most recent refresh request, if any.
    #[must_use]
    pub fn last_request(&self) -> Option<AccessTokenRefreshRequest> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl Default for MockRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenRefresher for MockRefresher {
    async fn refresh(
        &self,
        request: &AccessTokenRefreshRequest,
    ) -> Result<AccessTokenResponse, IdentityError> {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.queue.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => self.default.lock().unwrap().clone(),
        }
    }
}

/// Mock interactive flow with a scripted outcome
#[derive(Clone)]
pub struct MockAuthorizationFlow {
    result: Arc<Mutex<Result<AccessTokenResponse, IdentityError>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockAuthorizationFlow {
    /// Create a flow that yields the given response.
    #[must_use]
    pub fn succeeding(response: AccessTokenResponse) -> Self {
        Self { result: Arc::new(Mutex::new(Ok(response))), calls: Arc::new(Mutex::new(0)) }
    }

    /// Create a flow that fails with the given error.
    #[must_use]
    pub fn failing(error: IdentityError) -> Self {
        Self { result: Arc::new(Mutex::new(Err(error))), calls: Arc::new(Mutex::new(0)) }
    }

    /// Number of authenticate invocations so far.
    #[must_use]
    pub fn authenticate_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AuthorizationFlow for MockAuthorizationFlow {
    async fn authenticate(&self) -> Result<AccessTokenResponse, IdentityError> {
        *self.calls.lock().unwrap() += 1;
        self.result.lock().unwrap().clone()
    }
}

enum UserAgentMode {
    Authorize { code: String, state_override: Option<String> },
    Deny,
    Cancel,
}

/// Mock user agent that synthesizes the redirect a real login would produce
pub struct MockUserAgent {
    mode: UserAgentMode,
    performs: Arc<Mutex<usize>>,
}

impl MockUserAgent {
    /// Simulate a successful login yielding the given authorization code.
    ///
    /// The state parameter is echoed from the authorization request, as a
    /// compliant server would.
    #[must_use]
    pub fn authorizing(code: impl Into<String>) -> Self {
        Self {
            mode: UserAgentMode::Authorize { code: code.into(), state_override: None },
            performs: Arc::new(Mutex::new(0)),
        }
    }

    /// Simulate a login that redirects with a forged state value.
    #[must_use]
    pub fn authorizing_with_state(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            mode: UserAgentMode::Authorize {
                code: code.into(),
                state_override: Some(state.into()),
            },
            performs: Arc::new(Mutex::new(0)),
        }
    }

    /// Simulate the user denying consent (`error=access_denied`).
    #[must_use]
    pub fn denying() -> Self {
        Self { mode: UserAgentMode::Deny, performs: Arc::new(Mutex::new(0)) }
    }

    /// Simulate the user closing the session before any redirect.
    #[must_use]
    pub fn cancelling() -> Self {
        Self { mode: UserAgentMode::Cancel, performs: Arc::new(Mutex::new(0)) }
    }

    /// Number of perform invocations so far.
    #[must_use]
    pub fn perform_count(&self) -> usize {
        *self.performs.lock().unwrap()
    }
}

#[async_trait]
impl UserAgent for MockUserAgent {
    async fn perform(
        &self,
        request: HttpRequest,
        handler: Arc<dyn RedirectionHandler>,
    ) -> Result<(), IdentityError> {
        *self.performs.lock().unwrap() += 1;

        let query: Vec<(String, String)> = request
            .url
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        let lookup = |name: &str| {
            query.iter().find(|(key, _)| key == name).map(|(_, value)| value.clone())
        };

        let redirect_uri = lookup("redirect_uri").ok_or_else(|| {
            IdentityError::Config("authorization request carried no redirect_uri".to_string())
        })?;
        let mut redirect = Url::parse(&redirect_uri)
            .map_err(|e| IdentityError::Config(format!("invalid redirect_uri: {e}")))?;

        match &self.mode {
            UserAgentMode::Cancel => return Err(IdentityError::InteractiveAuthCancelled),
            UserAgentMode::Deny => {
                redirect.query_pairs_mut().append_pair("error", "access_denied");
                if let Some(state) = lookup("state") {
                    redirect.query_pairs_mut().append_pair("state", &state);
                }
            }
            UserAgentMode::Authorize { code, state_override } => {
                redirect.query_pairs_mut().append_pair("code", code);
                let state = state_override.clone().or_else(|| lookup("state"));
                if let Some(state) = state {
                    redirect.query_pairs_mut().append_pair("state", &state);
                }
            }
        }

        handler.handle(&HttpRequest::get(redirect));
        Ok(())
    }
}
