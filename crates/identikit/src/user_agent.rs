//! Interactive user-agent capability contract.
//!
//! The toolkit never renders anything. An interactive flow hands the
//! authorization request to a [`UserAgent`] — a browser window, an embedded
//! web view, a test double — and waits for the redirect that the
//! [`RedirectionHandler`] accepts.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::IdentityError;
use crate::http::HttpRequest;

/// Decides whether a candidate redirect is the expected callback
///
/// The flow installs a handler that recognizes its redirect URI and
/// captures the matching request for result extraction.
pub trait RedirectionHandler: Send + Sync {
    /// Return `true` when `redirect` is the awaited callback, which ends
    /// the interactive session.
    fn handle(&self, redirect: &HttpRequest) -> bool;
}

/// Trait for driving a redirect-based interactive authentication flow
#[async_trait]
pub trait UserAgent: Send + Sync {
    /// Load `request` and forward every candidate redirect to `handler`
    /// until it accepts one.
    ///
    /// # Errors
    /// Returns [`IdentityError::InteractiveAuthCancelled`] when the user
    /// aborts the session before the handler accepts a redirect.
    async fn perform(
        &self,
        request: HttpRequest,
        handler: Arc<dyn RedirectionHandler>,
    ) -> Result<(), IdentityError>;
}

impl<F> RedirectionHandler for F
where
    F: Fn(&HttpRequest) -> bool + Send + Sync,
{
    fn handle(&self, redirect: &HttpRequest) -> bool {
        self(redirect)
    }
}

type UserAgentHandler = Box<
    dyn Fn(HttpRequest, Arc<dyn RedirectionHandler>) -> BoxFuture<'static, Result<(), IdentityError>>
        + Send
        + Sync,
>;

/// A closure-based implementation of [`UserAgent`]
///
/// Lets applications adapt whatever presentation machinery they have
/// without defining a new type.
pub struct AnyUserAgent {
    handler: UserAgentHandler,
}

impl AnyUserAgent {
    /// Wrap an async function as a user agent.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(HttpRequest, Arc<dyn RedirectionHandler>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), IdentityError>> + Send + 'static,
    {
        Self { handler: Box::new(move |request, redirects| Box::pin(handler(request, redirects))) }
    }
}

impl std::fmt::Debug for AnyUserAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyUserAgent").finish_non_exhaustive()
    }
}

#[async_trait]
impl UserAgent for AnyUserAgent {
    async fn perform(
        &self,
        request: HttpRequest,
        handler: Arc<dyn RedirectionHandler>,
    ) -> Result<(), IdentityError> {
        (self.handler)(request, handler).await
    }
}
