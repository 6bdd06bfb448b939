//! Bearer-token sources.
//!
//! The transport never reads ambient global state for credentials. A
//! [`TokenProvider`] is injected at construction and consulted once per
//! request; returning `None` omits the `Authorization` header.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

/// Yields the current bearer token, if any.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Token for the next request. `None` means "send unauthenticated".
    async fn token(&self) -> Option<String>;
}

/// Never authenticates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

#[async_trait]
impl TokenProvider for NoSession {
    async fn token(&self) -> Option<String> {
        None
    }
}

/// A fixed token, e.g. from `STAKD_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct SignedIn {
    token: String,
    org_id: String,
    user_id: String,
    expires_at: Option<Instant>,
}

/// Swappable signed-in state.
///
/// Holds at most one signed-in user. Tokens past their expiry are treated
/// as absent, so the server's 401 surfaces as an API error instead of the
/// client guessing at refresh.
#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<Option<SignedIn>>,
}

impl Session {
    /// Creates a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a signed-in user, replacing any previous one.
    pub fn sign_in(
        &self,
        token: impl Into<String>,
        org_id: impl Into<String>,
        user_id: impl Into<String>,
        ttl: Option<Duration>,
    ) {
        let signed_in = SignedIn {
            token: token.into(),
            org_id: org_id.into(),
            user_id: user_id.into(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        tracing::debug!(org_id = %signed_in.org_id, user_id = %signed_in.user_id, "session signed in");
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(signed_in);
    }

    /// Clears the signed-in user.
    pub fn sign_out(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("session signed out");
    }

    /// Organization of the signed-in user.
    pub fn org_id(&self) -> Option<String> {
        self.current().map(|s| s.org_id)
    }

    /// Id of the signed-in user.
    pub fn user_id(&self) -> Option<String> {
        self.current().map(|s| s.user_id)
    }

    /// Returns `true` while a non-expired user is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<SignedIn> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|s| s.expires_at.is_none_or(|at| Instant::now() < at))
            .cloned()
    }
}

#[async_trait]
impl TokenProvider for Session {
    async fn token(&self) -> Option<String> {
        self.current().map(|s| s.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_and_none() {
        assert_eq!(StaticToken::new("abc").token().await.as_deref(), Some("abc"));
        assert_eq!(NoSession.token().await, None);
    }

    #[tokio::test]
    async fn test_session_sign_in_out() {
        let session = Session::new();
        assert!(session.token().await.is_none());

        session.sign_in("tok", "org-1", "u1", None);
        assert_eq!(session.token().await.as_deref(), Some("tok"));
        assert_eq!(session.org_id().as_deref(), Some("org-1"));

        session.sign_out();
        assert!(!session.is_signed_in());
        assert!(session.token().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expiry() {
        let session = Session::new();
        session.sign_in("tok", "org-1", "u1", Some(Duration::from_secs(60)));
        assert!(session.token().await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(session.token().await.is_none());
        assert!(session.user_id().is_none());
    }
}
