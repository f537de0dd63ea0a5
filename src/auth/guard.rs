//! Navigation gate for protected destinations.

use std::sync::Arc;
use tracing::debug;

use super::coordinator::RefreshCoordinator;
use super::types::TokenPair;
use crate::jwt;

/// Token situation observed when a navigation is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Neither token is stored.
    NoToken,
    /// The access token decodes and has not expired.
    TokenPresentValid,
    /// The access token is expired, unreadable, or gone while a refresh token remains.
    TokenPresentExpired,
    /// A refresh was attempted and failed; the session is over.
    Unauthenticated,
}

impl GuardState {
    /// Classify a token pair. Malformed tokens count as expired.
    pub fn classify(tokens: &TokenPair) -> Self {
        Self::classify_at(tokens, jwt::now_millis())
    }

    pub fn classify_at(tokens: &TokenPair, now_ms: u64) -> Self {
        match (&tokens.access_token, &tokens.refresh_token) {
            (None, None) => GuardState::NoToken,
            (Some(access), _) if !jwt::is_expired_at(Some(access), now_ms) => {
                GuardState::TokenPresentValid
            }
            _ => GuardState::TokenPresentExpired,
        }
    }
}

/// Outcome of a navigation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allow,
    Redirect(String),
}

/// Gate evaluated before every navigation.
#[derive(Clone)]
pub struct SessionGuard {
    coordinator: Arc<RefreshCoordinator>,
    public_paths: Arc<[String]>,
}

impl SessionGuard {
    pub fn new(coordinator: Arc<RefreshCoordinator>, public_paths: Vec<String>) -> Self {
        Self {
            coordinator,
            public_paths: public_paths.into(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }

    /// Decide whether navigation to `path` may proceed, refreshing if needed.
    pub async fn check(&self, path: &str) -> Navigation {
        if self.is_public(path) {
            return Navigation::Allow;
        }

        let login = || Navigation::Redirect(self.coordinator.login_path().to_string());
        let state = GuardState::classify(&self.coordinator.store().get());
        debug!(path = %path, state = ?state, "Checking navigation");

        match self.resolve(state).await {
            GuardState::TokenPresentValid => Navigation::Allow,
            _ => login(),
        }
    }

    /// Drive the state machine to a terminal state.
    async fn resolve(&self, state: GuardState) -> GuardState {
        match state {
            GuardState::TokenPresentExpired => {
                if self.coordinator.refresh().await {
                    GuardState::TokenPresentValid
                } else {
                    // No-op when the failed exchange already ended the session
                    self.coordinator.logout();
                    GuardState::Unauthenticated
                }
            }
            other => other,
        }
    }
}
