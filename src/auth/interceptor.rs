//! Reactive refresh on authorization failures.

use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{info, warn};

use super::coordinator::RefreshCoordinator;

/// What the interceptor did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intercepted {
    /// Not an authorization failure; nothing done.
    Passed,
    /// Tokens were refreshed. The failed request is not replayed.
    Refreshed,
    /// Refresh failed and the session was ended.
    LoggedOut,
}

/// Observes API responses and reacts to `401 Unauthorized`.
#[derive(Clone)]
pub struct ResponseInterceptor {
    coordinator: Arc<RefreshCoordinator>,
}

impl ResponseInterceptor {
    pub fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn observe(&self, status: StatusCode) -> Intercepted {
        if status != StatusCode::UNAUTHORIZED {
            return Intercepted::Passed;
        }

        info!("401 response, refreshing tokens");
        if self.coordinator.refresh().await {
            info!("Tokens refreshed after 401");
            Intercepted::Refreshed
        } else {
            warn!("Could not refresh after 401, logging out");
            self.coordinator.logout();
            Intercepted::LoggedOut
        }
    }
}
