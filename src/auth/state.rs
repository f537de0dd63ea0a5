//! Collaborator traits the session core depends on.

use async_trait::async_trait;
use tracing::info;

use super::types::AuthResponse;
use crate::api::ApiError;

/// Trades a refresh token for a new token pair.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError>;
}

/// Client-side navigation primitive.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Navigator for headless clients: records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        info!(path = %path, "Redirecting");
    }
}
