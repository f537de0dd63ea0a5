//! Errors raised by calls to the remote API.

use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport-level failure: connection, TLS, timeout.
    #[error("network failure: {0}")]
    NetworkFailure(#[source] reqwest::Error),
    /// Non-success status from the API.
    #[error("request rejected with {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    AuthRejected {
        status: StatusCode,
        message: Option<String>,
    },
    /// The API answered with a body we could not read.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// No usable token was available for an authorized call.
    #[error("not authenticated")]
    Unauthenticated,
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::AuthRejected { status, .. } => Some(*status),
            ApiError::NetworkFailure(e) => e.status(),
            _ => None,
        }
    }

    /// Message reported by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::AuthRejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Build a rejection from a failed response, reading its `{message}` body when present.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
        }

        let status = response.status();
        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|m| !m.is_empty());

        ApiError::AuthRejected { status, message }
    }
}
