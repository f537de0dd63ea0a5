//! User-facing failures of session operations.

use crate::api::ApiError;

/// A failed session operation with the message to show the user.
///
/// The message is the server's `{message}` when it sent one, otherwise a
/// fallback specific to the operation.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
    #[source]
    pub source: ApiError,
}

impl AuthError {
    pub(crate) fn new(source: ApiError, fallback: &str) -> Self {
        let message = match &source {
            ApiError::Unauthenticated => NOT_AUTHORIZED.to_string(),
            other => other.server_message().unwrap_or(fallback).to_string(),
        };
        Self { message, source }
    }

    pub(crate) fn unauthenticated() -> Self {
        Self::new(ApiError::Unauthenticated, NOT_AUTHORIZED)
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self.source, ApiError::Unauthenticated)
    }
}

pub(crate) const NOT_AUTHORIZED: &str = "Not authorized";
pub(crate) const LOGIN_FAILED: &str = "Invalid username or password";
pub(crate) const REGISTER_FAILED: &str = "Registration failed";
pub(crate) const PROFILE_UPDATE_FAILED: &str = "Failed to update profile";
pub(crate) const IMAGE_UPLOAD_FAILED: &str = "Failed to upload photo";
pub(crate) const ABOUT_UPDATE_FAILED: &str = "Failed to update description";
pub(crate) const RESET_FAILED: &str = "Password reset failed. Check the username";
