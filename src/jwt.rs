//! Bearer token claim decoding.
//!
//! Tokens are never verified here: the signature belongs to the API. The client
//! only reads the `exp` claim from the payload segment to decide when a token
//! must be refreshed. Anything that cannot be decoded is treated as expired.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds before expiry at which the access token is proactively refreshed.
pub const PROACTIVE_REFRESH_WINDOW_SECS: u64 = 5 * 60;

/// base64url decoder that accepts both padded and unpadded payloads.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from a token payload.
///
/// Only `exp` is interpreted; other claims are kept for display and logging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    /// Expiration time (Unix timestamp, seconds)
    #[serde(default)]
    pub exp: Option<f64>,
    /// Subject
    #[serde(default)]
    pub sub: Option<String>,
    /// Issued at (Unix timestamp, seconds)
    #[serde(default)]
    pub iat: Option<f64>,
    /// Everything else in the payload
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Reasons a token could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has {0} segments, expected 3")]
    SegmentCount(usize),
    #[error("token payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Decode the claims segment of a token without verifying its signature.
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    let payload = PAYLOAD_ENGINE.decode(segments[1])?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Expiry of a token in milliseconds since the epoch, if it can be read.
fn expiry_millis(token: &str) -> Option<f64> {
    let exp = decode(token).ok()?.exp?;
    Some(exp * 1000.0)
}

/// Whether a token is expired. Absent, malformed and `exp`-less tokens are expired.
pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(token, now_millis())
}

pub fn is_expired_at(token: Option<&str>, now_ms: u64) -> bool {
    match token.and_then(expiry_millis) {
        Some(exp_ms) => exp_ms <= now_ms as f64,
        None => true,
    }
}

/// Whole seconds left before the token expires, 0 if expired or unreadable.
pub fn seconds_until_expiry(token: Option<&str>) -> u64 {
    seconds_until_expiry_at(token, now_millis())
}

pub fn seconds_until_expiry_at(token: Option<&str>, now_ms: u64) -> u64 {
    match token.and_then(expiry_millis) {
        Some(exp_ms) => ((exp_ms - now_ms as f64).max(0.0) / 1000.0).floor() as u64,
        None => 0,
    }
}

/// Whether the token is still valid but close enough to expiry to refresh now.
pub fn should_proactively_refresh(token: Option<&str>) -> bool {
    should_proactively_refresh_at(token, now_millis())
}

pub fn should_proactively_refresh_at(token: Option<&str>, now_ms: u64) -> bool {
    let left = seconds_until_expiry_at(token, now_ms);
    left > 0 && left < PROACTIVE_REFRESH_WINDOW_SECS
}
