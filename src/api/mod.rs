//! Remote API access.

mod client;
mod error;

pub use client::{
    ApiClient, LOGIN_ENDPOINT, PROFILE_ABOUT_ENDPOINT, PROFILE_ENDPOINT, PROFILE_IMAGE_ENDPOINT,
    REFRESH_ENDPOINT, REGISTER_ENDPOINT, RESET_PASSWORD_ENDPOINT, UPLOAD_ENDPOINT,
};
pub use error::ApiError;
