//! HTTP client for the mentor auth and profile endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ApiError;
use crate::auth::TokenExchange;
use crate::auth::types::{
    AuthResponse, Credentials, PasswordReset, ProfileUpdate, RegisterForm, User,
};

pub const LOGIN_ENDPOINT: &str = "/api/v1/mentor/auth/login";
pub const REGISTER_ENDPOINT: &str = "/api/v1/mentor/auth/register";
pub const REFRESH_ENDPOINT: &str = "/api/v1/mentor/auth/refresh";
pub const RESET_PASSWORD_ENDPOINT: &str = "/api/v1/mentor/auth/reset-password";
pub const PROFILE_ENDPOINT: &str = "/api/v1/mentor/profile";
pub const PROFILE_IMAGE_ENDPOINT: &str = "/api/v1/mentor/profile/updateImage";
pub const PROFILE_ABOUT_ENDPOINT: &str = "/api/v1/mentor/profile/updateAbout";
pub const UPLOAD_ENDPOINT: &str = "/api/v1/common/files/upload";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::NetworkFailure)?;
        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ApiError::MalformedResponse(format!("invalid endpoint {path}: {e}")))?;
        debug!(method = %method, url = %url, "API request");
        Ok(self.http.request(method, url))
    }

    /// Send a request and fail on any non-success status.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await.map_err(ApiError::NetworkFailure)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        let request = self.request(Method::POST, LOGIN_ENDPOINT)?.json(credentials);
        self.send_json(request).await
    }

    pub async fn register(&self, form: &RegisterForm) -> Result<AuthResponse, ApiError> {
        let request = self.request(Method::POST, REGISTER_ENDPOINT)?.json(form);
        self.send_json(request).await
    }

    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<AuthResponse, ApiError> {
        let request = self
            .request(Method::POST, REFRESH_ENDPOINT)?
            .json(&json!({ "refreshToken": refresh_token }));
        self.send_json(request).await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<(), ApiError> {
        let request = self.request(Method::POST, RESET_PASSWORD_ENDPOINT)?.json(reset);
        self.send(request).await.map(|_| ())
    }

    pub async fn profile(&self, access_token: &str) -> Result<User, ApiError> {
        let request = self
            .request(Method::GET, PROFILE_ENDPOINT)?
            .bearer_auth(access_token);
        self.send_json(request).await
    }

    pub async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::PUT, PROFILE_ENDPOINT)?
            .bearer_auth(access_token)
            .json(update);
        self.send(request).await.map(|_| ())
    }

    pub async fn update_profile_image(
        &self,
        access_token: &str,
        image_path: &str,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::PATCH, PROFILE_IMAGE_ENDPOINT)?
            .bearer_auth(access_token)
            .json(&json!({ "image": image_path }));
        self.send(request).await.map(|_| ())
    }

    pub async fn update_about(&self, access_token: &str, about: &str) -> Result<(), ApiError> {
        let request = self
            .request(Method::PATCH, PROFILE_ABOUT_ENDPOINT)?
            .bearer_auth(access_token)
            .json(&json!({ "about": about }));
        self.send(request).await.map(|_| ())
    }

    /// Upload a file and return the stored path reported by the API.
    pub async fn upload_file(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UploadResponse {
            file_path: Option<String>,
        }

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let request = self.request(Method::POST, UPLOAD_ENDPOINT)?.multipart(form);
        let uploaded: UploadResponse = self.send_json(request).await?;

        uploaded
            .file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::MalformedResponse("upload response has no filePath".into()))
    }
}

#[async_trait]
impl TokenExchange for ApiClient {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, ApiError> {
        self.exchange_refresh_token(refresh_token).await
    }
}
