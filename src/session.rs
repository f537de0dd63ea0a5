//! The session facade used by the rest of the client.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{
    ABOUT_UPDATE_FAILED, AuthError, CachedProfile, CookieStore, Credentials, FileCookieStore,
    IMAGE_UPLOAD_FAILED, LOGIN_FAILED, MemoryCookieStore, Navigation, Navigator,
    PROFILE_UPDATE_FAILED, PasswordReset, ProfileCache, ProfileUpdate, REGISTER_FAILED,
    RESET_FAILED, RefreshCoordinator, RegisterForm, ResponseInterceptor, SessionGuard, StoreError,
    TokenPair, TokenStore, User,
};
use crate::config::{ClientConfig, WatcherConfig};
use crate::jwt;
use crate::watcher::{ActivityWatcher, WatcherHandle};

#[derive(Debug, thiserror::Error)]
pub enum SessionInitError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] ApiError),
}

/// One signed-in (or signed-out) client.
///
/// Construct it once and share it: every component inside uses the same
/// refresh coordinator.
pub struct Session {
    api: ApiClient,
    coordinator: Arc<RefreshCoordinator>,
    guard: SessionGuard,
    interceptor: ResponseInterceptor,
    watcher_config: WatcherConfig,
    profile_max_age: Duration,
}

impl Session {
    /// Open a session using the cookie file from `config`, or memory when unset.
    pub fn open(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, SessionInitError> {
        let cookies: Arc<dyn CookieStore> = match &config.cookie_file {
            Some(path) => {
                let store = FileCookieStore::open(path)?;
                debug!(path = %path.display(), "Cookie file opened");
                Arc::new(store)
            }
            None => Arc::new(MemoryCookieStore::new()),
        };
        Self::with_cookies(config, cookies, navigator)
    }

    pub fn with_cookies(
        config: &ClientConfig,
        cookies: Arc<dyn CookieStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, SessionInitError> {
        let api = ApiClient::new(config.api_base.clone(), config.http_timeout)?;
        let store = TokenStore::new(
            cookies,
            config.access_cookie_max_age,
            config.refresh_cookie_max_age,
        );
        let coordinator = RefreshCoordinator::new(
            store,
            ProfileCache::new(),
            Arc::new(api.clone()),
            navigator,
            config.login_path.clone(),
        );

        Ok(Self {
            guard: SessionGuard::new(coordinator.clone(), config.public_paths.clone()),
            interceptor: ResponseInterceptor::new(coordinator.clone()),
            api,
            coordinator,
            watcher_config: config.watcher,
            profile_max_age: config.profile_max_age,
        })
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn interceptor(&self) -> &ResponseInterceptor {
        &self.interceptor
    }

    pub fn tokens(&self) -> TokenPair {
        self.coordinator.store().get()
    }

    /// Cached profile for display.
    pub fn user(&self) -> Option<User> {
        self.coordinator.profile().user()
    }

    pub fn subscribe_tokens(&self) -> watch::Receiver<TokenPair> {
        self.coordinator.store().subscribe()
    }

    pub fn subscribe_user(&self) -> watch::Receiver<Option<CachedProfile>> {
        self.coordinator.profile().subscribe()
    }

    /// Check a navigation against the session guard.
    pub async fn navigate(&self, path: &str) -> Navigation {
        self.guard.check(path).await
    }

    /// Start proactive refresh for as long as the returned handle lives.
    pub fn watch_activity(&self) -> WatcherHandle {
        ActivityWatcher::new(self.coordinator.clone(), self.watcher_config).start()
    }

    /// Load the profile at startup when a session is already stored.
    ///
    /// A cached profile that is still fresh is returned without a request.
    pub async fn hydrate(&self) -> Option<User> {
        if self.coordinator.store().access_token().is_none() {
            return None;
        }
        let profile = self.coordinator.profile();
        if !profile.is_stale(self.profile_max_age) {
            debug!("Cached profile is fresh, skipping fetch");
            return profile.user();
        }
        self.fetch_user().await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .api
            .login(&credentials)
            .await
            .map_err(|e| AuthError::new(e, LOGIN_FAILED))?;

        info!(username = %username, "Logged in");
        self.start_session(response.token_pair(), response.user).await;
        Ok(())
    }

    pub async fn register(&self, form: &RegisterForm) -> Result<(), AuthError> {
        let response = self
            .api
            .register(form)
            .await
            .map_err(|e| AuthError::new(e, REGISTER_FAILED))?;

        info!(username = %form.username, "Registered");
        self.start_session(response.token_pair(), response.user).await;
        Ok(())
    }

    async fn start_session(&self, tokens: TokenPair, user: Option<User>) {
        self.coordinator.store().set(tokens);
        match user {
            Some(user) => self.coordinator.profile().replace(user),
            None => {
                self.fetch_user().await;
            }
        }
    }

    pub async fn refresh(&self) -> bool {
        self.coordinator.refresh().await
    }

    pub fn logout(&self) {
        self.coordinator.logout();
    }

    /// Fetch and cache the profile, refreshing first if the access token expired.
    ///
    /// Returns `None` when no session can be established or the call fails.
    pub async fn fetch_user(&self) -> Option<User> {
        let store = self.coordinator.store();

        if jwt::is_expired(store.access_token().as_deref()) {
            info!("Access token expired, refreshing before profile fetch");
            if !self.coordinator.refresh().await {
                return None;
            }
        }

        let Some(access_token) = store.access_token() else {
            debug!("No access token available");
            return None;
        };

        match self.intercept(self.api.profile(&access_token).await).await {
            Ok(user) => {
                self.coordinator.profile().replace(user.clone());
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch profile");
                None
            }
        }
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), AuthError> {
        let access_token = self.require_access_token()?;
        self.intercept(self.api.update_profile(&access_token, update).await)
            .await
            .map_err(|e| AuthError::new(e, PROFILE_UPDATE_FAILED))?;

        self.fetch_user().await;
        Ok(())
    }

    /// Upload a new profile photo and point the profile at it.
    pub async fn update_profile_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<(), AuthError> {
        let access_token = self.require_access_token()?;
        let image_path = self
            .intercept(self.api.upload_file(bytes, file_name).await)
            .await
            .map_err(|e| AuthError::new(e, IMAGE_UPLOAD_FAILED))?;

        self.intercept(self.api.update_profile_image(&access_token, &image_path).await)
            .await
            .map_err(|e| AuthError::new(e, IMAGE_UPLOAD_FAILED))?;

        self.fetch_user().await;
        Ok(())
    }

    pub async fn update_about(&self, about: &str) -> Result<(), AuthError> {
        let access_token = self.require_access_token()?;
        self.intercept(self.api.update_about(&access_token, about).await)
            .await
            .map_err(|e| AuthError::new(e, ABOUT_UPDATE_FAILED))?;

        self.fetch_user().await;
        Ok(())
    }

    pub async fn reset_password(
        &self,
        username: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        let reset = PasswordReset {
            username: username.to_string(),
            new_password: new_password.to_string(),
            confirm_password: confirm_password.to_string(),
        };
        self.api
            .reset_password(&reset)
            .await
            .map_err(|e| AuthError::new(e, RESET_FAILED))
    }

    fn require_access_token(&self) -> Result<String, AuthError> {
        self.coordinator
            .store()
            .access_token()
            .ok_or_else(AuthError::unauthenticated)
    }

    /// Pass a response outcome through the interceptor before handing it back.
    async fn intercept<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(ApiError::AuthRejected { status, .. }) = &result {
            self.interceptor.observe(*status).await;
        }
        result
    }
}
