//! Client configuration shared by the session components.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default API origin of the mentor service.
pub const DEFAULT_API_BASE: &str = "https://api.ivybek.com";

/// Login entry point used for every redirect.
pub const LOGIN_PATH: &str = "/auth/login";

/// Destinations reachable without a session.
pub const PUBLIC_PATHS: &[&str] = &["/auth/login", "/auth/register", "/auth/forgot"];

/// Access cookie lifetime: 7 days. The token's own `exp` decides validity.
pub const ACCESS_COOKIE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Refresh cookie lifetime: 30 days.
pub const REFRESH_COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Interval between activity watcher checks.
pub const WATCH_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Activity older than this stops proactive refreshes.
pub const INACTIVITY_WINDOW: Duration = Duration::from_secs(30 * 60);

/// A cached profile younger than this is reused by startup hydration.
pub const PROFILE_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Transport timeout for every API request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the remote API (e.g. "https://api.example.com")
    pub api_base: Url,
    /// Path redirected to when the session ends
    pub login_path: String,
    /// Paths the session guard never blocks
    pub public_paths: Vec<String>,
    /// Cookie file for persistent storage; in-memory when unset
    pub cookie_file: Option<PathBuf>,
    pub access_cookie_max_age: Duration,
    pub refresh_cookie_max_age: Duration,
    pub http_timeout: Duration,
    pub profile_max_age: Duration,
    pub watcher: WatcherConfig,
}

/// Timing of the background activity watcher.
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    pub interval: Duration,
    pub inactivity_window: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval: WATCH_INTERVAL,
            inactivity_window: INACTIVITY_WINDOW,
        }
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the API origin.
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            login_path: LOGIN_PATH.to_string(),
            public_paths: PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            cookie_file: None,
            access_cookie_max_age: ACCESS_COOKIE_MAX_AGE,
            refresh_cookie_max_age: REFRESH_COOKIE_MAX_AGE,
            http_timeout: HTTP_TIMEOUT,
            profile_max_age: PROFILE_MAX_AGE,
            watcher: WatcherConfig::default(),
        }
    }

    pub fn with_cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }
}
