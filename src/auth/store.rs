//! Token and profile state shared by every session component.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, CookieStore, REFRESH_COOKIE_NAME};
use super::types::{TokenPair, User};

/// Current token pair, persisted in cookie storage.
///
/// Reads always go to the cookie store so client-side cookie expiry is
/// honored. Every write is published to subscribers.
#[derive(Clone)]
pub struct TokenStore {
    cookies: Arc<dyn CookieStore>,
    access_max_age: Duration,
    refresh_max_age: Duration,
    changes: Arc<watch::Sender<TokenPair>>,
}

impl TokenStore {
    pub fn new(
        cookies: Arc<dyn CookieStore>,
        access_max_age: Duration,
        refresh_max_age: Duration,
    ) -> Self {
        let initial = TokenPair {
            access_token: cookies.get(ACCESS_COOKIE_NAME),
            refresh_token: cookies.get(REFRESH_COOKIE_NAME),
        };
        let (changes, _) = watch::channel(initial);
        Self {
            cookies,
            access_max_age,
            refresh_max_age,
            changes: Arc::new(changes),
        }
    }

    pub fn get(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.cookies.get(ACCESS_COOKIE_NAME)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.cookies.get(REFRESH_COOKIE_NAME)
    }

    /// Replace both tokens. An absent half removes the stored one.
    pub fn set(&self, pair: TokenPair) {
        self.write(ACCESS_COOKIE_NAME, pair.access_token.as_deref(), self.access_max_age);
        self.write(REFRESH_COOKIE_NAME, pair.refresh_token.as_deref(), self.refresh_max_age);
        self.changes.send_replace(pair);
    }

    /// Remove both tokens. Returns whether anything was stored.
    pub fn clear(&self) -> bool {
        let had_tokens = !self.get().is_empty();
        if had_tokens {
            self.set(TokenPair::default());
        }
        had_tokens
    }

    /// Observe token writes.
    pub fn subscribe(&self) -> watch::Receiver<TokenPair> {
        self.changes.subscribe()
    }

    fn write(&self, name: &str, value: Option<&str>, max_age: Duration) {
        let result = match value {
            Some(value) => self.cookies.set(name, value, max_age),
            None => self.cookies.remove(name),
        };
        if let Err(e) = result {
            error!(cookie = name, error = %e, "Failed to persist token");
        }
    }
}

/// Cached user profile with the time it was fetched.
#[derive(Debug, Clone)]
pub struct CachedProfile {
    pub user: User,
    pub fetched_at: Instant,
}

impl CachedProfile {
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.fetched_at.elapsed() >= max_age
    }
}

/// Display-only copy of the signed-in user.
///
/// Never authoritative: it is replaced whenever the API returns a fresh
/// profile and dropped on logout.
#[derive(Clone)]
pub struct ProfileCache {
    current: Arc<watch::Sender<Option<CachedProfile>>>,
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileCache {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }

    pub fn get(&self) -> Option<CachedProfile> {
        self.current.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.current.borrow().as_ref().map(|p| p.user.clone())
    }

    /// Whether the profile is missing or older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.current
            .borrow()
            .as_ref()
            .is_none_or(|p| p.is_stale(max_age))
    }

    pub fn replace(&self, user: User) {
        self.current.send_replace(Some(CachedProfile {
            user,
            fetched_at: Instant::now(),
        }));
    }

    pub fn clear(&self) -> bool {
        self.current.send_replace(None).is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<CachedProfile>> {
        self.current.subscribe()
    }
}
