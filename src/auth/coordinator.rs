//! Token refresh with de-duplication of concurrent callers.
//!
//! Every component that needs fresh tokens (navigation guard, response
//! interceptor, activity watcher, explicit callers) goes through one
//! [`RefreshCoordinator`]. At most one refresh exchange is outstanding at a
//! time; callers arriving while it runs await the same outcome.
//!
//! The exchange runs on its own task, so a caller that stops waiting does not
//! cancel it. There is no timeout beyond the HTTP client's own: a hung
//! exchange keeps every waiter pending until the transport gives up.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, warn};

use super::state::{Navigator, TokenExchange};
use super::store::{ProfileCache, TokenStore};
use super::types::AuthResponse;

type Outcome = Shared<BoxFuture<'static, bool>>;

/// The in-flight marker: one outstanding exchange and its shared outcome.
struct InFlight {
    id: u64,
    outcome: Outcome,
}

struct CoordinatorState {
    in_flight: Option<InFlight>,
    /// Bumped on every logout; an exchange started in an older epoch must not
    /// write tokens back.
    epoch: u64,
}

pub struct RefreshCoordinator {
    store: TokenStore,
    profile: ProfileCache,
    exchange: Arc<dyn TokenExchange>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    state: Mutex<CoordinatorState>,
    next_id: AtomicU64,
}

/// Clears the in-flight marker when an exchange task ends, panics included.
struct InFlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    id: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.coordinator.lock_state();
        if state.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            state.in_flight = None;
        }
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: TokenStore,
        profile: ProfileCache,
        exchange: Arc<dyn TokenExchange>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            profile,
            exchange,
            navigator,
            login_path: login_path.into(),
            state: Mutex::new(CoordinatorState {
                in_flight: None,
                epoch: 0,
            }),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn profile(&self) -> &ProfileCache {
        &self.profile
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether a refresh exchange is currently outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.lock_state().in_flight.is_some()
    }

    /// Refresh the token pair, joining an exchange already in flight.
    ///
    /// Returns `false` without a network call when no refresh token is stored.
    /// Any failure of the exchange ends the session before returning `false`.
    pub async fn refresh(self: &Arc<Self>) -> bool {
        match self.begin_refresh() {
            Some(outcome) => outcome.await,
            None => false,
        }
    }

    /// Check and set the in-flight marker under a single lock.
    fn begin_refresh(self: &Arc<Self>) -> Option<Outcome> {
        let mut state = self.lock_state();

        if let Some(in_flight) = &state.in_flight {
            debug!(refresh_id = in_flight.id, "Refresh already in progress, waiting");
            return Some(in_flight.outcome.clone());
        }

        let Some(refresh_token) = self.store.refresh_token() else {
            debug!("No refresh token available");
            return None;
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(refresh_id = id, "Refreshing tokens");

        let task = tokio::spawn(Arc::clone(self).run_exchange(id, state.epoch, refresh_token));
        let coordinator: Weak<Self> = Arc::downgrade(self);
        let outcome = async move {
            match task.await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    error!(refresh_id = id, error = %e, "Refresh task failed");
                    if let Some(coordinator) = coordinator.upgrade() {
                        coordinator.logout();
                    }
                    false
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        Some(outcome)
    }

    async fn run_exchange(self: Arc<Self>, id: u64, epoch: u64, refresh_token: String) -> bool {
        let _marker = InFlightGuard {
            coordinator: &self,
            id,
        };

        match self.exchange.refresh(&refresh_token).await {
            Ok(response) => self.apply_refresh(id, epoch, response),
            Err(e) => {
                warn!(refresh_id = id, error = %e, "Token refresh failed");
                self.logout();
                false
            }
        }
    }

    /// Rotate tokens from a successful exchange unless the session ended meanwhile.
    fn apply_refresh(&self, id: u64, epoch: u64, response: AuthResponse) -> bool {
        let state = self.lock_state();
        if state.epoch != epoch {
            warn!(refresh_id = id, "Session ended during refresh, discarding tokens");
            return false;
        }

        self.store.set(response.token_pair());
        if let Some(user) = response.user {
            self.profile.replace(user);
        }
        info!(refresh_id = id, "Tokens refreshed");
        true
    }

    /// End the session: drop tokens, cached profile and the in-flight marker.
    ///
    /// Redirects to the login path only when there was something to tear
    /// down, so a burst of failures yields a single redirect.
    pub fn logout(&self) {
        let had_session = {
            let mut state = self.lock_state();
            state.in_flight = None;
            state.epoch += 1;
            let had_tokens = self.store.clear();
            let had_profile = self.profile.clear();
            had_tokens || had_profile
        };

        if had_session {
            info!(login_path = %self.login_path, "Logging out");
            self.navigator.redirect(&self.login_path);
        } else {
            debug!("Logout requested with no active session");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
