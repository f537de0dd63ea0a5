//! Background proactive refresh while the user is active.
//!
//! Every tick the watcher refreshes the access token if it is about to expire,
//! but only when both tokens are stored and the user interacted recently.
//! Abandoned clients therefore stop generating refresh traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::auth::RefreshCoordinator;
use crate::config::WatcherConfig;
use crate::jwt;

/// Interaction classes that count as user activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Pointer,
    Key,
    Scroll,
    Touch,
}

/// Result of a single watcher check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// One of the tokens is missing.
    NoTokens,
    /// No interaction inside the inactivity window.
    Inactive,
    /// The access token is not close enough to expiry.
    NotDue,
    Refreshed,
    RefreshFailed,
}

struct WatcherInner {
    coordinator: Arc<RefreshCoordinator>,
    config: WatcherConfig,
    last_activity: Mutex<Instant>,
    released: AtomicBool,
}

/// Watches user activity and keeps the access token fresh.
///
/// Creating the watcher counts as activity: it is set up when the user opens
/// the client.
#[derive(Clone)]
pub struct ActivityWatcher {
    inner: Arc<WatcherInner>,
}

impl ActivityWatcher {
    pub fn new(coordinator: Arc<RefreshCoordinator>, config: WatcherConfig) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                coordinator,
                config,
                last_activity: Mutex::new(Instant::now()),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Register an interaction.
    pub fn record(&self, kind: ActivityKind) {
        trace!(kind = ?kind, "User activity");
        *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Handle for event sources. It stops recording once the watcher is torn down.
    pub fn listener(&self) -> ActivityListener {
        ActivityListener {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run one check, refreshing if the token is due and the user is active.
    pub async fn check(&self) -> WatchOutcome {
        let tokens = self.inner.coordinator.store().get();
        let (Some(access_token), Some(_)) = (tokens.access_token, tokens.refresh_token) else {
            return WatchOutcome::NoTokens;
        };

        let idle = self.idle_for();
        if idle > self.inner.config.inactivity_window {
            debug!(idle_secs = idle.as_secs(), "User inactive, skipping proactive refresh");
            return WatchOutcome::Inactive;
        }

        if !jwt::should_proactively_refresh(Some(&access_token)) {
            return WatchOutcome::NotDue;
        }

        info!(
            expires_in_secs = jwt::seconds_until_expiry(Some(&access_token)),
            "Access token about to expire, refreshing"
        );
        if self.inner.coordinator.refresh().await {
            WatchOutcome::Refreshed
        } else {
            WatchOutcome::RefreshFailed
        }
    }

    /// Spawn the periodic check. Dropping the handle stops it.
    pub fn start(&self) -> WatcherHandle {
        let watcher = self.clone();
        let period = self.inner.config.interval;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let outcome = watcher.check().await;
                trace!(outcome = ?outcome, "Activity watcher tick");
            }
        });

        WatcherHandle {
            watcher: self.clone(),
            task,
        }
    }
}

/// Running watcher. Dropping it stops the timer and releases the listeners.
pub struct WatcherHandle {
    watcher: ActivityWatcher,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn watcher(&self) -> &ActivityWatcher {
        &self.watcher
    }

    pub fn listener(&self) -> ActivityListener {
        self.watcher.listener()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.watcher.inner.released.store(true, Ordering::Release);
        self.task.abort();
        debug!("Activity watcher stopped");
    }
}

/// Event-source side of the watcher.
#[derive(Clone)]
pub struct ActivityListener {
    inner: Weak<WatcherInner>,
}

impl ActivityListener {
    /// Forward an interaction. Returns `false` once the watcher has been released.
    pub fn notify(&self, kind: ActivityKind) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        if inner.released.load(Ordering::Acquire) {
            return false;
        }
        ActivityWatcher { inner }.record(kind);
        true
    }
}
