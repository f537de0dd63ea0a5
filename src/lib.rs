pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod jwt;
pub mod session;
pub mod watcher;

pub use auth::{Navigation, Navigator, RefreshCoordinator, TokenPair, User};
pub use config::ClientConfig;
pub use session::{Session, SessionInitError};
pub use watcher::{ActivityKind, ActivityListener, ActivityWatcher, WatchOutcome, WatcherHandle};
