//! Bearer-token session lifecycle.
//!
//! Two tokens live in cookie storage: a short-lived access token sent with
//! every API call and a long-lived refresh token traded for a new pair when
//! the access token runs out. All refreshes funnel through one
//! [`RefreshCoordinator`], whether they are triggered by navigation, by a
//! `401` response, or by the background activity watcher.

pub mod cookie;
mod coordinator;
mod errors;
mod guard;
mod interceptor;
mod state;
mod store;
pub mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieStore, FileCookieStore, MemoryCookieStore, REFRESH_COOKIE_NAME,
    StoreError,
};
pub use coordinator::RefreshCoordinator;
pub use errors::AuthError;
pub(crate) use errors::{
    ABOUT_UPDATE_FAILED, IMAGE_UPLOAD_FAILED, LOGIN_FAILED, PROFILE_UPDATE_FAILED,
    REGISTER_FAILED, RESET_FAILED,
};
pub use guard::{GuardState, Navigation, SessionGuard};
pub use interceptor::{Intercepted, ResponseInterceptor};
pub use state::{LogNavigator, Navigator, TokenExchange};
pub use store::{CachedProfile, ProfileCache, TokenStore};
pub use types::{
    AuthResponse, Credentials, Gender, PasswordReset, ProfileUpdate, RegisterForm, TokenPair,
    User,
};
