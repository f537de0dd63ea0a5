#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use jsonwebtoken::{EncodingKey, Header};
use mentor_session::auth::{MemoryCookieStore, Navigator};
use mentor_session::{ClientConfig, Session, TokenPair};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::watch;
use url::Url;

pub const SECRET: &[u8] = b"test-jwt-secret";
pub const USERNAME: &str = "mentor";
pub const PASSWORD: &str = "secret";
pub const LOGIN_PATH: &str = "/auth/login";

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize, Deserialize)]
struct TestClaims {
    sub: String,
    exp: i64,
    /// Makes every minted token unique
    n: u64,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Mint a signed token expiring `exp_offset_secs` from now (negative for expired).
pub fn mint_token(exp_offset_secs: i64) -> String {
    let claims = TestClaims {
        sub: "1".to_string(),
        exp: unix_now() + exp_offset_secs,
        n: TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed),
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .expect("Failed to mint token")
}

fn token_is_valid(token: &str) -> bool {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.leeway = 0;
    jsonwebtoken::decode::<TestClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(SECRET),
        &validation,
    )
    .is_ok()
}

/// How the mock answers refresh requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Rotate,
    Reject,
    Malformed,
    /// Valid tokens with a user object that does not match the profile shape
    UnreadableProfile,
}

#[derive(Debug, Clone, Default)]
struct Profile {
    full_name: String,
    about: Option<String>,
    image: Option<String>,
}

pub struct MockState {
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    refresh_mode: Mutex<RefreshMode>,
    refresh_gate: watch::Sender<bool>,
    /// Lifetime of issued access tokens in seconds
    access_ttl: Mutex<i64>,
    login_returns_user: Mutex<bool>,
    last_issued: Mutex<Option<TokenPair>>,
    last_refresh_token_seen: Mutex<Option<String>>,
    profile: Mutex<Profile>,
}

impl MockState {
    fn issue_pair(&self) -> TokenPair {
        let pair = TokenPair::new(
            mint_token(*self.access_ttl.lock().unwrap()),
            mint_token(30 * 24 * 60 * 60),
        );
        *self.last_issued.lock().unwrap() = Some(pair.clone());
        pair
    }

    fn user_json(&self) -> Value {
        let profile = self.profile.lock().unwrap().clone();
        json!({
            "id": 1,
            "username": USERNAME,
            "image": profile.image,
            "info": {
                "id": 10,
                "fullName": profile.full_name,
                "gender": "FEMALE",
                "email": "mentor@example.com",
                "dateOfBirth": "1990-01-01",
                "country": {"id": 1, "name": "Uzbekistan"},
                "faculty": null,
                "university": null
            },
            "about": profile.about,
            "pricing": {"meetingHourPrice": 20.0},
            "joinedAt": "2024-01-01T00:00:00Z"
        })
    }

    fn auth_body(&self, include_user: bool) -> Value {
        let pair = self.issue_pair();
        let mut body = json!({
            "accessToken": pair.access_token,
            "refreshToken": pair.refresh_token,
        });
        if include_user {
            body["user"] = self.user_json();
        }
        body
    }
}

pub struct MockApi {
    pub base: Url,
    pub state: Arc<MockState>,
    server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

impl MockApi {
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.state.profile_calls.load(Ordering::SeqCst)
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    /// Hold refresh requests until the gate is opened again.
    pub fn hold_refreshes(&self) {
        self.state.refresh_gate.send_replace(false);
    }

    pub fn release_refreshes(&self) {
        self.state.refresh_gate.send_replace(true);
    }

    pub fn set_access_ttl(&self, secs: i64) {
        *self.state.access_ttl.lock().unwrap() = secs;
    }

    pub fn set_login_returns_user(&self, value: bool) {
        *self.state.login_returns_user.lock().unwrap() = value;
    }

    pub fn last_issued(&self) -> Option<TokenPair> {
        self.state.last_issued.lock().unwrap().clone()
    }

    pub fn last_refresh_token_seen(&self) -> Option<String> {
        self.state.last_refresh_token_seen.lock().unwrap().clone()
    }

    pub fn about(&self) -> Option<String> {
        self.state.profile.lock().unwrap().about.clone()
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn authorized(headers: &HeaderMap) -> bool {
    bearer(headers).is_some_and(token_is_valid)
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<LoginBody>) -> Response {
    if body.username != USERNAME || body.password != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let include_user = *state.login_returns_user.lock().unwrap();
    Json(state.auth_body(include_user)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    username: String,
    password: String,
    password_confirm: String,
    full_name: Option<String>,
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<RegisterBody>) -> Response {
    if body.username == "taken" {
        return error(StatusCode::CONFLICT, "Username already taken");
    }
    if body.password != body.password_confirm {
        return StatusCode::BAD_REQUEST.into_response();
    }
    if let Some(name) = body.full_name {
        state.profile.lock().unwrap().full_name = name;
    }
    Json(state.auth_body(false)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<RefreshBody>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_refresh_token_seen.lock().unwrap() = Some(body.refresh_token.clone());

    let mut gate = state.refresh_gate.subscribe();
    let _ = gate.wait_for(|open| *open).await;

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Rotate if token_is_valid(&body.refresh_token) => {
            Json(state.auth_body(true)).into_response()
        }
        RefreshMode::Rotate | RefreshMode::Reject => {
            error(StatusCode::UNAUTHORIZED, "Refresh token expired")
        }
        RefreshMode::Malformed => (StatusCode::OK, "<html>gateway</html>").into_response(),
        RefreshMode::UnreadableProfile => {
            let mut body = state.auth_body(false);
            body["user"] = json!({ "id": 1, "username": null });
            Json(body).into_response()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody {
    username: String,
    new_password: String,
    confirm_password: String,
}

async fn reset_password(Json(body): Json<ResetBody>) -> Response {
    if body.username != USERNAME {
        return StatusCode::NOT_FOUND.into_response();
    }
    if body.new_password != body.confirm_password {
        return error(StatusCode::BAD_REQUEST, "Passwords do not match");
    }
    StatusCode::OK.into_response()
}

async fn get_profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    Json(state.user_json()).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    full_name: Option<String>,
}

async fn put_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    if let Some(name) = body.full_name {
        state.profile.lock().unwrap().full_name = name;
    }
    StatusCode::OK.into_response()
}

async fn patch_image(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    state.profile.lock().unwrap().image = body["image"].as_str().map(str::to_string);
    StatusCode::OK.into_response()
}

async fn patch_about(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let about = body["about"].as_str().unwrap_or_default();
    if about.len() > 500 {
        return error(StatusCode::BAD_REQUEST, "Description is too long");
    }
    state.profile.lock().unwrap().about = Some(about.to_string());
    StatusCode::OK.into_response()
}

async fn upload(mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.unwrap_or_default();
            if bytes.is_empty() {
                return error(StatusCode::BAD_REQUEST, "Empty file");
            }
            return Json(json!({ "filePath": format!("/uploads/{}", name) })).into_response();
        }
    }
    error(StatusCode::BAD_REQUEST, "No file")
}

/// Start the mock API on a random port.
pub async fn start_mock_api() -> MockApi {
    let (refresh_gate, _) = watch::channel(true);
    let state = Arc::new(MockState {
        refresh_calls: AtomicUsize::new(0),
        profile_calls: AtomicUsize::new(0),
        refresh_mode: Mutex::new(RefreshMode::Rotate),
        refresh_gate,
        access_ttl: Mutex::new(15 * 60),
        login_returns_user: Mutex::new(true),
        last_issued: Mutex::new(None),
        last_refresh_token_seen: Mutex::new(None),
        profile: Mutex::new(Profile {
            full_name: "Jane Doe".to_string(),
            ..Default::default()
        }),
    });

    let app = Router::new()
        .route("/api/v1/mentor/auth/login", post(login))
        .route("/api/v1/mentor/auth/register", post(register))
        .route("/api/v1/mentor/auth/refresh", post(refresh))
        .route("/api/v1/mentor/auth/reset-password", post(reset_password))
        .route("/api/v1/mentor/profile", get(get_profile).put(put_profile))
        .route("/api/v1/mentor/profile/updateImage", patch(patch_image))
        .route("/api/v1/mentor/profile/updateAbout", patch(patch_about))
        .route("/api/v1/common/files/upload", post(upload))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local address");
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    MockApi {
        base: Url::parse(&format!("http://{}", addr)).expect("Invalid URL"),
        state,
        server_handle,
    }
}

/// Navigator that records every redirect.
#[derive(Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.lock().unwrap().push(path.to_string());
    }
}

pub struct TestContext {
    pub api: MockApi,
    pub session: Session,
    pub navigator: Arc<RecordingNavigator>,
}

pub async fn setup() -> TestContext {
    let api = start_mock_api().await;
    let navigator = Arc::new(RecordingNavigator::default());
    let session = session_for(&api.base, navigator.clone());
    TestContext {
        api,
        session,
        navigator,
    }
}

pub fn session_for(base: &Url, navigator: Arc<RecordingNavigator>) -> Session {
    Session::with_cookies(
        &ClientConfig::new(base.clone()),
        Arc::new(MemoryCookieStore::new()),
        navigator,
    )
    .expect("Failed to build session")
}

/// Setup with a signed-in session: fresh access token, valid refresh token.
pub async fn setup_logged_in() -> TestContext {
    let ctx = setup().await;
    ctx.session
        .login(USERNAME, PASSWORD)
        .await
        .expect("Login failed");
    ctx
}

/// Store tokens directly, bypassing login.
pub fn store_tokens(session: &Session, access: Option<String>, refresh: Option<String>) {
    session.coordinator().store().set(TokenPair {
        access_token: access,
        refresh_token: refresh,
    });
}
