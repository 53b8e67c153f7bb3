// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process mock of the RelatórioIA REST API.
//!
//! Serves the auth, profile, users and report endpoints on an ephemeral
//! port. Only the most recently issued access token is accepted, so tests
//! can expire a session with [`MockState::expire_access`].

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use relatorio::config::Config;
use relatorio::models::User;
use relatorio::storage::{MemoryStore, TokenStore};
use relatorio::AppState;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const SIGNING_KEY: &[u8] = b"mock_backend_signing_key_32bytes";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-pass-123";

struct Account {
    user: User,
    password: String,
}

/// Shared state of the mock backend.
pub struct MockState {
    accounts: Mutex<Vec<Account>>,
    current_access: Mutex<Option<String>>,
    current_refresh: Mutex<Option<String>>,
    token_counter: AtomicU64,
    /// When false the refresh endpoint rejects every token
    pub refresh_enabled: AtomicBool,
    /// When true every access token is rejected, even fresh ones
    pub reject_all_access: AtomicBool,
    /// When true the refresh endpoint also issues a new refresh token
    pub rotate_refresh: AtomicBool,
    /// When true the user spreadsheet download answers 500
    pub fail_user_report: AtomicBool,
    /// "METHOD /path" of every request, in arrival order
    pub log: Mutex<Vec<String>>,
    /// Refresh tokens sent to the logout endpoint
    pub blacklisted: Mutex<Vec<String>>,
    /// (field name, file name, size) of report uploads
    pub uploads: Mutex<Vec<(String, String, usize)>>,
}

impl MockState {
    fn new() -> Self {
        let admin = Account {
            user: User {
                id: 1,
                email: ADMIN_EMAIL.to_string(),
                username: "admin".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Admin".to_string(),
                date_joined: chrono::Utc::now(),
                is_active: true,
            },
            password: ADMIN_PASSWORD.to_string(),
        };

        Self {
            accounts: Mutex::new(vec![admin]),
            current_access: Mutex::new(None),
            current_refresh: Mutex::new(None),
            token_counter: AtomicU64::new(0),
            refresh_enabled: AtomicBool::new(true),
            reject_all_access: AtomicBool::new(false),
            rotate_refresh: AtomicBool::new(false),
            fail_user_report: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
            blacklisted: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// Invalidate the access token held by the client.
    pub fn expire_access(&self) {
        *self.current_access.lock().unwrap() = None;
    }

    /// Number of logged requests equal to `entry` (e.g. `"GET /api/users/"`).
    pub fn hits(&self, entry: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn add_user(&self, first: &str, last: &str, email: &str, username: &str) -> u64 {
        let mut accounts = self.accounts.lock().unwrap();
        let id = accounts.iter().map(|a| a.user.id).max().unwrap_or(0) + 1;
        accounts.push(Account {
            user: User {
                id,
                email: email.to_string(),
                username: username.to_string(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                date_joined: chrono::Utc::now(),
                is_active: true,
            },
            password: "initial-pass-1".to_string(),
        });
        id
    }

    pub fn user(&self, id: u64) -> Option<User> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone())
    }

    /// Refresh token the backend currently accepts.
    pub fn current_refresh(&self) -> Option<String> {
        self.current_refresh.lock().unwrap().clone()
    }

    pub fn password_of(&self, id: u64) -> Option<String> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.user.id == id)
            .map(|a| a.password.clone())
    }

    fn mint(&self, user_id: u64, token_type: &str, lifetime: Duration) -> String {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let claims = json!({
            "token_type": token_type,
            "user_id": user_id,
            "iat": now,
            "exp": now + lifetime.as_secs(),
            "jti": self.token_counter.fetch_add(1, Ordering::SeqCst),
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SIGNING_KEY),
        )
        .unwrap()
    }

    fn issue_tokens(&self, user_id: u64) -> Value {
        let access = self.mint(user_id, "access", Duration::from_secs(300));
        let refresh = self.mint(user_id, "refresh", Duration::from_secs(86400));
        *self.current_access.lock().unwrap() = Some(access.clone());
        *self.current_refresh.lock().unwrap() = Some(refresh.clone());
        json!({ "access": access, "refresh": refresh })
    }

    /// Resolve the bearer token to the logged-in user id.
    fn authenticate(&self, headers: &HeaderMap) -> Result<u64, Response> {
        let unauthorized = || {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "detail": "Given token not valid for any token type",
                    "code": "token_not_valid"
                })),
            )
                .into_response()
        };

        if self.reject_all_access.load(Ordering::SeqCst) {
            return Err(unauthorized());
        }

        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;

        let current = self.current_access.lock().unwrap().clone();
        if current.as_deref() != Some(token) {
            return Err(unauthorized());
        }

        let claims = relatorio::token::inspect(token).map_err(|_| unauthorized())?;
        claims
            .subject()
            .and_then(|s| s.parse().ok())
            .ok_or_else(unauthorized)
    }
}

/// A running mock backend.
pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let app = router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
        }
    }

    /// Client state wired to this backend with an in-memory session.
    pub fn client(&self) -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = Config {
            api_base_url: self.base_url.clone(),
            ..Config::test_default()
        };
        let app = AppState::new(config, store.clone() as Arc<dyn TokenStore>).unwrap();
        (app, store)
    }

    /// Client state already logged in as the admin.
    pub async fn logged_in_client(&self) -> (AppState, Arc<MemoryStore>) {
        let (app, store) = self.client();
        app.auth
            .login(relatorio::forms::LoginForm {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            })
            .await
            .expect("admin login should succeed");
        (app, store)
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/logout/", post(logout))
        .route("/api/auth/token/refresh/", post(refresh))
        .route("/api/profile/", get(profile))
        .route("/api/profile/update/", axum::routing::patch(update_profile))
        .route("/api/profile/change-password/", post(change_password))
        .route("/api/users/", get(list_users).post(create_user))
        .route(
            "/api/users/{id}/",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/api/reports/download-excel/", get(download_excel))
        .route("/api/reports/report/", post(generate_report))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    state
        .log
        .lock()
        .unwrap()
        .push(format!("{} {}", request.method(), request.uri().path()));
    next.run(request).await
}

fn bad_request(body: Value) -> Response {
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let user = {
        let accounts = state.accounts.lock().unwrap();
        accounts
            .iter()
            .find(|a| a.user.email == email && a.password == password && a.user.is_active)
            .map(|a| a.user.clone())
    };

    match user {
        Some(user) => {
            let tokens = state.issue_tokens(user.id);
            Json(json!({ "user": user, "tokens": tokens })).into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials or disabled account." })),
        )
            .into_response(),
    }
}

/// Shared create logic of register and `POST /users/`.
fn create_account(state: &MockState, body: &Value) -> Result<User, Response> {
    let field = |name: &str| body[name].as_str().unwrap_or_default().to_string();
    let email = field("email");
    let password = field("password");

    if password.len() < 8 {
        return Err(bad_request(
            json!({ "password": ["Ensure this field has at least 8 characters."] }),
        ));
    }
    if password != field("password_confirm") {
        return Err(bad_request(json!({ "password": ["Passwords do not match."] })));
    }

    let mut accounts = state.accounts.lock().unwrap();
    if accounts.iter().any(|a| a.user.email == email) {
        return Err(bad_request(
            json!({ "email": ["This email is already in use."] }),
        ));
    }

    let id = accounts.iter().map(|a| a.user.id).max().unwrap_or(0) + 1;
    let user = User {
        id,
        email,
        username: field("username"),
        first_name: field("first_name"),
        last_name: field("last_name"),
        date_joined: chrono::Utc::now(),
        is_active: true,
    };
    accounts.push(Account {
        user: user.clone(),
        password,
    });
    Ok(user)
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    match create_account(&state, &body) {
        Ok(user) => {
            let tokens = state.issue_tokens(user.id);
            (
                StatusCode::CREATED,
                Json(json!({ "user": user, "tokens": tokens })),
            )
                .into_response()
        }
        Err(response) => response,
    }
}

async fn logout(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match body["refresh"].as_str() {
        Some(refresh) => {
            state.blacklisted.lock().unwrap().push(refresh.to_string());
            *state.current_refresh.lock().unwrap() = None;
            Json(json!({ "message": "Logged out." })).into_response()
        }
        None => bad_request(json!({ "error": "Invalid token." })),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let presented = body["refresh"].as_str().unwrap_or_default().to_string();
    let current = state.current_refresh.lock().unwrap().clone();

    if !state.refresh_enabled.load(Ordering::SeqCst)
        || current.as_deref() != Some(presented.as_str())
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        )
            .into_response();
    }

    let user_id = relatorio::token::inspect(&presented)
        .ok()
        .and_then(|c| c.subject())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let access = state.mint(user_id, "access", Duration::from_secs(300));
    *state.current_access.lock().unwrap() = Some(access.clone());

    if state.rotate_refresh.load(Ordering::SeqCst) {
        let rotated = state.mint(user_id, "refresh", Duration::from_secs(86400));
        *state.current_refresh.lock().unwrap() = Some(rotated.clone());
        return Json(json!({ "access": access, "refresh": rotated })).into_response();
    }
    Json(json!({ "access": access })).into_response()
}

async fn profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.authenticate(&headers) {
        Ok(id) => Json(state.user(id)).into_response(),
        Err(response) => response,
    }
}

fn apply_update(state: &MockState, id: u64, body: &Value) -> Result<User, Response> {
    let mut accounts = state.accounts.lock().unwrap();
    if let Some(email) = body["email"].as_str() {
        if accounts.iter().any(|a| a.user.email == email && a.user.id != id) {
            return Err(bad_request(
                json!({ "email": ["This email is already in use."] }),
            ));
        }
    }

    let account = accounts
        .iter_mut()
        .find(|a| a.user.id == id)
        .ok_or_else(|| {
            (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
        })?;

    let set = |target: &mut String, name: &str| {
        if let Some(value) = body[name].as_str() {
            *target = value.to_string();
        }
    };
    set(&mut account.user.email, "email");
    set(&mut account.user.username, "username");
    set(&mut account.user.first_name, "first_name");
    set(&mut account.user.last_name, "last_name");
    set(&mut account.password, "password");

    Ok(account.user.clone())
}

async fn update_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match apply_update(&state, id, &body) {
        Ok(user) => Json(user).into_response(),
        Err(response) => response,
    }
}

async fn change_password(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let id = match state.authenticate(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut accounts = state.accounts.lock().unwrap();
    let Some(account) = accounts.iter_mut().find(|a| a.user.id == id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if body["old_password"].as_str() != Some(account.password.as_str()) {
        return bad_request(json!({ "error": "Current password is incorrect." }));
    }
    account.password = body["new_password"].as_str().unwrap_or_default().to_string();
    Json(json!({ "message": "Password changed successfully." })).into_response()
}

async fn list_users(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    let users: Vec<User> = state
        .accounts
        .lock()
        .unwrap()
        .iter()
        .filter(|a| a.user.is_active)
        .map(|a| a.user.clone())
        .collect();
    Json(users).into_response()
}

async fn create_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match create_account(&state, &body) {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(response) => response,
    }
}

async fn get_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match state.user(id) {
        Some(user) => Json(user).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
    }
}

async fn update_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    match apply_update(&state, id, &body) {
        Ok(user) => Json(user).into_response(),
        Err(response) => response,
    }
}

async fn delete_user(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    let mut accounts = state.accounts.lock().unwrap();
    match accounts.iter_mut().find(|a| a.user.id == id) {
        Some(account) => {
            account.user.is_active = false;
            StatusCode::NO_CONTENT.into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
    }
}

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

async fn download_excel(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }
    if state.fail_user_report.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Error generating Excel: disk full" })),
        )
            .into_response();
    }
    (
        [
            (header::CONTENT_TYPE, XLSX_MIME),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"relatorio_usuarios.xlsx\"",
            ),
        ],
        b"PK\x03\x04users".to_vec(),
    )
        .into_response()
}

async fn generate_report(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(response) = state.authenticate(&headers) {
        return response;
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        state
            .uploads
            .lock()
            .unwrap()
            .push((name.clone(), file_name.clone(), bytes.len()));

        if name == "file" {
            let stem = file_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&file_name);
            let disposition = format!("attachment; filename=\"relatorio_{}_final.xlsx\"", stem);
            let mut body = b"PK\x03\x04report:".to_vec();
            body.extend_from_slice(&bytes);
            return (
                [
                    (header::CONTENT_TYPE, XLSX_MIME.to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response();
        }
    }

    bad_request(json!({ "error": "No file was sent. Use the \"file\" key." }))
}
