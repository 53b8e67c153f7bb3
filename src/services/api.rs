// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REST API client for the report and user administration backend.
//!
//! Handles:
//! - Bearer authentication from the persisted session
//! - One refresh-and-retry when the access token is rejected (401)
//! - Error message extraction from API error bodies
//! - Report upload and download

use crate::config::Config;
use crate::error::{extract_error_message_from_bytes, ClientError, Result};
use crate::models::{
    AuthResponse, ChangePasswordRequest, LoginCredentials, MessageResponse, RefreshResponse,
    RegisterData, ReportFile, User, UserUpdate,
};
use crate::storage::{keys, TokenStore};
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// File name used when the user report response does not name itself.
pub const USER_REPORT_FILENAME: &str = "relatorio_usuarios.xlsx";

/// Multipart field carrying the spreadsheet.
const UPLOAD_FIELD: &str = "file";

/// Request body, kept in a form that can be rebuilt for the retry.
enum Payload {
    Empty,
    Json(serde_json::Value),
    Upload { filename: String, bytes: Vec<u8> },
}

impl Payload {
    fn json<T: Serialize>(body: &T) -> Result<Self> {
        serde_json::to_value(body)
            .map(Payload::Json)
            .map_err(|e| ClientError::Decode(format!("cannot encode request: {}", e)))
    }
}

/// API client bound to one backend and one session store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ─── Session ─────────────────────────────────────────────────────────────

    fn access_token(&self) -> Option<String> {
        self.store.get(keys::ACCESS_TOKEN)
    }

    fn stored_refresh_token(&self) -> Option<String> {
        self.store.get(keys::REFRESH_TOKEN)
    }

    /// Whether an access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// The user saved at login, if the stored copy is readable.
    pub fn current_user(&self) -> Option<User> {
        let raw = self.store.get(keys::USER)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable cached user");
                None
            }
        }
    }

    /// Replace the cached user (after a profile change).
    pub fn cache_user(&self, user: &User) -> Result<()> {
        let encoded =
            serde_json::to_string(user).map_err(|e| ClientError::Storage(e.to_string()))?;
        self.store.set(keys::USER, &encoded)
    }

    /// Access and refresh tokens as currently stored.
    pub fn stored_tokens(&self) -> (Option<String>, Option<String>) {
        (self.access_token(), self.stored_refresh_token())
    }

    fn save_session(&self, auth: &AuthResponse) -> Result<()> {
        self.store.set(keys::ACCESS_TOKEN, &auth.tokens.access)?;
        self.store.set(keys::REFRESH_TOKEN, &auth.tokens.refresh)?;
        self.cache_user(&auth.user)
    }

    fn clear_session(&self) {
        for key in keys::ALL {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "Failed to clear session entry");
            }
        }
    }

    // ─── Authentication ──────────────────────────────────────────────────────

    /// Log in and persist the returned session.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthResponse> {
        let response = self
            .send_anonymous(Method::POST, "/auth/login/", Payload::json(credentials)?)
            .await?;
        let auth: AuthResponse = decode_json(response).await?;
        self.save_session(&auth)?;
        tracing::info!(user_id = auth.user.id, "Logged in");
        Ok(auth)
    }

    /// Create an account and persist the returned session.
    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse> {
        let response = self
            .send_anonymous(Method::POST, "/auth/register/", Payload::json(data)?)
            .await?;
        let auth: AuthResponse = decode_json(response).await?;
        self.save_session(&auth)?;
        tracing::info!(user_id = auth.user.id, "Registered");
        Ok(auth)
    }

    /// Blacklist the refresh token server-side, then forget the session.
    ///
    /// The server call is best effort: the local session is cleared even when
    /// it fails. It is sent once, without the refresh-and-retry path.
    pub async fn logout(&self) {
        if let Some(refresh) = self.stored_refresh_token() {
            let payload = Payload::Json(serde_json::json!({ "refresh": refresh }));
            match self
                .execute(&Method::POST, "/auth/logout/", &payload, self.access_token())
                .await
            {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("Server-side logout succeeded");
                }
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "Server-side logout rejected");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Server-side logout failed");
                }
            }
        }

        self.clear_session();
        tracing::info!("Session cleared");
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns whether a new access token was stored. Never retries.
    pub async fn refresh_token(&self) -> bool {
        let Some(refresh) = self.stored_refresh_token() else {
            return false;
        };

        let url = self.url("/auth/token/refresh/");
        let response = match self
            .http
            .post(&url)
            .json(&serde_json::json!({ "refresh": refresh }))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::info!(status = %response.status(), "Refresh token rejected");
            return false;
        }

        let tokens: RefreshResponse = match response.json().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse token refresh response");
                return false;
            }
        };

        if let Err(e) = self.store.set(keys::ACCESS_TOKEN, &tokens.access) {
            tracing::warn!(error = %e, "Failed to store refreshed access token");
            return false;
        }
        if let Some(rotated) = tokens.refresh.as_deref() {
            if let Err(e) = self.store.set(keys::REFRESH_TOKEN, rotated) {
                tracing::warn!(error = %e, "Failed to store rotated refresh token");
            }
        }

        tracing::info!("Access token refreshed");
        true
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    pub async fn get_profile(&self) -> Result<User> {
        self.request_json(Method::GET, "/profile/", Payload::Empty).await
    }

    pub async fn update_profile(&self, update: &UserUpdate) -> Result<User> {
        self.request_json(Method::PATCH, "/profile/update/", Payload::json(update)?)
            .await
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse> {
        self.request_json(
            Method::POST,
            "/profile/change-password/",
            Payload::json(request)?,
        )
        .await
    }

    // ─── Users ───────────────────────────────────────────────────────────────

    pub async fn get_users(&self) -> Result<Vec<User>> {
        self.request_json(Method::GET, "/users/", Payload::Empty).await
    }

    pub async fn get_user(&self, id: u64) -> Result<User> {
        self.request_json(Method::GET, &format!("/users/{}/", id), Payload::Empty)
            .await
    }

    pub async fn create_user(&self, data: &RegisterData) -> Result<User> {
        self.request_json(Method::POST, "/users/", Payload::json(data)?)
            .await
    }

    pub async fn update_user(&self, id: u64, update: &UserUpdate) -> Result<User> {
        self.request_json(Method::PATCH, &format!("/users/{}/", id), Payload::json(update)?)
            .await
    }

    /// Delete (deactivate) a user. The response body is ignored.
    pub async fn delete_user(&self, id: u64) -> Result<()> {
        self.send_authorized(Method::DELETE, &format!("/users/{}/", id), Payload::Empty)
            .await?;
        Ok(())
    }

    // ─── Reports ─────────────────────────────────────────────────────────────

    /// Download the spreadsheet listing all active users.
    pub async fn download_user_report(&self) -> Result<ReportFile> {
        let response = match self
            .send_authorized(Method::GET, "/reports/download-excel/", Payload::Empty)
            .await
        {
            Ok(r) => r,
            Err(ClientError::Api { message, .. }) => {
                return Err(ClientError::ReportDownload(message))
            }
            Err(e) => return Err(e),
        };
        read_file(response, USER_REPORT_FILENAME).await
    }

    /// Upload a spreadsheet and receive the generated report workbook.
    pub async fn generate_report(&self, filename: &str, bytes: Vec<u8>) -> Result<ReportFile> {
        let payload = Payload::Upload {
            filename: filename.to_string(),
            bytes,
        };
        let response = self
            .send_authorized(Method::POST, "/reports/report/", payload)
            .await?;
        read_file(response, &default_report_name(filename)).await
    }

    // ─── Request plumbing ────────────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<T> {
        let response = self.send_authorized(method, path, payload).await?;
        decode_json(response).await
    }

    /// Send one request with a bearer token.
    async fn execute(
        &self,
        method: &Method,
        path: &str,
        payload: &Payload,
        token: Option<String>,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request = match payload {
            Payload::Empty => request,
            Payload::Json(body) => request.json(body),
            Payload::Upload { filename, bytes } => {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(filename.clone());
                request.multipart(reqwest::multipart::Form::new().part(UPLOAD_FIELD, part))
            }
        };

        request.send().await
    }

    /// Send a request for an endpoint that needs no session.
    async fn send_anonymous(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<reqwest::Response> {
        let response = self.execute(&method, path, &payload, None).await?;
        check_status(response).await
    }

    /// Send an authenticated request.
    ///
    /// A 401 triggers at most one token refresh and at most one retry. If the
    /// refresh fails the session is cleared.
    async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<reqwest::Response> {
        let response = self
            .execute(&method, path, &payload, self.access_token())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        tracing::info!(%method, path, "Access token rejected, refreshing");

        if !self.refresh_token().await {
            self.logout().await;
            return Err(ClientError::SessionExpired);
        }

        let retry = self
            .execute(&method, path, &payload, self.access_token())
            .await?;

        if !retry.status().is_success() {
            tracing::warn!(%method, path, status = %retry.status(), "Retry after refresh failed");
            return Err(ClientError::AuthenticationFailed);
        }

        Ok(retry)
    }
}

/// Turn a non-2xx response into an API error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let message = extract_error_message_from_bytes(&body);
    tracing::debug!(status = %status, message = %message, "API request failed");

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ClientError::Decode(format!("JSON parse error: {}", e)))
}

async fn read_file(response: reqwest::Response, fallback_name: &str) -> Result<ReportFile> {
    let filename = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(attachment_filename)
        .unwrap_or_else(|| fallback_name.to_string());
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.bytes().await?.to_vec();

    Ok(ReportFile {
        filename,
        content_type,
        bytes,
    })
}

/// Extract a safe file name from a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987, UTF-8) wins over `filename`. Parameter names are
/// matched case-insensitively and quoted values may contain `;`.
pub fn attachment_filename(disposition: &str) -> Option<String> {
    let params = disposition_params(disposition);
    let lookup = |wanted: &str| {
        params
            .iter()
            .find(|(name, _)| name == wanted)
            .map(|(_, value)| value.as_str())
    };

    let raw = lookup("filename*")
        .and_then(decode_extended_value)
        .or_else(|| lookup("filename").map(str::to_string))?;

    // Never let the server pick a directory.
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

/// `name=value` parameters after the disposition type, names lowercased.
fn disposition_params(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let Some((_, mut rest)) = header.split_once(';') else {
        return params;
    };

    loop {
        rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
        let Some(split) = rest.find(['=', ';']) else {
            break;
        };
        if rest[split..].starts_with(';') {
            rest = &rest[split..];
            continue;
        }

        let name = rest[..split].trim().to_ascii_lowercase();
        rest = rest[split + 1..].trim_start();

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let mut value = String::new();
            let mut end = quoted.len();
            let mut chars = quoted.char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next().map(|(_, escaped)| escaped)),
                    '"' => {
                        end = i + 1;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            rest = &quoted[end..];
            value
        } else {
            let end = rest.find(';').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };

        params.push((name, value));
    }

    params
}

/// Decode `UTF-8'lang'percent-encoded` extended parameter values.
fn decode_extended_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("us-ascii") {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|decoded| decoded.into_owned())
}

fn default_report_name(upload_name: &str) -> String {
    let stem = upload_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(upload_name);
    format!("relatorio_{}.xlsx", stem)
}
