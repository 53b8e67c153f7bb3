// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error types and API error-body decoding.

use serde_json::Value;

/// Fallback text when an error body carries no usable message.
pub const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// Errors surfaced by the API client and the services built on it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A form or upload failed a client-side check before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// The API answered with a non-2xx status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A 401 could not be recovered by refreshing; the local session was cleared.
    #[error("Session expired")]
    SessionExpired,

    /// The request was retried with a fresh token and still failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// An operation that needs a session was attempted without one.
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Could not download report: {0}")]
    ReportDownload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// True when the error means the user must log in again.
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            ClientError::SessionExpired
                | ClientError::AuthenticationFailed
                | ClientError::NotAuthenticated
        ) || matches!(self, ClientError::Api { status: 401, .. })
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Text suitable for a one-line error notice.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http(e) if e.is_timeout() => "The server took too long to respond".into(),
            ClientError::Http(e) if e.is_connect() => "Could not reach the server".into(),
            other => other.to_string(),
        }
    }
}

/// Pull the first human-readable message out of an API error body.
///
/// The backend reports field errors as `{"field": ["message", ...]}` and
/// general failures as `{"detail": "..."}` or `{"error": "..."}`. The first
/// key in server order wins.
pub fn extract_error_message(body: &Value) -> String {
    let Some(object) = body.as_object() else {
        return DEFAULT_ERROR_MESSAGE.to_string();
    };

    if let Some((_, first)) = object.iter().next() {
        match first {
            Value::Array(items) if !items.is_empty() => return value_text(&items[0]),
            Value::String(text) => return text.clone(),
            _ => {}
        }
    }

    for key in ["detail", "error"] {
        if let Some(Value::String(text)) = object.get(key) {
            return text.clone();
        }
    }

    DEFAULT_ERROR_MESSAGE.to_string()
}

/// Same as [`extract_error_message`] for a raw response body.
pub fn extract_error_message_from_bytes(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .map(|v| extract_error_message(&v))
        .unwrap_or_else(|_| DEFAULT_ERROR_MESSAGE.to_string())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
