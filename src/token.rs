// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read-only inspection of the session's JWTs.
//!
//! The client never holds the signing key, so claims are decoded without
//! signature checks. They are only used for display, never to decide access.

use crate::error::ClientError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims issued by the backend's JWT layer.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    /// Expiration time (Unix timestamp)
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: Option<i64>,
    /// "access" or "refresh"
    #[serde(default)]
    pub token_type: Option<String>,
    /// Account id; numeric or string depending on the backend
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub sub: Option<String>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Tokens without an `exp` claim never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    /// Account id as text, from `user_id` or `sub`.
    pub fn subject(&self) -> Option<String> {
        match &self.user_id {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => self.sub.clone(),
        }
    }
}

/// Decode a JWT's claims without verifying its signature or expiry.
pub fn inspect(token: &str) -> Result<TokenClaims, ClientError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ClientError::Decode(format!("malformed token: {}", e)))
}
