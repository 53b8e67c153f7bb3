// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle: login, sign-up, logout and the current account.

use crate::error::{ClientError, Result};
use crate::forms::{ChangePasswordForm, LoginForm, UserForm};
use crate::models::{User, UserUpdate};
use crate::routes::SessionState;
use crate::services::ApiClient;
use crate::token::{self, TokenClaims};

/// Snapshot of the local session for display.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub state: SessionState,
    pub user: Option<User>,
    pub access: Option<TokenClaims>,
    pub refresh: Option<TokenClaims>,
}

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Guard state derived from the stored session.
    pub fn session_state(&self) -> SessionState {
        if self.api.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.api.current_user()
    }

    /// Describe the stored session, decoding token claims where possible.
    pub fn session_info(&self) -> SessionInfo {
        let (access, refresh) = self.api.stored_tokens();
        let inspect = |raw: Option<String>, kind: &str| {
            raw.and_then(|t| match token::inspect(&t) {
                Ok(claims) => Some(claims),
                Err(e) => {
                    tracing::debug!(kind, error = %e, "Stored token is not a readable JWT");
                    None
                }
            })
        };

        SessionInfo {
            state: self.session_state(),
            user: self.current_user(),
            access: inspect(access, "access"),
            refresh: inspect(refresh, "refresh"),
        }
    }

    pub async fn login(&self, form: LoginForm) -> Result<User> {
        let credentials = form.into_credentials()?;
        let auth = self.api.login(&credentials).await?;
        Ok(auth.user)
    }

    pub async fn register(&self, form: UserForm) -> Result<User> {
        let data = form.into_registration()?;
        let auth = self.api.register(&data).await?;
        Ok(auth.user)
    }

    pub async fn logout(&self) {
        self.api.logout().await;
    }

    /// Fetch the profile from the server and refresh the cached copy.
    pub async fn load_profile(&self) -> Result<User> {
        self.require_session()?;
        let user = self.api.get_profile().await?;
        self.api.cache_user(&user)?;
        Ok(user)
    }

    pub async fn update_profile(&self, update: UserUpdate) -> Result<User> {
        self.require_session()?;
        if update.is_empty() {
            return Err(ClientError::Validation("Nothing to update".to_string()));
        }
        let user = self.api.update_profile(&update).await?;
        self.api.cache_user(&user)?;
        tracing::info!(user_id = user.id, "Profile updated");
        Ok(user)
    }

    /// Change the password; returns the server's confirmation text.
    pub async fn change_password(&self, form: ChangePasswordForm) -> Result<String> {
        self.require_session()?;
        let request = form.into_request()?;
        let response = self.api.change_password(&request).await?;
        Ok(response.message)
    }

    fn require_session(&self) -> Result<()> {
        if self.api.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }
}
