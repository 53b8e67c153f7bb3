// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User administration: listing, search and create/edit/delete.

use crate::error::{ClientError, Result};
use crate::forms::UserForm;
use crate::models::User;
use crate::services::ApiClient;
use std::path::{Path, PathBuf};

pub const NO_USERS_FOUND: &str = "No users found";
pub const NO_USERS_REGISTERED: &str = "No users registered";

/// Users whose names, email or username contain `term`, ignoring case.
pub fn filter_users<'a>(users: &'a [User], term: &str) -> Vec<&'a User> {
    let needle = term.trim().to_lowercase();
    users.iter().filter(|u| u.matches(&needle)).collect()
}

/// Message for an empty listing; a search that matched nothing reads differently.
pub fn empty_notice(term: &str) -> &'static str {
    if term.trim().is_empty() {
        NO_USERS_REGISTERED
    } else {
        NO_USERS_FOUND
    }
}

#[derive(Clone)]
pub struct UserDirectory {
    api: ApiClient,
}

impl UserDirectory {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// All active users.
    pub async fn load(&self) -> Result<Vec<User>> {
        self.require_session()?;
        let users = self.api.get_users().await?;
        tracing::debug!(count = users.len(), "Users loaded");
        Ok(users)
    }

    /// Load and filter in one step.
    pub async fn search(&self, term: &str) -> Result<Vec<User>> {
        let users = self.load().await?;
        Ok(filter_users(&users, term).into_iter().cloned().collect())
    }

    pub async fn get(&self, id: u64) -> Result<User> {
        self.require_session()?;
        self.api.get_user(id).await
    }

    /// Create a user, or update `editing` when given.
    pub async fn submit(&self, form: UserForm, editing: Option<u64>) -> Result<User> {
        self.require_session()?;
        match editing {
            Some(id) => {
                let update = form.into_update()?;
                let user = self.api.update_user(id, &update).await?;
                tracing::info!(
                    user_id = id,
                    password_changed = update.password.is_some(),
                    "User updated"
                );
                Ok(user)
            }
            None => {
                let data = form.into_registration()?;
                let user = self.api.create_user(&data).await?;
                tracing::info!(user_id = user.id, "User created");
                Ok(user)
            }
        }
    }

    /// Prefilled form for editing `id`.
    pub async fn edit_form(&self, id: u64) -> Result<UserForm> {
        Ok(UserForm::from_user(&self.get(id).await?))
    }

    /// Delete a user. The server deactivates the account.
    pub async fn delete(&self, id: u64) -> Result<()> {
        self.require_session()?;
        self.api.delete_user(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Download the user report and write it to `dest`.
    ///
    /// `dest` may be a directory (the server's file name is used) or a file
    /// path. Without `dest` the file goes to the working directory.
    pub async fn download_report(&self, dest: Option<&Path>) -> Result<PathBuf> {
        self.require_session()?;
        let report = self.api.download_user_report().await?;

        let target = match dest {
            Some(path) if path.is_dir() => path.join(&report.filename),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(&report.filename),
        };

        tokio::fs::write(&target, &report.bytes).await?;
        tracing::info!(path = %target.display(), bytes = report.bytes.len(), "User report saved");
        Ok(target)
    }

    fn require_session(&self) -> Result<()> {
        if self.api.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }
}
