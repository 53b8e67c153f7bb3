// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side form checks run before anything is sent to the API.
//!
//! Every form first requires its mandatory fields, then applies the
//! field rules in a fixed order so the user always sees the same message
//! for the same input.

use crate::error::ClientError;
use crate::models::{ChangePasswordRequest, LoginCredentials, RegisterData, User, UserUpdate};
use validator::{Validate, ValidationErrors};

pub const FILL_ALL_FIELDS: &str = "Please fill in all fields";
pub const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match";
pub const INVALID_EMAIL: &str = "Please enter a valid email address";
pub const BOTH_PASSWORDS_REQUIRED: &str =
    "Both password fields are required to change the password";

/// Largest spreadsheet accepted for report generation (50 MB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
/// Spreadsheet formats the report generator reads.
pub const UPLOAD_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".xls"];

/// Login form.
#[derive(Debug, Clone, Default, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn into_credentials(self) -> Result<LoginCredentials, ClientError> {
        require(&[&self.email, &self.password])?;
        check(&self, &["email"])?;
        Ok(LoginCredentials {
            email: self.email.trim().to_string(),
            password: self.password,
        })
    }
}

/// Account form shared by sign-up and the user administration panel.
#[derive(Debug, Clone, Default, Validate)]
pub struct UserForm {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirm: String,
}

impl UserForm {
    /// Prefill for editing; password fields start blank ("keep current").
    pub fn from_user(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password: String::new(),
            password_confirm: String::new(),
        }
    }

    /// Validate as a new account: every field is mandatory.
    pub fn into_registration(self) -> Result<RegisterData, ClientError> {
        require(&[
            &self.email,
            &self.username,
            &self.first_name,
            &self.last_name,
            &self.password,
            &self.password_confirm,
        ])?;
        check(&self, &["password_confirm", "email"])?;

        Ok(RegisterData {
            email: self.email.trim().to_string(),
            username: self.username.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            password: self.password,
            password_confirm: self.password_confirm,
        })
    }

    /// Validate as an edit of an existing account.
    ///
    /// Blank password fields keep the current password. If either one is
    /// filled in, both must be and they must match.
    pub fn into_update(self) -> Result<UserUpdate, ClientError> {
        require(&[&self.email, &self.username, &self.first_name, &self.last_name])?;

        let changing_password = !self.password.is_empty() || !self.password_confirm.is_empty();
        if changing_password && (self.password.is_empty() || self.password_confirm.is_empty()) {
            return Err(ClientError::Validation(BOTH_PASSWORDS_REQUIRED.to_string()));
        }
        check(&self, &["password_confirm", "email"])?;

        let (password, password_confirm) = if changing_password {
            (Some(self.password), Some(self.password_confirm))
        } else {
            (None, None)
        };

        Ok(UserUpdate {
            email: Some(self.email.trim().to_string()),
            username: Some(self.username.trim().to_string()),
            first_name: Some(self.first_name.trim().to_string()),
            last_name: Some(self.last_name.trim().to_string()),
            password,
            password_confirm,
        })
    }
}

/// Password change form.
#[derive(Debug, Clone, Default, Validate)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub new_password_confirm: String,
}

impl ChangePasswordForm {
    pub fn into_request(self) -> Result<ChangePasswordRequest, ClientError> {
        require(&[
            &self.old_password,
            &self.new_password,
            &self.new_password_confirm,
        ])?;
        check(&self, &["new_password_confirm"])?;
        Ok(ChangePasswordRequest {
            old_password: self.old_password,
            new_password: self.new_password,
            new_password_confirm: self.new_password_confirm,
        })
    }
}

/// Check a spreadsheet's name and size before uploading it.
pub fn validate_upload(filename: &str, size: u64) -> Result<(), ClientError> {
    let lower = filename.to_lowercase();
    let extension = lower.rfind('.').map(|i| &lower[i..]).unwrap_or_default();
    if !UPLOAD_EXTENSIONS.contains(&extension) {
        return Err(ClientError::Validation(
            "Invalid format: please upload only CSV or Excel files (.xlsx, .xls)".to_string(),
        ));
    }

    if size > MAX_UPLOAD_BYTES {
        return Err(ClientError::Validation(
            "File too large: the file must be at most 50MB".to_string(),
        ));
    }

    Ok(())
}

fn require(fields: &[&String]) -> Result<(), ClientError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ClientError::Validation(FILL_ALL_FIELDS.to_string()));
    }
    Ok(())
}

/// Run the derived rules and report the first failing field in `order`.
fn check<T: Validate>(form: &T, order: &[&str]) -> Result<(), ClientError> {
    match form.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(ClientError::Validation(first_message(&errors, order))),
    }
}

fn first_message(errors: &ValidationErrors, order: &[&str]) -> String {
    let fields = errors.field_errors();
    order
        .iter()
        .filter_map(|name| fields.get(*name).and_then(|list| list.first()))
        .chain(fields.values().filter_map(|list| list.first()))
        .next()
        .map(|err| match &err.message {
            Some(message) => message.to_string(),
            None => err.code.to_string(),
        })
        .unwrap_or_else(|| errors.to_string())
}
