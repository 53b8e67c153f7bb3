// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - API access and the workflows built on it.

pub mod api;
pub mod auth;
pub mod reports;
pub mod users;

pub use api::ApiClient;
pub use auth::{AuthService, SessionInfo};
pub use reports::ReportService;
pub use users::{filter_users, UserDirectory};
