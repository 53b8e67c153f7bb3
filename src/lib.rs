// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Relatorio: client for the RelatórioIA report service
//!
//! This crate talks to the RelatórioIA REST API: it keeps a token session,
//! generates reports from uploaded spreadsheets and administers user
//! accounts.

pub mod config;
pub mod error;
pub mod forms;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;
pub mod token;

use config::Config;
use services::{ApiClient, AuthService, ReportService, UserDirectory};
use std::sync::Arc;
use storage::TokenStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub api: ApiClient,
    pub auth: AuthService,
    pub users: UserDirectory,
    pub reports: ReportService,
}

impl AppState {
    /// Wire every service to one client and session store.
    pub fn new(config: Config, store: Arc<dyn TokenStore>) -> error::Result<Self> {
        let api = ApiClient::new(&config, store)?;
        Ok(Self {
            auth: AuthService::new(api.clone()),
            users: UserDirectory::new(api.clone()),
            reports: ReportService::new(api.clone()),
            api,
            config,
        })
    }
}
