// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route table and access guards.
//!
//! Public routes are only for anonymous visitors; protected routes need a
//! session. Everything else lands on the login page.

use std::fmt;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// A page of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Dashboard,
}

/// Who may view a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anonymous only; authenticated users are sent to the dashboard
    Public,
    /// Authenticated only; anonymous users are sent to login
    Protected,
}

/// Session as seen by the guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session not yet restored from storage
    Loading,
    Anonymous,
    Authenticated,
}

/// Result of resolving a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Wait for the session to load before deciding
    Loading,
    Render(Route),
    Redirect(&'static str),
}

impl Route {
    pub const ALL: [Route; 3] = [Route::Login, Route::Register, Route::Dashboard];

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => LOGIN_PATH,
            Route::Register => REGISTER_PATH,
            Route::Dashboard => DASHBOARD_PATH,
        }
    }

    pub fn access(self) -> Access {
        match self {
            Route::Login | Route::Register => Access::Public,
            Route::Dashboard => Access::Protected,
        }
    }

    /// Match a path, ignoring any query string and trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        Route::ALL
            .into_iter()
            .find(|route| route.path().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Loading => f.write_str("loading"),
            Outcome::Render(route) => write!(f, "render {}", route),
            Outcome::Redirect(to) => write!(f, "redirect {}", to),
        }
    }
}

/// Decide what to show for `path` given the session state.
pub fn resolve(path: &str, session: SessionState) -> Outcome {
    let Some(route) = Route::from_path(path) else {
        return Outcome::Redirect(LOGIN_PATH);
    };

    match (route.access(), session) {
        (_, SessionState::Loading) => Outcome::Loading,
        (Access::Protected, SessionState::Anonymous) => Outcome::Redirect(LOGIN_PATH),
        (Access::Public, SessionState::Authenticated) => Outcome::Redirect(DASHBOARD_PATH),
        _ => Outcome::Render(route),
    }
}
