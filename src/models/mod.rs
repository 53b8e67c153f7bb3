// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models mirroring the REST API schema.

pub mod report;
pub mod user;

pub use report::{ReportFile, UploadCandidate};
pub use user::{
    AuthResponse, AuthTokens, ChangePasswordRequest, LoginCredentials, MessageResponse,
    RefreshResponse, RegisterData, User, UserUpdate,
};
