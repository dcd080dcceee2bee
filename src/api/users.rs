// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-facing endpoints.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, AuthenticatedUser, RoleSet};

/// Response for GET /v1/me
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    /// User's unique ID (token `sub`)
    pub user_id: String,
    /// Display username, when the token carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Realm roles the token grants
    pub roles: RoleSet,
    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
    /// Verified claims as the realm issued them
    #[schema(value_type = Object)]
    pub claims: serde_json::Value,
}

impl From<AuthenticatedUser> for MeResponse {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            roles: user.roles,
            expires_at: user.expires_at,
            claims: serde_json::to_value(&user.claims).unwrap_or_default(),
        }
    }
}

/// Response for GET /v1/user
#[derive(Debug, Serialize, ToSchema)]
pub struct UserAreaResponse {
    /// Confirmation that the role requirement was met.
    pub message: String,
    /// User's unique ID (token `sub`)
    pub user_id: String,
}

/// Get the current authenticated user's identity.
///
/// Returns the verified identity of whoever presented the token: canonical
/// user ID, username, realm roles and the claims themselves. Any valid token
/// may call this; no role is required.
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Identity of the presented token", body = MeResponse),
        (status = 401, description = "Invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(user): Auth) -> Json<MeResponse> {
    Json(user.into())
}

/// Probe for the user area.
///
/// The frontend calls this to decide whether to show the user dashboard;
/// the route requires the `user` realm role.
#[utoipa::path(
    get,
    path = "/v1/user",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User access granted", body = UserAreaResponse),
        (status = 401, description = "Invalid or missing token"),
        (status = 403, description = "Token lacks the user role"),
    )
)]
pub async fn user_overview(Auth(user): Auth) -> Json<UserAreaResponse> {
    Json(UserAreaResponse {
        message: "user access granted".to_string(),
        user_id: user.user_id,
    })
}
