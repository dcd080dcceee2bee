// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only endpoints.
//!
//! Everything here sits behind the `admin` realm role and provides
//! operational visibility into the authorization gate itself.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{auth::KeySummary, error::ApiError, state::AppState};

/// Response for GET /v1/admin
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOverviewResponse {
    /// Token issuer this instance trusts.
    pub issuer: String,
    /// Audience expected in tokens.
    pub audience: String,
    /// Whether the realm's signing keys are currently cached.
    pub jwks_cached: bool,
    /// Server version.
    pub version: String,
    /// Current timestamp.
    pub timestamp: String,
}

/// Response for GET /v1/admin/keys
#[derive(Debug, Serialize, ToSchema)]
pub struct KeyListResponse {
    /// Signing keys the realm currently publishes.
    pub keys: Vec<KeySummary>,
    /// Total count.
    pub total: usize,
}

/// Admin overview of the authorization gate.
///
/// Returns the trust configuration this instance verifies tokens against.
/// Admin only.
#[utoipa::path(
    get,
    path = "/v1/admin",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Gate configuration", body = AdminOverviewResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn admin_overview(State(state): State<AppState>) -> Json<AdminOverviewResponse> {
    Json(AdminOverviewResponse {
        issuer: state.verifier.issuer().to_string(),
        audience: state.verifier.audience().to_string(),
        jwks_cached: state.verifier.jwks().is_cached().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// List the realm's published signing keys.
///
/// Key ids and algorithms only; key material is never exposed. Admin only.
#[utoipa::path(
    get,
    path = "/v1/admin/keys",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Published signing keys", body = KeyListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 503, description = "Signing keys unavailable")
    )
)]
pub async fn list_keys(State(state): State<AppState>) -> Result<Json<KeyListResponse>, ApiError> {
    let keys = state
        .verifier
        .jwks()
        .key_summaries()
        .await
        .map_err(|_| ApiError::service_unavailable("signing keys are currently unavailable"))?;

    let total = keys.len();
    Ok(Json(KeyListResponse { keys, total }))
}
