// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-gating middleware for router subtrees.
//!
//! The `Auth` extractor in `extractor.rs` authenticates one handler at a
//! time; this middleware gates an entire subtree and additionally enforces a
//! realm-role requirement. Attach it with
//! `axum::middleware::from_fn_with_state`:
//!
//! ```rust,ignore
//! let admin_routes = Router::new()
//!     .route("/admin", get(admin_overview))
//!     .route_layer(axum::middleware::from_fn_with_state(
//!         RouteGuard::any_of(state.clone(), ["admin"]),
//!         authorize_request,
//!     ));
//! ```
//!
//! Requests that pass continue down the stack with [`AuthenticatedUser`]
//! planted in their extensions, so handlers behind the gate can take the
//! `Auth` extractor without verifying twice.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

use super::claims::AuthenticatedUser;
use super::extractor::bearer_token;
use super::roles::{authorize, AuthDecision, RoleSet};

/// Per-subtree gate state: the verifier to run and the realm roles the
/// subtree requires. Cloning shares both.
#[derive(Clone)]
pub struct RouteGuard {
    state: AppState,
    required: Arc<RoleSet>,
}

impl RouteGuard {
    /// Gate that requires a valid token but no particular role.
    pub fn authenticated(state: AppState) -> Self {
        Self {
            state,
            required: Arc::new(RoleSet::empty()),
        }
    }

    /// Gate that admits tokens carrying at least one of `roles`.
    pub fn any_of(state: AppState, roles: impl Into<RoleSet>) -> Self {
        Self {
            state,
            required: Arc::new(roles.into()),
        }
    }
}

/// Middleware that verifies the bearer token and applies the gate's role
/// requirement.
///
/// Everything short of `Allowed` is answered right here with the mapped
/// 401/403 body, so handlers behind the gate only ever see verified
/// requests.
pub async fn authorize_request(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let decision = match bearer_token(request.headers()) {
        Ok(token) => match guard.state.verifier.verify(token).await {
            Ok(claims) => authorize(claims, &guard.required),
            Err(err) => AuthDecision::Invalid(err),
        },
        Err(err) => AuthDecision::Invalid(err),
    };

    match decision.into_result() {
        Ok(claims) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser::from_claims(claims));
            next.run(request).await
        }
        Err(err) => {
            let path = request.uri().path();
            if err.is_provider_failure() {
                tracing::warn!(path, error_code = err.error_code(), error = %err, "request rejected at the authorization gate");
            } else {
                tracing::debug!(path, error_code = err.error_code(), error = %err, "request rejected at the authorization gate");
            }
            err.into_response()
        }
    }
}
