// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP router and route policy.
//!
//! Health probes are public. Everything under `/v1` requires a verified
//! bearer token, and the `/v1/user` and `/v1/admin` subtrees additionally
//! require the matching realm role.

use axum::{middleware, routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::authorize_request, KeySummary, RoleSet, RouteGuard},
    state::AppState,
};

pub mod admin;
pub mod health;
pub mod users;

pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/user", get(users::user_overview))
        .route_layer(middleware::from_fn_with_state(
            RouteGuard::any_of(state.clone(), ["user"]),
            authorize_request,
        ));

    let admin_routes = Router::new()
        .route("/admin", get(admin::admin_overview))
        .route("/admin/keys", get(admin::list_keys))
        .route_layer(middleware::from_fn_with_state(
            RouteGuard::any_of(state.clone(), ["admin"]),
            authorize_request,
        ));

    let v1_routes = Router::new()
        .route("/me", get(users::get_current_user))
        .merge(user_routes)
        .merge(admin_routes)
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        users::get_current_user,
        users::user_overview,
        admin::admin_overview,
        admin::list_keys
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            users::MeResponse,
            users::UserAreaResponse,
            admin::AdminOverviewResponse,
            admin::KeyListResponse,
            KeySummary,
            RoleSet
        )
    ),
    tags(
        (name = "Health", description = "Service health probes"),
        (name = "Users", description = "Token identity and the user area"),
        (name = "Admin", description = "Authorization gate operations")
    )
)]
struct ApiDoc;
