// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::process;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use relational_vault_api::api::router;
use relational_vault_api::auth::TokenVerifier;
use relational_vault_api::config::{AuthConfig, ServerConfig};
use relational_vault_api::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let auth_config = match AuthConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid authorization configuration");
            process::exit(1);
        }
    };
    let server_config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid server configuration");
            process::exit(1);
        }
    };

    let verifier = match TokenVerifier::new(&auth_config) {
        Ok(verifier) => verifier,
        Err(err) => {
            tracing::error!(error = %err, "could not build token verifier");
            process::exit(1);
        }
    };

    let state = AppState::new(verifier);
    let app = router(state);

    let addr: SocketAddr = match format!("{}:{}", server_config.host, server_config.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::error!(error = %err, "invalid bind address");
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "could not bind listener");
            process::exit(1);
        }
    };

    tracing::info!(
        issuer = %auth_config.issuer,
        audience = %auth_config.audience,
        "vault API listening on http://{addr} (docs at /docs)"
    );

    if let Err(err) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server exited with error");
        process::exit(1);
    }
}

/// Structured logging init: `RUST_LOG` controls the filter, `LOG_FORMAT`
/// switches between `json` and human-readable output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
