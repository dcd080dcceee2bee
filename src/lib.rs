// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Vault API - Keycloak-gated resource service
//!
//! This crate puts a bearer-token authorization gate in front of the Vault
//! application's HTTP API. Tokens are Keycloak-issued JWTs, verified against
//! the realm's published signing keys and checked for realm roles per route.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification and role authorization (Keycloak JWT)
//! - `config` - Environment-derived configuration objects
//! - `state` - Shared application state

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
