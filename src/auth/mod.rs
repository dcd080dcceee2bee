// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Bearer-token authorization for the Vault API against a Keycloak realm.
//!
//! ## Request flow
//!
//! 1. Frontend authenticates the user with Keycloak and obtains an access token
//! 2. Frontend sends `Authorization: Bearer <access token>`
//! 3. This service:
//!    - Resolves the realm's signing keys via OIDC discovery (cached, TTL-bounded)
//!    - Verifies JWT signature, expiry, issuer, audience
//!    - Extracts:
//!      - `sub` → canonical `user_id`
//!      - `realm_access.roles` → realm roles
//! 4. Route gates compare realm roles against each subtree's requirement
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Signing algorithms outside the configured allowlist are rejected before
//!   any key lookup
//! - Key rotation is absorbed by at most one cache refresh per unknown `kid`,
//!   rate-limited by a minimum refresh interval
//! - Clock skew tolerance is configurable (60 seconds by default)

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod roles;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_keys;

pub use claims::{AuthenticatedUser, Claims};
pub use error::AuthError;
pub use extractor::Auth;
pub use jwks::{JwksClient, KeySummary};
pub use middleware::RouteGuard;
pub use roles::{authorize, AuthDecision, RoleSet};
pub use verifier::TokenVerifier;
