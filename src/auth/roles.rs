// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Realm roles and the authorization decision.
//!
//! Roles here are plain realm role names as Keycloak emits them; the service
//! attaches a required set to each protected route and a token passes when it
//! carries *any* of them (OR semantics). The decision over verified claims is
//! a pure function: no I/O, no clock, no way to conflate "lacks a role" with
//! "not authenticated".

use std::collections::BTreeSet;

use serde::Serialize;
use utoipa::ToSchema;

use super::claims::Claims;
use super::error::AuthError;

/// An immutable set of realm role names.
///
/// Always derived from a token's claims (or declared as a route requirement),
/// never mutated afterwards. Ordering is stable so logs and denial messages
/// are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// True when the two sets share at least one role.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        // Iterate the smaller side.
        let (needles, haystack) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        needles.iter().any(|role| haystack.contains(role))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }
}

impl<'a> FromIterator<&'a str> for RoleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl FromIterator<String> for RoleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[&str; N]> for RoleSet {
    fn from(roles: [&str; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for role in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{role}")?;
            first = false;
        }
        Ok(())
    }
}

/// Outcome of gating one request.
///
/// The three arms are deliberately distinct types of fact: the caller is
/// authenticated *and* authorized, authenticated but lacking every required
/// role, or not (verifiably) authenticated at all.
#[derive(Debug)]
pub enum AuthDecision {
    /// Verified and role-authorized; carries the claims for the handler
    Allowed(Claims),
    /// Verified, but the role intersection was empty
    Denied { required: Vec<String> },
    /// Verification failed before roles were ever considered
    Invalid(AuthError),
}

impl AuthDecision {
    /// Collapses the decision into the error the HTTP boundary responds with.
    pub fn into_result(self) -> Result<Claims, AuthError> {
        match self {
            AuthDecision::Allowed(claims) => Ok(claims),
            AuthDecision::Denied { required } => Err(AuthError::Denied { required }),
            AuthDecision::Invalid(err) => Err(err),
        }
    }
}

impl From<AuthError> for AuthDecision {
    fn from(err: AuthError) -> Self {
        AuthDecision::Invalid(err)
    }
}

/// Decides whether verified claims satisfy a route's role requirement.
///
/// Pure over the claims: an empty requirement admits any valid token, a
/// non-empty one admits tokens whose realm roles intersect it. This function
/// can deny, but it never produces `Invalid`; that arm is reserved for
/// verification failures upstream of it.
pub fn authorize(claims: Claims, required: &RoleSet) -> AuthDecision {
    if required.is_empty() || claims.realm_roles().intersects(required) {
        AuthDecision::Allowed(claims)
    } else {
        AuthDecision::Denied {
            required: required.to_vec(),
        }
    }
}
