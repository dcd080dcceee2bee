// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::RoleSet;

/// Verified claims from a Keycloak access token.
///
/// Standard OIDC claims are modeled as fields; everything else the realm puts
/// in the payload is preserved verbatim in `extra`, so serializing a `Claims`
/// reproduces the full token payload. Instances exist only on the far side of
/// signature + issuer + audience + expiry validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the canonical Keycloak user identifier
    pub sub: String,

    /// Issuer - the browser-facing realm URL. Optional in the serde model so
    /// absence surfaces as a validation error, not a deserialization error;
    /// always present once verification has passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience - a single value or a list, depending on realm mappers.
    /// Optional in the serde model for the same reason as `iss`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Username as shown to the user (requires the `profile` scope)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Realm-level role container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,

    /// Remaining payload members, kept as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Realm roles carried by the token. An absent `realm_access` (or an
    /// absent `roles` array inside it) is the empty set, never an error.
    pub fn realm_roles(&self) -> RoleSet {
        match &self.realm_access {
            Some(access) => access.roles.iter().map(String::as_str).collect(),
            None => RoleSet::empty(),
        }
    }
}

/// The `aud` claim: a single audience string or a set of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// The `realm_access` claim as Keycloak emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Authenticated caller identity, injected into request extensions by the
/// gate and handed to handlers by the `Auth` extractor.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    /// Display username, when the token carries one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Realm roles derived from the claims at verification time
    pub roles: RoleSet,

    /// Token expiration (Unix timestamp, for logging, not serialized)
    #[serde(skip)]
    pub expires_at: i64,

    /// Full verified payload, for handlers that echo it back
    #[serde(skip)]
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            username: claims.preferred_username.clone(),
            roles: claims.realm_roles(),
            expires_at: claims.exp,
            claims,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> serde_json::Value {
        serde_json::json!({
            "sub": "f3bd58e4-1c40-46b0-8f7b-3d3c0c8e9a01",
            "iss": "http://localhost:8080/realms/vault-core",
            "aud": "account",
            "exp": 1_700_003_600,
            "iat": 1_700_000_000,
            "preferred_username": "alice",
            "azp": "vault-app",
            "scope": "openid profile email",
            "realm_access": { "roles": ["user", "offline_access"] }
        })
    }

    #[test]
    fn deserializes_keycloak_payload() {
        let claims: Claims = serde_json::from_value(sample_payload()).unwrap();
        assert_eq!(claims.sub, "f3bd58e4-1c40-46b0-8f7b-3d3c0c8e9a01");
        assert_eq!(claims.preferred_username.as_deref(), Some("alice"));
        assert!(claims.aud.as_ref().unwrap().contains("account"));
        // Non-modeled members survive in `extra`.
        assert_eq!(claims.extra["azp"], "vault-app");
    }

    #[test]
    fn realm_roles_come_from_realm_access() {
        let claims: Claims = serde_json::from_value(sample_payload()).unwrap();
        let roles = claims.realm_roles();
        assert!(roles.contains("user"));
        assert!(roles.contains("offline_access"));
        assert!(!roles.contains("admin"));
    }

    #[test]
    fn absent_realm_access_yields_empty_role_set() {
        let mut payload = sample_payload();
        payload.as_object_mut().unwrap().remove("realm_access");
        let claims: Claims = serde_json::from_value(payload).unwrap();
        assert!(claims.realm_roles().is_empty());
    }

    #[test]
    fn audience_may_be_a_list() {
        let mut payload = sample_payload();
        payload["aud"] = serde_json::json!(["account", "vault-app"]);
        let claims: Claims = serde_json::from_value(payload).unwrap();
        let aud = claims.aud.as_ref().unwrap();
        assert!(aud.contains("vault-app"));
        assert!(!aud.contains("other-app"));
    }

    #[test]
    fn serializing_claims_reproduces_the_payload() {
        let payload = sample_payload();
        let claims: Claims = serde_json::from_value(payload.clone()).unwrap();
        let round_tripped = serde_json::to_value(&claims).unwrap();
        assert_eq!(round_tripped, payload);
    }

    #[test]
    fn from_claims_derives_identity_and_roles() {
        let claims: Claims = serde_json::from_value(sample_payload()).unwrap();
        let user = AuthenticatedUser::from_claims(claims);
        assert_eq!(user.user_id, "f3bd58e4-1c40-46b0-8f7b-3d3c0c8e9a01");
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert!(user.has_role("user"));
        assert!(!user.has_role("admin"));
        assert_eq!(user.expires_at, 1_700_003_600);
    }
}
