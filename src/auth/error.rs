// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! Every way a request can fail the gate maps to exactly one variant here, so
//! callers (and tests) can tell rejection causes apart. The HTTP boundary
//! collapses them to 401/403; the `error_code` in the body stays stable for
//! clients while the human-readable message may change.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication/authorization failure.
///
/// Variants for provider trouble (`DiscoveryUnavailable`, `KeySetUnavailable`)
/// deliberately carry no detail: the underlying cause is logged where the
/// fetch fails, and response bodies never disclose provider URLs or key
/// material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Authorization header absent or not a `Bearer <token>` credential
    MissingCredential,
    /// Token (or a required claim) is structurally unreadable
    MalformedToken,
    /// Signature did not verify against the selected key
    SignatureMismatch,
    /// No allowlisted key matches the token's key id
    UnknownSigningKey,
    /// `exp` is in the past beyond the configured leeway
    TokenExpired,
    /// `iss` does not match the expected issuer
    InvalidIssuer,
    /// `aud` does not contain the expected audience
    InvalidAudience,
    /// Discovery document could not be retrieved or parsed
    DiscoveryUnavailable,
    /// Key set could not be retrieved or parsed
    KeySetUnavailable,
    /// Token verified but carries none of the required roles
    Denied { required: Vec<String> },
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedToken => "malformed_token",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::DiscoveryUnavailable => "discovery_unavailable",
            AuthError::KeySetUnavailable => "keyset_unavailable",
            AuthError::Denied { .. } => "insufficient_role",
        }
    }

    /// HTTP status for this error: 403 for a role denial, 401 for everything
    /// else. Provider outages are indistinguishable from bad tokens at the
    /// boundary on purpose; operators get the distinction from logs and the
    /// error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Denied { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// True for failures caused by the identity provider rather than the
    /// presented token. These log at `warn`, token-intrinsic ones at `debug`.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            AuthError::DiscoveryUnavailable | AuthError::KeySetUnavailable
        )
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredential => {
                write!(f, "Authorization header missing or not 'Bearer <token>'")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::SignatureMismatch => write!(f, "Token signature is invalid"),
            AuthError::UnknownSigningKey => {
                write!(f, "Token is signed with an unknown key")
            }
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InvalidIssuer => write!(f, "Token issuer is invalid"),
            AuthError::InvalidAudience => write!(f, "Token audience is invalid"),
            AuthError::DiscoveryUnavailable => {
                write!(f, "Identity provider discovery is unavailable")
            }
            AuthError::KeySetUnavailable => {
                write!(f, "Identity provider key set is unavailable")
            }
            AuthError::Denied { required } => {
                write!(
                    f,
                    "Insufficient role for this operation (requires one of: {})",
                    required.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_credential_returns_401() {
        let response = AuthError::MissingCredential.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_credential");
    }

    #[tokio::test]
    async fn denied_returns_403_with_required_roles() {
        let err = AuthError::Denied {
            required: vec!["admin".to_string()],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "insufficient_role");
        assert!(body["error"].as_str().unwrap().contains("admin"));
    }

    #[tokio::test]
    async fn provider_failures_return_401_without_detail() {
        for err in [AuthError::DiscoveryUnavailable, AuthError::KeySetUnavailable] {
            assert!(err.is_provider_failure());
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
            // No URLs or hostnames in what the client sees.
            assert!(!body["error"].as_str().unwrap().contains("http"));
        }
    }

    #[test]
    fn every_verification_error_is_unauthorized() {
        for err in [
            AuthError::MalformedToken,
            AuthError::SignatureMismatch,
            AuthError::UnknownSigningKey,
            AuthError::TokenExpired,
            AuthError::InvalidIssuer,
            AuthError::InvalidAudience,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
            assert!(!err.is_provider_failure());
        }
    }
}
