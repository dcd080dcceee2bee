// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification.
//!
//! [`TokenVerifier`] carries the expected issuer, expected audience, and the
//! algorithm allowlist fixed at startup, plus the key-set client. `verify`
//! takes a raw compact JWT and yields [`Claims`] only when every check
//! passed: header decode, allowlisted algorithm, key selection by `kid`,
//! signature, `exp` (with leeway), `iss`, and `aud`.
//!
//! Algorithm confusion is ruled out structurally: the declared algorithm is
//! checked against the allowlist before any key lookup, and a key is only
//! ever selected for that vetted algorithm.

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::debug;

use crate::config::{AuthConfig, ConfigError};

use super::claims::Claims;
use super::error::AuthError;
use super::jwks::JwksClient;

/// Verifies bearer tokens against one identity provider.
///
/// Cheap to clone; clones share the underlying key-set cache.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    jwks: JwksClient,
    issuer: String,
    audience: String,
    allowed_algs: Vec<Algorithm>,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            jwks: JwksClient::new(config)?,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            allowed_algs: config.allowed_algs.clone(),
            leeway_secs: config.clock_skew_secs,
        })
    }

    /// The expected issuer, for startup banners and operator endpoints.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The expected audience.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Shared key-set client, for health probes and key inspection.
    pub fn jwks(&self) -> &JwksClient {
        &self.jwks
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Verification is idempotent: the same token against the same key set
    /// yields the same claims, and nothing about the verifier changes across
    /// calls except the key-set cache.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;

        // No key is ever selected for a non-allowlisted algorithm.
        if !self.allowed_algs.contains(&header.alg) {
            debug!(alg = ?header.alg, "token declares a non-allowlisted algorithm");
            return Err(AuthError::UnknownSigningKey);
        }

        // The realm stamps a kid on every token it signs; a token without
        // one cannot name a key, so nothing can match it.
        let kid = header.kid.as_deref().ok_or(AuthError::UnknownSigningKey)?;
        let decoding_key = self.jwks.decoding_key(kid, header.alg).await?;

        // header.alg is already vetted against the allowlist, and the key
        // was selected for exactly that algorithm.
        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway_secs;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let token_data =
            decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::SignatureMismatch,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => AuthError::UnknownSigningKey,
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    match claim.as_str() {
                        "aud" => AuthError::InvalidAudience,
                        "iss" => AuthError::InvalidIssuer,
                        _ => AuthError::MalformedToken,
                    }
                }
                _ => AuthError::MalformedToken,
            })?;

        Ok(token_data.claims)
    }
}
