// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key-set resolution and caching.
//!
//! The realm publishes its signing keys as a JWKS whose location is
//! advertised by the OIDC discovery document. This module resolves that
//! chain (discovery → `jwks_uri` → key set), keeps the result in a shared
//! time-bounded cache, and hands out decoding keys by key id.
//!
//! ## Rotation
//!
//! When a token names a `kid` the cached set does not contain, the realm may
//! have rotated its keys, so the set is refetched once, but never more often
//! than the configured minimum refresh interval. A stream of garbage `kid`s
//! cannot turn into a fetch storm against the provider.
//!
//! ## Networking
//!
//! One `reqwest` client with a bounded timeout; fetch failures map to
//! [`AuthError::DiscoveryUnavailable`] / [`AuthError::KeySetUnavailable`]
//! and the cause is logged here, never echoed to API clients.

use std::sync::Arc;
use std::time::Instant;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::config::{AuthConfig, ConfigError, HostRewrite};

use super::error::AuthError;

/// OIDC discovery document, as far as this service cares.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
}

/// One resolved generation of the realm's keys.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Key id + algorithm summary, safe to expose on operator endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KeySummary {
    /// Key id, when the JWKS entry carries one
    pub kid: Option<String>,
    /// Declared algorithm, when present
    pub alg: Option<String>,
    /// Key type (`RSA`, `EC`, ...)
    pub kty: String,
}

/// Cached JWKS client for one identity provider.
///
/// Cheap to clone; all clones share the same cache slot, so every request
/// task in the process sees the same key-set generation.
#[derive(Clone)]
pub struct JwksClient {
    discovery_url: String,
    host_rewrite: Option<HostRewrite>,
    cache_ttl: std::time::Duration,
    min_refresh_interval: std::time::Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    client: reqwest::Client,
}

impl JwksClient {
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            discovery_url: config.discovery_url.clone(),
            host_rewrite: config.jwks_host_rewrite.clone(),
            cache_ttl: config.cache_ttl,
            min_refresh_interval: config.min_refresh_interval,
            cache: Arc::new(RwLock::new(None)),
            client,
        })
    }

    /// Decoding key for `kid`, which the caller has already established to
    /// use an allowlisted algorithm (`declared_alg`). A miss triggers at most
    /// one rotation refetch before giving up with `UnknownSigningKey`.
    pub async fn decoding_key(
        &self,
        kid: &str,
        declared_alg: Algorithm,
    ) -> Result<DecodingKey, AuthError> {
        let jwks = self.current_jwks().await?;
        if let Some(key) = select_key(&jwks, kid, declared_alg)? {
            return Ok(key);
        }

        if !self.refresh_for_rotation().await? {
            return Err(AuthError::UnknownSigningKey);
        }

        let jwks = self.current_jwks().await?;
        select_key(&jwks, kid, declared_alg)?.ok_or(AuthError::UnknownSigningKey)
    }

    /// Summaries of the currently served keys (fetches when stale).
    pub async fn key_summaries(&self) -> Result<Vec<KeySummary>, AuthError> {
        let jwks = self.current_jwks().await?;
        Ok(jwks.keys.iter().map(summarize_key).collect())
    }

    /// Force a refetch regardless of cache state.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let entry = self.fetch().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(entry);
        Ok(())
    }

    /// Whether a fresh key set is cached right now.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) => entry.fetched_at.elapsed() < self.cache_ttl,
            None => false,
        }
    }

    /// Key set from cache, fetching when absent or expired.
    async fn current_jwks(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        let entry = self.fetch().await?;
        let jwks = entry.jwks.clone();
        let mut cache = self.cache.write().await;
        *cache = Some(entry);
        Ok(jwks)
    }

    /// Refetches after an unknown `kid`, unless a fetch happened within the
    /// minimum refresh interval. Returns whether a refetch was performed.
    async fn refresh_for_rotation(&self) -> Result<bool, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.min_refresh_interval {
                    debug!("suppressing key-set refetch inside minimum refresh interval");
                    return Ok(false);
                }
            }
        }

        let entry = self.fetch().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(entry);
        Ok(true)
    }

    /// Resolves discovery, applies the host substitution, fetches the JWKS.
    async fn fetch(&self) -> Result<CacheEntry, AuthError> {
        let document = self.fetch_discovery().await?;
        debug!(issuer = %document.issuer, "resolved discovery document");

        let jwks_uri = match &self.host_rewrite {
            Some(rewrite) => rewrite.apply(&document.jwks_uri).map_err(|reason| {
                warn!(%reason, "advertised jwks_uri rejected by host substitution");
                AuthError::DiscoveryUnavailable
            })?,
            None => document.jwks_uri,
        };

        let jwks = self.fetch_jwks(&jwks_uri).await?;
        Ok(CacheEntry {
            jwks,
            fetched_at: Instant::now(),
        })
    }

    async fn fetch_discovery(&self) -> Result<DiscoveryDocument, AuthError> {
        let response = self
            .client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "failed to fetch discovery document");
                AuthError::DiscoveryUnavailable
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "discovery endpoint returned an error");
            return Err(AuthError::DiscoveryUnavailable);
        }

        response.json::<DiscoveryDocument>().await.map_err(|e| {
            warn!(error = %e, "discovery document did not parse");
            AuthError::DiscoveryUnavailable
        })
    }

    async fn fetch_jwks(&self, jwks_uri: &str) -> Result<JwkSet, AuthError> {
        let response = self.client.get(jwks_uri).send().await.map_err(|e| {
            warn!(error = %e, "failed to fetch key set");
            AuthError::KeySetUnavailable
        })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "key-set endpoint returned an error");
            return Err(AuthError::KeySetUnavailable);
        }

        response.json::<JwkSet>().await.map_err(|e| {
            warn!(error = %e, "key set did not parse");
            AuthError::KeySetUnavailable
        })
    }
}

impl std::fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksClient")
            .field("discovery_url", &self.discovery_url)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

/// Picks the JWKS entry matching `kid` whose own algorithm (when declared)
/// agrees with the token's, and converts it. A `kid` match with a
/// contradictory algorithm is treated as no match: that key cannot have
/// produced the signature under verification.
fn select_key(
    jwks: &JwkSet,
    kid: &str,
    declared_alg: Algorithm,
) -> Result<Option<DecodingKey>, AuthError> {
    let Some(jwk) = jwks
        .keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
    else {
        return Ok(None);
    };

    let (key, key_alg) = jwk_to_decoding_key(jwk)?;
    if key_alg != declared_alg {
        debug!(%kid, "key id matched but algorithms disagree");
        return Ok(None);
    }
    Ok(Some(key))
}

/// Converts a JWK into a decoding key plus the algorithm it verifies.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(|e| {
                warn!(error = %e, kid = ?jwk.common.key_id, "unusable RSA key in key set");
                AuthError::KeySetUnavailable
            })?;

            let alg = jwk
                .common
                .key_algorithm
                .map(|a| match a {
                    jsonwebtoken::jwk::KeyAlgorithm::RS384 => Algorithm::RS384,
                    jsonwebtoken::jwk::KeyAlgorithm::RS512 => Algorithm::RS512,
                    _ => Algorithm::RS256,
                })
                .unwrap_or(Algorithm::RS256);

            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(|e| {
                warn!(error = %e, kid = ?jwk.common.key_id, "unusable EC key in key set");
                AuthError::KeySetUnavailable
            })?;

            let alg = jwk
                .common
                .key_algorithm
                .map(|a| match a {
                    jsonwebtoken::jwk::KeyAlgorithm::ES384 => Algorithm::ES384,
                    _ => Algorithm::ES256,
                })
                .unwrap_or(Algorithm::ES256);

            Ok((key, alg))
        }
        _ => {
            warn!(kid = ?jwk.common.key_id, "unsupported key type in key set");
            Err(AuthError::KeySetUnavailable)
        }
    }
}

fn summarize_key(jwk: &Jwk) -> KeySummary {
    let kty = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => "RSA",
        AlgorithmParameters::EllipticCurve(_) => "EC",
        _ => "other",
    };
    KeySummary {
        kid: jwk.common.key_id.clone(),
        alg: jwk.common.key_algorithm.map(|a| format!("{a:?}")),
        kty: kty.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_keys::{self, TEST_KID};

    fn parse_jwks(kids: &[&str]) -> JwkSet {
        serde_json::from_value(test_keys::jwks_json(kids)).unwrap()
    }

    #[tokio::test]
    async fn cache_initially_empty() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let client = JwksClient::new(&fixture.auth_config()).unwrap();
        assert!(!client.is_cached().await);
        assert_eq!(fixture.jwks_count(), 0);
    }

    #[tokio::test]
    async fn first_lookup_fetches_then_serves_from_cache() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let client = JwksClient::new(&fixture.auth_config()).unwrap();

        client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap();
        assert!(client.is_cached().await);
        assert_eq!(fixture.discovery_count(), 1);
        assert_eq!(fixture.jwks_count(), 1);

        // Second lookup stays on the cached generation.
        client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap();
        assert_eq!(fixture.jwks_count(), 1);
    }

    #[tokio::test]
    async fn unknown_kid_triggers_one_refetch() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let client = JwksClient::new(&fixture.auth_config()).unwrap();

        let err = client
            .decoding_key("no-such-kid", Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnknownSigningKey);
        // Initial fetch plus exactly one rotation refetch.
        assert_eq!(fixture.jwks_count(), 2);
    }

    #[tokio::test]
    async fn rotation_refetch_is_bounded_by_min_interval() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let mut config = fixture.auth_config();
        config.min_refresh_interval = std::time::Duration::from_secs(3600);
        let client = JwksClient::new(&config).unwrap();

        // Warm the cache, then rotate the provider to a kid we then miss on.
        client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap();
        fixture.rotate_to(&["vault-key-2"]);

        let err = client
            .decoding_key("vault-key-2", Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::UnknownSigningKey);
        // The refetch was suppressed: still only the warmup fetch.
        assert_eq!(fixture.jwks_count(), 1);
    }

    #[tokio::test]
    async fn rotation_is_picked_up_outside_the_interval() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let client = JwksClient::new(&fixture.auth_config()).unwrap();

        client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap();
        fixture.rotate_to(&["vault-key-2", TEST_KID]);

        // min_refresh_interval is zero in the fixture config, so the miss
        // refetches and finds the rotated key.
        client
            .decoding_key("vault-key-2", Algorithm::RS256)
            .await
            .unwrap();
        assert_eq!(fixture.jwks_count(), 2);
    }

    #[tokio::test]
    async fn unreachable_discovery_maps_to_discovery_unavailable() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let mut config = fixture.auth_config();
        config.discovery_url = format!("http://{}/not-the-discovery-path", fixture.addr);
        let client = JwksClient::new(&config).unwrap();

        let err = client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::DiscoveryUnavailable);
    }

    #[tokio::test]
    async fn host_rewrite_redirects_the_jwks_fetch() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;

        // Rewriting onto an unresolvable host proves the fetch follows the
        // rewritten URI: discovery is reached, the advertised endpoint never
        // is.
        let mut config = fixture.auth_config();
        config.jwks_host_rewrite = Some(HostRewrite {
            external: "127.0.0.1".to_string(),
            internal: "host.invalid".to_string(),
        });
        let client = JwksClient::new(&config).unwrap();
        let err = client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::KeySetUnavailable);
        assert_eq!(fixture.discovery_count(), 1);
        assert_eq!(fixture.jwks_count(), 0);

        // Rewriting onto another name for the same interface resolves the
        // key through the substituted URI.
        let mut config = fixture.auth_config();
        config.jwks_host_rewrite = Some(HostRewrite {
            external: "127.0.0.1".to_string(),
            internal: "localhost".to_string(),
        });
        let client = JwksClient::new(&config).unwrap();
        client
            .decoding_key(TEST_KID, Algorithm::RS256)
            .await
            .unwrap();
        assert_eq!(fixture.jwks_count(), 1);
    }

    #[test]
    fn select_key_requires_matching_algorithm() {
        let jwks = parse_jwks(&[TEST_KID]);

        assert!(select_key(&jwks, TEST_KID, Algorithm::RS256)
            .unwrap()
            .is_some());
        // The fixture key declares RS256; an RS512 token must not select it.
        assert!(select_key(&jwks, TEST_KID, Algorithm::RS512)
            .unwrap()
            .is_none());
        assert!(select_key(&jwks, "other", Algorithm::RS256)
            .unwrap()
            .is_none());
    }

    #[test]
    fn key_summaries_expose_no_key_material() {
        let jwks = parse_jwks(&[TEST_KID]);
        let summary = summarize_key(&jwks.keys[0]);
        assert_eq!(summary.kid.as_deref(), Some(TEST_KID));
        assert_eq!(summary.alg.as_deref(), Some("RS256"));
        assert_eq!(summary.kty, "RSA");

        let as_json = serde_json::to_string(&summary).unwrap();
        assert!(!as_json.contains(test_keys::TEST_JWK_N));
    }
}
