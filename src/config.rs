// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! explicit configuration objects built from them at startup. Nothing reads
//! the environment after startup; constructors receive these structs.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `OIDC_DISCOVERY_URL` | OIDC discovery document URL (reachable from this service) | Required |
//! | `OIDC_ISSUER` | Expected JWT issuer claim, exact match | Required |
//! | `OIDC_AUDIENCE` | Audience the token's `aud` claim must contain | `account` |
//! | `OIDC_ALLOWED_ALGS` | Comma-separated JWS algorithm allowlist | `RS256` |
//! | `OIDC_JWKS_HOST_REWRITE` | `external-host=internal-host` substitution for the advertised `jwks_uri` | Unset |
//! | `OIDC_HTTP_TIMEOUT_SECS` | Timeout for discovery/JWKS fetches | `10` |
//! | `OIDC_CACHE_TTL_SECS` | Key-set cache lifetime | `300` |
//! | `OIDC_MIN_REFRESH_SECS` | Floor between rotation-triggered refetches | `30` |
//! | `OIDC_CLOCK_SKEW_SECS` | Leeway applied to `exp` validation | `60` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

/// Environment variable name for the OIDC discovery document URL.
///
/// Keycloak publishes this at
/// `<base>/realms/<realm>/.well-known/openid-configuration`. The URL must be
/// reachable from inside the deployment network, which is not necessarily the
/// host the browser uses (see [`OIDC_JWKS_HOST_REWRITE_ENV`]).
pub const OIDC_DISCOVERY_URL_ENV: &str = "OIDC_DISCOVERY_URL";

/// Environment variable name for the expected `iss` claim value.
///
/// Tokens carry the issuer as the *browser-facing* realm URL, so this stays
/// in external form even when discovery is fetched over an internal alias.
pub const OIDC_ISSUER_ENV: &str = "OIDC_ISSUER";

/// Environment variable name for the expected audience member.
pub const OIDC_AUDIENCE_ENV: &str = "OIDC_AUDIENCE";

/// Environment variable name for the JWS algorithm allowlist.
pub const OIDC_ALLOWED_ALGS_ENV: &str = "OIDC_ALLOWED_ALGS";

/// Environment variable name for the `jwks_uri` host substitution.
///
/// Value format: `external-host=internal-host`. Applied to the host component
/// of the `jwks_uri` advertised by the discovery document, for deployments
/// where the identity provider advertises its browser-facing hostname but is
/// reachable from this service only via an internal alias.
pub const OIDC_JWKS_HOST_REWRITE_ENV: &str = "OIDC_JWKS_HOST_REWRITE";

/// Environment variable name for the outbound HTTP timeout (seconds).
pub const OIDC_HTTP_TIMEOUT_SECS_ENV: &str = "OIDC_HTTP_TIMEOUT_SECS";

/// Environment variable name for the key-set cache TTL (seconds).
pub const OIDC_CACHE_TTL_SECS_ENV: &str = "OIDC_CACHE_TTL_SECS";

/// Environment variable name for the minimum interval between
/// rotation-triggered key-set refetches (seconds).
pub const OIDC_MIN_REFRESH_SECS_ENV: &str = "OIDC_MIN_REFRESH_SECS";

/// Environment variable name for the `exp` validation leeway (seconds).
pub const OIDC_CLOCK_SKEW_SECS_ENV: &str = "OIDC_CLOCK_SKEW_SECS";

const DEFAULT_AUDIENCE: &str = "account";
const DEFAULT_ALLOWED_ALGS: &str = "RS256";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_MIN_REFRESH_SECS: u64 = 30;
const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Startup configuration failure. The process exits with these rather than
/// limping along with a half-configured verifier.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Host substitution applied to the `jwks_uri` advertised by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRewrite {
    pub external: String,
    pub internal: String,
}

impl HostRewrite {
    /// Parses the `external-host=internal-host` form.
    fn parse(raw: &str) -> Result<Self, String> {
        let (external, internal) = raw
            .split_once('=')
            .ok_or_else(|| "expected external-host=internal-host".to_string())?;
        let external = external.trim();
        let internal = internal.trim();
        if external.is_empty() || internal.is_empty() {
            return Err("both sides of the substitution must be non-empty".to_string());
        }
        Ok(Self {
            external: external.to_string(),
            internal: internal.to_string(),
        })
    }

    /// Applies the substitution to `url` when its host matches the external
    /// side. Operates on the parsed host component, never on the raw string.
    pub fn apply(&self, url: &str) -> Result<String, String> {
        let mut parsed = Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;
        if parsed.host_str() == Some(self.external.as_str()) {
            parsed
                .set_host(Some(self.internal.as_str()))
                .map_err(|e| format!("invalid replacement host: {e}"))?;
        }
        Ok(parsed.into())
    }
}

/// Everything the token-verification path needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OIDC discovery document URL.
    pub discovery_url: String,
    /// Expected `iss` claim, compared exactly.
    pub issuer: String,
    /// Audience the `aud` claim must contain.
    pub audience: String,
    /// JWS algorithms tokens are allowed to use. Keys are never selected for
    /// algorithms outside this list.
    pub allowed_algs: Vec<Algorithm>,
    /// Optional host substitution for the advertised `jwks_uri`.
    pub jwks_host_rewrite: Option<HostRewrite>,
    /// Timeout for discovery and JWKS fetches.
    pub http_timeout: Duration,
    /// How long a fetched key set stays fresh.
    pub cache_ttl: Duration,
    /// Floor between refetches triggered by unknown `kid`s.
    pub min_refresh_interval: Duration,
    /// Leeway in seconds applied to `exp` validation.
    pub clock_skew_secs: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let discovery_url = env_required(OIDC_DISCOVERY_URL_ENV)?;
        let issuer = env_required(OIDC_ISSUER_ENV)?;
        let audience = env_or_default(OIDC_AUDIENCE_ENV, DEFAULT_AUDIENCE);
        let allowed_algs =
            parse_algorithms(&env_or_default(OIDC_ALLOWED_ALGS_ENV, DEFAULT_ALLOWED_ALGS))
                .map_err(|reason| ConfigError::Invalid {
                    name: OIDC_ALLOWED_ALGS_ENV,
                    reason,
                })?;
        let jwks_host_rewrite = match env_optional(OIDC_JWKS_HOST_REWRITE_ENV) {
            Some(raw) => Some(HostRewrite::parse(&raw).map_err(|reason| ConfigError::Invalid {
                name: OIDC_JWKS_HOST_REWRITE_ENV,
                reason,
            })?),
            None => None,
        };

        Ok(Self {
            discovery_url,
            issuer,
            audience,
            allowed_algs,
            jwks_host_rewrite,
            http_timeout: Duration::from_secs(env_u64(
                OIDC_HTTP_TIMEOUT_SECS_ENV,
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            cache_ttl: Duration::from_secs(env_u64(
                OIDC_CACHE_TTL_SECS_ENV,
                DEFAULT_CACHE_TTL_SECS,
            )?),
            min_refresh_interval: Duration::from_secs(env_u64(
                OIDC_MIN_REFRESH_SECS_ENV,
                DEFAULT_MIN_REFRESH_SECS,
            )?),
            clock_skew_secs: env_u64(OIDC_CLOCK_SKEW_SECS_ENV, DEFAULT_CLOCK_SKEW_SECS)?,
        })
    }
}

/// Bind address for the HTTP listener.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default("HOST", DEFAULT_HOST);
        let port = env_or_default("PORT", &DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?;
        Ok(Self { host, port })
    }
}

/// Parses a comma-separated algorithm list (`RS256,ES256`).
fn parse_algorithms(raw: &str) -> Result<Vec<Algorithm>, String> {
    let mut algs = Vec::new();
    for name in raw.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let alg = Algorithm::from_str(name).map_err(|_| format!("unknown algorithm {name}"))?;
        if !algs.contains(&alg) {
            algs.push(alg);
        }
    }
    if algs.is_empty() {
        return Err("allowlist must name at least one algorithm".to_string());
    }
    Ok(algs)
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_optional(name).ok_or(ConfigError::Missing(name))
}

fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_optional(name) {
        Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
