// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require a valid token:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! When the route is already behind the gate middleware, the extractor picks
//! the identity out of request extensions; otherwise it runs the same
//! extraction + verification itself. Role requirements stay with the
//! middleware - a bare `Auth` means "any valid token".

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::state::AppState;

use super::claims::AuthenticatedUser;
use super::error::AuthError;

/// Extractor for authenticated users.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(Auth(user): Auth) -> Json<MeResponse> {
///     // user.user_id, user.roles, user.claims
/// }
/// ```
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // The gate middleware may already have verified this request.
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = bearer_token(&parts.headers)?;
        let claims = state.verifier.verify(token).await?;
        Ok(Auth(AuthenticatedUser::from_claims(claims)))
    }
}

/// Pulls the bearer token out of the `Authorization` header.
///
/// Anything other than exactly `Bearer <token>` - absent header, another
/// scheme, a lowercase scheme, an empty credential - is `MissingCredential`.
/// This never touches the network, so requests without credentials cost the
/// identity provider nothing.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let token = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MissingCredential)?
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingCredential)?;

    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_keys::{self, TEST_KID};
    use crate::auth::TokenVerifier;
    use crate::config::AuthConfig;
    use axum::http::Request;
    use jsonwebtoken::Algorithm;
    use std::time::Duration;

    /// State whose provider endpoint is unroutable. Tests that must not
    /// contact the provider use this: had a fetch been attempted, the error
    /// would read `DiscoveryUnavailable` instead of the asserted one.
    fn offline_state() -> AppState {
        let config = AuthConfig {
            discovery_url: "http://127.0.0.1:9/.well-known/openid-configuration".to_string(),
            issuer: test_keys::TEST_ISSUER.to_string(),
            audience: test_keys::TEST_AUDIENCE.to_string(),
            allowed_algs: vec![Algorithm::RS256],
            jwks_host_rewrite: None,
            http_timeout: Duration::from_millis(200),
            cache_ttl: Duration::from_secs(300),
            min_refresh_interval: Duration::ZERO,
            clock_skew_secs: 0,
        };
        AppState::new(TokenVerifier::new(&config).unwrap())
    }

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn missing_header_is_missing_credential() {
        let state = offline_state();
        let mut parts = parts_with_header(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredential)));
    }

    #[tokio::test]
    async fn non_bearer_schemes_are_missing_credential() {
        let state = offline_state();
        for value in ["Basic dXNlcjpwdw==", "bearer abc", "Bearer", "Bearer ", "Token abc"] {
            let mut parts = parts_with_header(Some(value));
            let result = Auth::from_request_parts(&mut parts, &state).await;
            assert!(
                matches!(result, Err(AuthError::MissingCredential)),
                "header {value:?}"
            );
        }
    }

    #[tokio::test]
    async fn garbage_token_fails_before_any_provider_contact() {
        let state = offline_state();
        let mut parts = parts_with_header(Some("Bearer not-a-jwt"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn extractor_prefers_extensions() {
        // No header at all: the identity planted by the middleware wins.
        let state = offline_state();
        let mut parts = parts_with_header(None);

        let claims: crate::auth::Claims =
            serde_json::from_value(test_keys::standard_claims(&["user"])).unwrap();
        parts.extensions.insert(AuthenticatedUser::from_claims(claims));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert_eq!(result.unwrap().0.user_id, "user-1");
    }

    #[tokio::test]
    async fn extractor_verifies_against_the_provider() {
        let fixture = test_keys::spawn_idp(&[TEST_KID]).await;
        let state = AppState::new(TokenVerifier::new(&fixture.auth_config()).unwrap());

        let token = test_keys::mint_token(Some(TEST_KID), &test_keys::standard_claims(&["user"]));
        let mut parts = parts_with_header(Some(&format!("Bearer {token}")));

        let user = Auth::from_request_parts(&mut parts, &state).await.unwrap().0;
        assert_eq!(user.user_id, "user-1");
        assert!(user.has_role("user"));
    }
}
