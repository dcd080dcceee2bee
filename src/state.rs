// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state.

use crate::auth::TokenVerifier;

/// State handed to every handler and layer.
///
/// Cloning is cheap: the verifier shares its key-set cache across clones, so
/// all request tasks observe the same key-set generation.
#[derive(Debug, Clone)]
pub struct AppState {
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(verifier: TokenVerifier) -> Self {
        Self { verifier }
    }
}
