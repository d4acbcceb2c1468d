// ABOUTME: Authentication boundary resolving request headers into a user id and plan
// ABOUTME: Session internals live outside this crate; only the interface is defined here
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Authentication Boundary
//!
//! Session and billing management are external collaborators. This module
//! defines only the contract the routes depend on: turn request headers into
//! an [`AuthContext`] carrying the caller's identity and resolved plan, or
//! fail with an authentication error.
//!
//! [`StaticTokenAuthenticator`] is the bearer-token implementation used by
//! the server binary and tests.

use async_trait::async_trait;
use http::HeaderMap;
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::plans::Plan;

/// Authenticated caller identity with resolved subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    /// Caller's user id
    pub user_id: Uuid,
    /// Subscription plan resolved from billing state
    pub plan: Plan,
}

/// Turns request headers into an authenticated context
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when no credentials are present and
    /// `AuthInvalid` when they do not resolve to a user.
    async fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthContext>;
}

/// Extract the bearer token from an `authorization` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Bearer-token authenticator over a fixed token table
///
/// Suitable for development and tests; production deployments plug in their
/// session system behind the same trait.
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, AuthContext>,
}

impl StaticTokenAuthenticator {
    /// Create an empty authenticator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token resolving to a fresh user with the given plan,
    /// returning the user id
    pub fn add_token(&mut self, token: impl Into<String>, plan: Plan) -> Uuid {
        let user_id = Uuid::new_v4();
        self.tokens
            .insert(token.into(), AuthContext { user_id, plan });
        user_id
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthContext> {
        let token = bearer_token(headers).ok_or_else(AppError::auth_required)?;
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| AppError::auth_invalid("Unknown session token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_header_is_auth_required() {
        let auth = StaticTokenAuthenticator::new();
        let err = auth.authenticate(&HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn test_known_token_resolves_plan() {
        let mut auth = StaticTokenAuthenticator::new();
        let user_id = auth.add_token("secret", Plan::Pro);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer secret".parse().unwrap());

        let ctx = auth.authenticate(&headers).await.unwrap();
        assert_eq!(ctx.user_id, user_id);
        assert_eq!(ctx.plan, Plan::Pro);
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let auth = StaticTokenAuthenticator::new();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer nope".parse().unwrap());
        let err = auth.authenticate(&headers).await.unwrap_err();
        assert_eq!(err.http_status(), 401);
    }
}
