//! Mock token verifier for testing.
//!
//! # Example
//!
//! ```ignore
//! use bookwire::adapters::auth::MockTokenVerifier;
//! use bookwire::domain::foundation::Role;
//!
//! let verifier = MockTokenVerifier::new()
//!     .with_user("admin-token", 1, [Role::Admin])
//!     .with_user("provider-token", 7, [Role::Provider]);
//!
//! assert!(verifier.verify("admin-token").is_ok());
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{AuthError, Identity, Role, UserId};
use crate::ports::TokenVerifier;

/// Maps fixed token strings to identities. Unknown tokens are `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockTokenVerifier {
    tokens: RwLock<HashMap<String, Identity>>,
}

impl MockTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(self, token: impl Into<String>, identity: Identity) -> Self {
        self.add_token(token, identity);
        self
    }

    /// Adds a token for user `id` with the given roles.
    pub fn with_user(
        self,
        token: impl Into<String>,
        id: i64,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        self.with_identity(token, Identity::new(UserId::from_raw(id), roles))
    }

    /// Registers a token at runtime.
    pub fn add_token(&self, token: impl Into<String>, identity: Identity) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), identity);
    }

    pub fn remove_token(&self, token: &str) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }
}

impl TokenVerifier for MockTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::TokenRequired);
        }
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
