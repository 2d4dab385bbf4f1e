//! Authentication types for the domain layer.
//!
//! An [`Identity`] is computed once at the edge of the system (the WebSocket
//! handshake or the HTTP auth extractor) from a verified token, then passed
//! explicitly into every operation that needs authorization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UserId;

/// Roles carried in access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Provider,
    User,
}

impl Role {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Provider => "provider",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthError;

    /// Case-insensitive: `ADMIN`, `Admin` and `admin` are the same role.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "provider" => Ok(Role::Provider),
            "user" => Ok(Role::User),
            _ => Err(AuthError::UnknownRole(s.to_string())),
        }
    }
}

/// Authenticated caller extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Token subject.
    pub subject: UserId,

    /// Normalized, de-duplicated roles.
    pub roles: Vec<Role>,
}

impl Identity {
    /// Creates an identity with an explicit role list.
    pub fn new(subject: UserId, roles: impl IntoIterator<Item = Role>) -> Self {
        let mut normalized: Vec<Role> = Vec::new();
        for role in roles {
            if !normalized.contains(&role) {
                normalized.push(role);
            }
        }
        Self {
            subject,
            roles: normalized,
        }
    }

    /// Builds an identity from raw role strings as they appear in token
    /// claims. Unrecognised roles are dropped rather than failing the login.
    pub fn from_claims<S: AsRef<str>>(subject: UserId, raw_roles: &[S]) -> Self {
        let roles = raw_roles
            .iter()
            .filter_map(|r| match r.as_ref().parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    tracing::debug!(role = r.as_ref(), "Ignoring unknown role claim");
                    None
                }
            });
        Self::new(subject, roles)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Authentication errors that can occur during token validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No token was supplied.
    #[error("Token required")]
    TokenRequired,

    /// The token is malformed, has a bad signature, or is expired.
    #[error("Authentication failed")]
    InvalidToken,

    /// The subject claim is not a valid user id.
    #[error("Invalid subject claim: {0}")]
    InvalidSubject(String),

    /// A role string that does not map to a known role.
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Authenticated, but lacking the role for this action.
    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl AuthError {
    /// Returns true if the caller should obtain a new token.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::TokenRequired | AuthError::InvalidToken | AuthError::InvalidSubject(_)
        )
    }
}
