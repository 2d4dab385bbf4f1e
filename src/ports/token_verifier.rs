//! TokenVerifier port - Turns a bearer token into an [`Identity`].

use crate::domain::foundation::{AuthError, Identity};

/// Verifies access tokens presented by clients.
///
/// Verification is local (signature and expiry), so the port is synchronous.
pub trait TokenVerifier: Send + Sync {
    /// Verifies `token` and returns the caller's identity.
    ///
    /// # Errors
    ///
    /// - `TokenRequired` if the token is empty
    /// - `InvalidToken` if it is malformed, forged, or expired
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}
