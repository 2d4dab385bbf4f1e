//! Authentication adapters.
//!
//! Implementations of the `TokenVerifier` port:
//!
//! - `jwt` - HS256 JWT verification for production
//! - `mock` - Fixed token table for tests

mod jwt;
mod mock;

pub use jwt::{encode_access_token, AccessClaims, JwtTokenVerifier, Subject};
pub use mock::MockTokenVerifier;
