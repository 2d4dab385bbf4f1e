//! HS256 JWT token verifier.
//!
//! Tokens are issued elsewhere; this adapter only checks the signature and
//! expiry and maps the claims to an [`Identity`].

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, Identity, UserId};
use crate::ports::TokenVerifier;

/// Claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - the numeric user id.
    pub sub: Subject,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Role names, any case.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Expiry (Unix epoch seconds).
    pub exp: i64,
}

/// Token issuers disagree on whether `sub` is a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    Number(i64),
    Text(String),
}

impl Subject {
    fn to_user_id(&self) -> Result<UserId, AuthError> {
        let raw = match self {
            Subject::Number(n) => *n,
            Subject::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| AuthError::InvalidSubject(s.clone()))?,
        };
        UserId::new(raw).map_err(|_| AuthError::InvalidSubject(raw.to_string()))
    }
}

/// Verifies HS256-signed access tokens.
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(secret: &SecretString, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_exp = true;
        // `sub` is checked by `Subject::to_user_id`; the library only
        // recognizes string subjects.
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::TokenRequired);
        }

        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("Token expired"),
                    _ => tracing::debug!(error = %e, "Token validation failed"),
                }
                AuthError::InvalidToken
            },
        )?;

        let subject = data.claims.sub.to_user_id().map_err(|e| {
            tracing::warn!(error = %e, "Token subject is not a user id");
            AuthError::InvalidToken
        })?;

        Ok(Identity::from_claims(subject, &data.claims.roles))
    }
}

impl std::fmt::Debug for JwtTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenVerifier")
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

/// Signs `claims` with HS256. Used by tests and local tooling.
pub fn encode_access_token(
    claims: &AccessClaims,
    secret: &SecretString,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
}
