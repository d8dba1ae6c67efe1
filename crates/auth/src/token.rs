//! Access-token codec.
//!
//! Tokens are JWT-shaped: `base64url(header).base64url(claims).signature`.
//! The issuer signs with HS256; clients only need [`decode`] to read the
//! claims for scheduling decisions and never verify the signature.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::AccessClaims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token must have three dot-separated segments, found {0}")]
    Malformed(usize),

    #[error("token payload is not valid base64")]
    Base64,

    #[error("token payload is not valid claims json: {0}")]
    Json(String),

    #[error("token signature rejected: {0}")]
    Signature(String),

    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Signs and verifies access tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn encode(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Decode and check the signature. Expiry is not enforced here; callers
    /// decide what an expired token means for them.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Signature(e.to_string()))
    }
}

/// Read the claims of a token without checking its signature.
pub fn decode(token: &str) -> Result<AccessClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(segments.len()));
    }

    let payload = segments[1];
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD.decode(payload))
        .map_err(|_| TokenError::Base64)?;

    serde_json::from_slice(&bytes).map_err(|e| TokenError::Json(e.to_string()))
}

/// True when the token is absent, undecodable, or `now >= exp`.
pub fn is_expired(token: Option<&str>, now: DateTime<Utc>) -> bool {
    match token.map(decode) {
        Some(Ok(claims)) => claims.is_expired_at(now),
        Some(Err(_)) | None => true,
    }
}

/// Remaining lifetime of a token (negative once expired).
pub fn time_to_expiry(token: &str, now: DateTime<Utc>) -> Result<Duration, TokenError> {
    decode(token).map(|claims| claims.time_to_expiry(now))
}
