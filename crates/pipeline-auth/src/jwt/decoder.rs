//! Token verification.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use pipeline_core::config::auth::AuthConfig;

use super::claims::TokenClaims;

/// Why a token could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    Expired,
    Invalid,
}

impl DecodeFailure {
    /// Message reported to callers.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Expired => "Token expired",
            Self::Invalid => "Invalid token",
        }
    }
}

/// Verifies signature and expiry of HS256 tokens.
#[derive(Clone)]
pub struct TokenDecoder {
    decoding_key: DecodingKey,
    validation: Validation,
    /// Same rules without the expiry check, used when revoking.
    lenient: Validation,
}

impl std::fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenDecoder {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;

        let mut lenient = validation.clone();
        lenient.validate_exp = false;

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            lenient,
        }
    }

    /// Decode and verify a token, including its expiry.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, DecodeFailure> {
        self.decode_with(token, &self.validation)
    }

    /// Decode and verify the signature of a token that may have expired.
    pub fn decode_ignoring_expiry(&self, token: &str) -> Result<TokenClaims, DecodeFailure> {
        self.decode_with(token, &self.lenient)
    }

    fn decode_with(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<TokenClaims, DecodeFailure> {
        decode::<TokenClaims>(token, &self.decoding_key, validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => DecodeFailure::Expired,
                _ => DecodeFailure::Invalid,
            })
    }
}
