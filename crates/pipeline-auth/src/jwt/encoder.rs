//! Token signing.

use jsonwebtoken::{EncodingKey, Header, encode};

use pipeline_core::config::auth::AuthConfig;
use pipeline_core::error::AppError;

use super::claims::TokenClaims;

/// Signs claims with the shared HS256 secret.
#[derive(Clone)]
pub struct TokenEncoder {
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for TokenEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEncoder").finish_non_exhaustive()
    }
}

impl TokenEncoder {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Sign `claims` into a compact JWT.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
    }
}
