//! Token signing configuration.

use serde::{Deserialize, Serialize};

/// Settings for the HS256 access tokens issued by the token service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret.
    #[serde(default = "default_secret")]
    pub jwt_secret: String,
    /// Default token lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub token_expires_in_seconds: u64,
    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default)]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_secret(),
            token_expires_in_seconds: default_expires_in(),
            leeway_seconds: 0,
        }
    }
}

fn default_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_expires_in() -> u64 {
    3600
}
