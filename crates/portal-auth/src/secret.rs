use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::Deserialize;
use tracing::warn;

use crate::error::SecretError;

pub const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Production,
    Development,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RunMode::Production),
            "development" | "dev" => Ok(RunMode::Development),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// HMAC key for session tokens. `Debug` never prints the key.
#[derive(Clone)]
pub struct TokenSecret(Vec<u8>);

impl TokenSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn ephemeral() -> Self {
        let mut bytes = [0u8; 48];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes).into_bytes())
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSecret(<{} bytes>)", self.0.len())
    }
}

/// Pick the signing secret at startup.
///
/// A configured, non-empty secret always wins. Without one, production
/// refuses to start and development gets a random per-process secret, so
/// tokens never fall back to a key anyone could know.
pub fn resolve_secret(configured: Option<&str>, mode: RunMode) -> Result<TokenSecret, SecretError> {
    let configured = configured.map(str::trim).filter(|s| !s.is_empty());

    match (configured, mode) {
        (Some(secret), RunMode::Production) if secret.len() < MIN_PRODUCTION_SECRET_LEN => {
            Err(SecretError::TooShort {
                len: secret.len(),
                min: MIN_PRODUCTION_SECRET_LEN,
            })
        }
        (Some(secret), _) => Ok(TokenSecret::new(secret)),
        (None, RunMode::Production) => Err(SecretError::Missing),
        (None, RunMode::Development) => {
            warn!("no token secret configured, generated an ephemeral one; sessions will not survive a restart");
            Ok(TokenSecret::ephemeral())
        }
    }
}
