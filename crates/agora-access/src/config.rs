//! Token signing configuration.

use std::str::FromStr;

use anyhow::{Result, bail};
use jsonwebtoken::Algorithm;

pub const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Shared HMAC secret for signing and verifying tokens.
    pub jwt_secret: String,
    pub algorithm: Algorithm,
    /// Lifetime of issued tokens, in minutes.
    pub token_ttl_minutes: i64,
}

impl AccessConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ..Self::default()
        }
    }

    /// Read `AGORA_JWT_SECRET`, `AGORA_JWT_ALGORITHM` and `AGORA_TOKEN_TTL_MINUTES`.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("AGORA_JWT_SECRET").unwrap_or_else(|_| DEV_SECRET.into());
        let algorithm = parse_algorithm(
            &std::env::var("AGORA_JWT_ALGORITHM").unwrap_or_else(|_| "HS256".into()),
        )?;
        let token_ttl_minutes: i64 = std::env::var("AGORA_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "30".into())
            .parse()?;
        if token_ttl_minutes <= 0 {
            bail!("AGORA_TOKEN_TTL_MINUTES must be positive");
        }

        Ok(Self {
            jwt_secret,
            algorithm,
            token_ttl_minutes,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_SECRET
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_SECRET.into(),
            algorithm: Algorithm::HS256,
            token_ttl_minutes: 30,
        }
    }
}

/// Only the symmetric HMAC family is accepted: the secret is shared.
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    let algorithm = Algorithm::from_str(name)?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => bail!("unsupported token algorithm {:?}, expected HS256/HS384/HS512", other),
    }
}
