use std::path::PathBuf;

use anyhow::{Context, Result};

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Run the idempotent seed at startup.
    pub seed: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let db_path = std::env::var("AGORA_DB_PATH").unwrap_or_else(|_| "agora.db".into());
        let host = std::env::var("AGORA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("AGORA_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("AGORA_PORT must be a port number")?;
        let seed = match std::env::var("AGORA_SEED") {
            Ok(v) => parse_flag(&v).context("AGORA_SEED must be true or false")?,
            Err(_) => true,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            host,
            port,
            seed,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
