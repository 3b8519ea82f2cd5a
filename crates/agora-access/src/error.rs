//! Access error types.

use agora_types::PermissionCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    /// Malformed, badly signed or expired bearer token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("identity is inactive: {0}")]
    InactiveIdentity(String),

    #[error("permission denied: {0} required")]
    PermissionDenied(PermissionCode),

    #[error("role required: {0}")]
    RoleRequired(String),

    /// The server could not sign a token.
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AccessError {
    /// True for failures caused by the caller rather than by the backend.
    pub fn is_refusal(&self) -> bool {
        !matches!(self, Self::Signing(_) | Self::Store(_))
    }
}
