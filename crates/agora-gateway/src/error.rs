use agora_access::AccessError;
use agora_types::events::CloseReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("channel not found: {0}")]
    ChannelNotFound(i64),

    #[error("channel is inactive: {0}")]
    ChannelInactive(i64),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("store error: {0}")]
    Store(anyhow::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid session transition: {0}")]
    Lifecycle(String),
}

impl GatewayError {
    /// Close reason sent to the peer when this error ends a session.
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Self::Access(e) if e.is_refusal() => CloseReason::PolicyViolation,
            Self::ChannelNotFound(_) | Self::ChannelInactive(_) => CloseReason::PolicyViolation,
            _ => CloseReason::InternalError,
        }
    }
}
