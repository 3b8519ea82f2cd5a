//! Real-time channel gateway.
//!
//! - [`registry`]: which sessions listen to which channel, and fan-out
//! - [`session`]: the per-connection lifecycle as an explicit state machine
//! - [`gateway`]: authenticate, authorize, join, relay messages, clean up
//! - [`connection`]: the axum WebSocket transport driving a session

pub mod connection;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod session;

pub use error::GatewayError;
pub use gateway::{FrameOutcome, Gateway, Session};
pub use registry::{ChannelRegistry, SessionHandle, SessionMessage};
pub use session::{SessionEvent, SessionState};
