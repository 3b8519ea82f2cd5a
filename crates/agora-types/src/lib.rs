//! Shared types for the Agora chat backend.
//!
//! Everything that crosses a crate boundary lives here: the identity and
//! channel snapshots read from storage, the permission vocabulary, the
//! WebSocket payloads and the REST request/response bodies.

pub mod api;
pub mod events;
pub mod models;
pub mod permissions;
pub mod store;

pub use permissions::{PermissionCode, PermissionSet};
