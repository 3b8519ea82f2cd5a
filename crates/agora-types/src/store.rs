//! Narrow interfaces onto the persistence layer.
//!
//! Implementations are synchronous; async callers run them on the blocking pool.

use anyhow::Result;

use crate::models::{Channel, Identity, NewMessage, Permission, StoredMessage};

/// User and role lookups needed to authenticate and authorize.
pub trait IdentityStore: Send + Sync {
    fn find_identity_by_handle(&self, handle: &str) -> Result<Option<Identity>>;

    /// Every permission associated to the role, active or not.
    fn role_permissions(&self, role_id: i64) -> Result<Vec<Permission>>;
}

/// Channel lookups and message durability for the gateway.
pub trait ChannelStore: Send + Sync {
    fn find_channel_by_id(&self, id: i64) -> Result<Option<Channel>>;

    fn persist_message(&self, message: NewMessage) -> Result<StoredMessage>;
}
