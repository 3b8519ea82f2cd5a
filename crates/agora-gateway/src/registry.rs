use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use agora_types::events::{CloseReason, ServerEvent};
use agora_types::models::Member;

/// What a session's transport writer receives.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    Event(ServerEvent),
    /// Emit a close frame and stop writing
    Close(CloseReason),
}

/// One live session as the registry sees it: an id, who it is, and the
/// queue feeding its transport writer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    member: Member,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    pub fn new(id: Uuid, member: Member, tx: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self { id, member, tx }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    /// Fails once the transport writer is gone.
    fn deliver(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<SessionMessage>> {
        self.tx.send(SessionMessage::Event(event))
    }
}

/// Tracks the live sessions of every channel and fans payloads out to them.
///
/// This is the only place the channel -> sessions table is mutated. A
/// channel's entry exists exactly while it has at least one session.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    pub(crate) channels: Arc<RwLock<HashMap<i64, Vec<SessionHandle>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to a channel, creating the entry on first join.
    /// Returns the channel's occupancy afterwards.
    pub async fn register(&self, session: SessionHandle, channel_id: i64) -> usize {
        let mut channels = self.channels.write().await;
        let sessions = channels.entry(channel_id).or_default();
        if !sessions.iter().any(|s| s.id == session.id) {
            sessions.push(session);
        }
        sessions.len()
    }

    /// Remove a session; drops the channel entry once empty.
    /// Unknown sessions and channels are a no-op. Returns whether anything was removed.
    pub async fn deregister(&self, session: &SessionHandle, channel_id: i64) -> bool {
        self.remove(session.id, channel_id).await
    }

    async fn remove(&self, session_id: Uuid, channel_id: i64) -> bool {
        let mut channels = self.channels.write().await;
        let Some(sessions) = channels.get_mut(&channel_id) else {
            return false;
        };

        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        let removed = sessions.len() != before;

        if sessions.is_empty() {
            channels.remove(&channel_id);
        }
        removed
    }

    /// Deliver `event` to every session of the channel.
    ///
    /// Iterates a snapshot taken under the lock, so sessions joining or
    /// leaving meanwhile don't disturb the fan-out. A session whose delivery
    /// fails is deregistered and the rest still receive the event. Returns
    /// the number of successful deliveries.
    pub async fn broadcast(&self, channel_id: i64, event: ServerEvent) -> usize {
        let snapshot = match self.channels.read().await.get(&channel_id) {
            Some(sessions) => sessions.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for session in &snapshot {
            match session.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    warn!(
                        "Delivery to {} ({}) on channel {} failed, dropping session",
                        session.member.handle, session.id, channel_id
                    );
                    failed.push(session.id);
                }
            }
        }

        for session_id in failed {
            self.remove(session_id, channel_id).await;
        }

        delivered
    }

    /// Deliver to one session. Failures are logged only; the session's own
    /// receive loop decides what to do about a dead peer.
    pub async fn send_direct(&self, session: &SessionHandle, event: ServerEvent) -> bool {
        match session.deliver(event) {
            Ok(()) => true,
            Err(_) => {
                debug!("Direct delivery to {} ({}) failed", session.member.handle, session.id);
                false
            }
        }
    }

    pub async fn count(&self, channel_id: i64) -> usize {
        self.channels
            .read()
            .await
            .get(&channel_id)
            .map_or(0, Vec::len)
    }

    /// Members currently connected to the channel.
    pub async fn list(&self, channel_id: i64) -> Vec<Member> {
        self.channels
            .read()
            .await
            .get(&channel_id)
            .map(|sessions| sessions.iter().map(|s| s.member.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of channels with at least one session.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}
