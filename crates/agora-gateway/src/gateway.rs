use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use agora_access::{AccessError, AccessGate};
use agora_types::PermissionCode;
use agora_types::events::{ClientFrame, CloseReason, ServerEvent};
use agora_types::models::{Identity, NewMessage};
use agora_types::store::ChannelStore;

use crate::error::GatewayError;
use crate::registry::{ChannelRegistry, SessionHandle, SessionMessage};
use crate::session::{SessionEvent, SessionState};

/// Longest accepted message, in characters, after trimming.
pub const MAX_CONTENT_LEN: usize = 2000;

const SEND_DENIED: &str = "Permission refusée pour envoyer des messages";

/// What happened to one inbound frame. None of these end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Persisted and fanned out
    Broadcast { message_id: i64, delivered: usize },
    /// Blank content, dropped without notice
    Ignored,
    /// Sender lacks the send permission; told so with an `erreur` payload
    Denied,
    /// Content too long or unknown message kind; told so with an `erreur` payload
    Rejected,
}

/// State owned by one connection's task.
///
/// Dropping a session that joined a channel but was never closed (e.g. its
/// task was cancelled) still deregisters it and announces the departure.
pub struct Session {
    id: Uuid,
    channel_id: i64,
    state: SessionState,
    tx: mpsc::UnboundedSender<SessionMessage>,
    identity: Option<Identity>,
    /// Present while registered in the channel.
    handle: Option<SessionHandle>,
    registry: ChannelRegistry,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), GatewayError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GatewayError::Lifecycle(format!(
                "expected {:?}, session is {:?}",
                expected, self.state
            )))
        }
    }

    fn advance(&mut self, event: SessionEvent) -> Result<(), GatewayError> {
        self.state = self
            .state
            .next(event)
            .map_err(|e| GatewayError::Lifecycle(e.to_string()))?;
        Ok(())
    }

    fn label(&self) -> String {
        match &self.identity {
            Some(identity) => format!("{} ({})", identity.handle, self.id),
            None => self.id.to_string(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let registry = self.registry.clone();
        let channel_id = self.channel_id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("Session {} dropped while joined, releasing", handle.id());
                runtime.spawn(async move { release(&registry, &handle, channel_id).await });
            }
            Err(_) => warn!(
                "Session {} dropped outside a runtime, channel {} not notified",
                handle.id(),
                channel_id
            ),
        }
    }
}

/// Drives sessions through their lifecycle against the access gate, the
/// channel store and the registry.
#[derive(Clone)]
pub struct Gateway {
    gate: AccessGate,
    store: Arc<dyn ChannelStore>,
    registry: ChannelRegistry,
}

impl Gateway {
    pub fn new(gate: AccessGate, store: Arc<dyn ChannelStore>, registry: ChannelRegistry) -> Self {
        Self {
            gate,
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Start a session whose transport handshake was accepted. Everything
    /// queued on `tx` is meant for that transport's writer.
    pub fn open(
        &self,
        channel_id: i64,
        tx: mpsc::UnboundedSender<SessionMessage>,
    ) -> Result<Session, GatewayError> {
        let mut session = Session {
            id: Uuid::new_v4(),
            channel_id,
            state: SessionState::Connecting,
            tx,
            identity: None,
            handle: None,
            registry: self.registry.clone(),
        };
        session.advance(SessionEvent::Accepted)?;
        Ok(session)
    }

    /// Authenticate then join.
    pub async fn connect(&self, session: &mut Session, token: &str) -> Result<(), GatewayError> {
        self.authenticate(session, token).await?;
        self.join(session).await
    }

    pub async fn authenticate(&self, session: &mut Session, token: &str) -> Result<(), GatewayError> {
        session.expect_state(SessionState::Authenticating)?;

        let gate = self.gate.clone();
        let token = token.to_string();
        let identity = blocking(move || Ok(gate.authenticate(&token)?)).await?;

        debug!("Session {} authenticated as {}", session.id, identity.handle);
        session.identity = Some(identity);
        session.advance(SessionEvent::Authenticated)
    }

    /// Check the read permission and the channel, then register, welcome
    /// the session and announce it to the channel.
    pub async fn join(&self, session: &mut Session) -> Result<(), GatewayError> {
        session.expect_state(SessionState::AuthorizingJoin)?;
        let identity = session
            .identity
            .clone()
            .ok_or_else(|| GatewayError::Lifecycle("join before authentication".into()))?;
        let channel_id = session.channel_id;

        let gate = self.gate.clone();
        let store = self.store.clone();
        let who = identity.clone();
        let channel = blocking(move || {
            gate.require(&who, PermissionCode::READ_MESSAGES)?;

            let channel = store
                .find_channel_by_id(channel_id)
                .map_err(GatewayError::Store)?
                .ok_or(GatewayError::ChannelNotFound(channel_id))?;
            if !channel.active {
                return Err(GatewayError::ChannelInactive(channel_id));
            }
            if let Some(role) = &channel.min_role {
                gate.require_role(&who, role)?;
            }
            Ok(channel)
        })
        .await?;

        session.advance(SessionEvent::JoinGranted)?;

        let handle = SessionHandle::new(session.id, identity.member(), session.tx.clone());
        let occupancy = self.registry.register(handle.clone(), channel_id).await;
        session.handle = Some(handle.clone());
        info!(
            "{} joined #{} ({} connected)",
            session.label(),
            channel.name,
            occupancy
        );

        self.registry
            .send_direct(&handle, ServerEvent::welcome(&channel.name, channel_id, occupancy))
            .await;
        let occupancy = self.registry.count(channel_id).await;
        self.registry
            .broadcast(channel_id, ServerEvent::joined(&identity.handle, channel_id, occupancy))
            .await;

        session.advance(SessionEvent::Activated)
    }

    /// Process one inbound text frame of an active session.
    ///
    /// Refusals are reported to the sender and keep the session open.
    /// Errors are faults that should end it.
    pub async fn handle_frame(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<FrameOutcome, GatewayError> {
        session.expect_state(SessionState::Active)?;
        let (identity, handle) = match (&session.identity, &session.handle) {
            (Some(identity), Some(handle)) => (identity.clone(), handle.clone()),
            _ => return Err(GatewayError::Lifecycle("active session without identity".into())),
        };
        let channel_id = session.channel_id;

        let frame: ClientFrame =
            serde_json::from_str(text).map_err(|e| GatewayError::MalformedFrame(e.to_string()))?;

        let gate = self.gate.clone();
        let who = identity.clone();
        let allowed = blocking(move || match gate.require(&who, PermissionCode::SEND_MESSAGES) {
            Ok(()) => Ok(true),
            Err(AccessError::PermissionDenied(_)) => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await?;

        let content = frame.content();
        let outcome = if !allowed {
            warn!("{} tried to send without permission", session.label());
            self.registry
                .send_direct(&handle, ServerEvent::error(SEND_DENIED))
                .await;
            FrameOutcome::Denied
        } else if content.is_empty() {
            FrameOutcome::Ignored
        } else if let Err(name) = frame.kind() {
            debug!("{} sent unknown message kind {:?}", session.label(), name);
            self.registry
                .send_direct(
                    &handle,
                    ServerEvent::error(format!("Type de message inconnu : {name}")),
                )
                .await;
            FrameOutcome::Rejected
        } else if content.chars().count() > MAX_CONTENT_LEN {
            self.registry
                .send_direct(
                    &handle,
                    ServerEvent::error(format!(
                        "Message trop long ({MAX_CONTENT_LEN} caractères maximum)"
                    )),
                )
                .await;
            FrameOutcome::Rejected
        } else {
            let message = NewMessage {
                content: content.to_string(),
                author_id: identity.id,
                channel_id,
                kind: frame.kind().unwrap_or_default(),
                attachment_url: frame.attachment_url.clone(),
            };
            let store = self.store.clone();
            let stored =
                blocking(move || store.persist_message(message).map_err(GatewayError::Store))
                    .await?;

            let delivered = self
                .registry
                .broadcast(
                    channel_id,
                    ServerEvent::Message {
                        id: stored.id,
                        content: stored.content,
                        channel_id,
                        author: identity.member(),
                        created_at: stored.created_at,
                        edited: stored.edited,
                    },
                )
                .await;
            FrameOutcome::Broadcast {
                message_id: stored.id,
                delivered,
            }
        };

        session.advance(SessionEvent::FrameHandled)?;
        Ok(outcome)
    }

    /// Move the session to `Closed` from wherever it is.
    ///
    /// A session that had joined is deregistered and its departure announced.
    /// The transport writer is told to emit a close frame with `reason`.
    /// Closing an already closed session does nothing.
    pub async fn close(&self, session: &mut Session, reason: CloseReason) {
        if session.state.is_terminal() {
            return;
        }
        if session.state != SessionState::Closing {
            if let Err(e) = session.advance(SessionEvent::Close) {
                warn!("{}", e);
            }
        }

        // Cleared only once released, so a cancellation mid-release still
        // leaves the handle to `Drop`.
        if let Some(handle) = session.handle.clone() {
            release(&self.registry, &handle, session.channel_id).await;
            session.handle = None;
        }

        // The writer may already be gone with the transport.
        let _ = session.tx.send(SessionMessage::Close(reason));

        if let Err(e) = session.advance(SessionEvent::Released) {
            warn!("{}", e);
        }
        info!(
            "Session {} closed ({:?}, code {})",
            session.label(),
            reason,
            reason.code()
        );
    }
}

/// Deregister a joined session and tell the channel it left.
async fn release(registry: &ChannelRegistry, handle: &SessionHandle, channel_id: i64) {
    registry.deregister(handle, channel_id).await;
    let occupancy = registry.count(channel_id).await;
    registry
        .broadcast(
            channel_id,
            ServerEvent::left(&handle.member().handle, channel_id, occupancy),
        )
        .await;
}

/// Run a store-bound closure on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, GatewayError>
where
    F: FnOnce() -> Result<T, GatewayError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GatewayError::Store(anyhow::anyhow!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use agora_access::AccessConfig;
    use agora_db::Database;
    use agora_types::models::Member;

    use super::*;

    fn gateway() -> Gateway {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let gate = AccessGate::new(&AccessConfig::new("unit"), db.clone());
        Gateway::new(gate, db, ChannelRegistry::new())
    }

    /// A session registered in `channel` and marked active, bypassing the store.
    async fn joined(
        gateway: &Gateway,
        id: i64,
        handle: &str,
        channel: i64,
    ) -> (Session, mpsc::UnboundedReceiver<SessionMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = gateway.open(channel, tx).unwrap();
        let member = Member {
            id,
            handle: handle.into(),
            first_name: None,
            last_name: None,
        };
        let registered = SessionHandle::new(session.id, member, session.tx.clone());
        gateway.registry.register(registered.clone(), channel).await;
        session.handle = Some(registered);
        session.state = SessionState::Active;
        (session, rx)
    }

    fn left_notices(rx: &mut mpsc::UnboundedReceiver<SessionMessage>) -> Vec<usize> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let SessionMessage::Event(ServerEvent::Notification { message, occupancy, .. }) = msg {
                if message.ends_with("a quitté le canal") {
                    out.push(occupancy);
                }
            }
        }
        out
    }

    #[tokio::test]
    async fn open_starts_authenticating() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = gateway().open(1, tx).unwrap();
        assert_eq!(session.state(), SessionState::Authenticating);
    }

    #[tokio::test]
    async fn close_cancelled_mid_release_still_releases_on_drop() {
        let gateway = gateway();
        let (mut alice, _alice_rx) = joined(&gateway, 1, "alice", 7).await;
        let (_bob, mut bob_rx) = joined(&gateway, 2, "bob", 7).await;
        left_notices(&mut bob_rx);

        // Hold the table so the release inside `close` cannot proceed.
        let table = gateway.registry.channels.write().await;
        {
            let mut close = Box::pin(gateway.close(&mut alice, CloseReason::Normal));
            assert!(futures_util::poll!(close.as_mut()).is_pending());
        }
        drop(table);
        assert_eq!(alice.state(), SessionState::Closing);

        drop(alice);
        for _ in 0..50 {
            if gateway.registry.count(7).await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(gateway.registry.count(7).await, 1);
        assert_eq!(left_notices(&mut bob_rx), vec![1]);
    }

    #[tokio::test]
    async fn completed_close_leaves_nothing_for_drop() {
        let gateway = gateway();
        let (mut alice, _alice_rx) = joined(&gateway, 1, "alice", 7).await;
        let (_bob, mut bob_rx) = joined(&gateway, 2, "bob", 7).await;
        left_notices(&mut bob_rx);

        gateway.close(&mut alice, CloseReason::Normal).await;
        drop(alice);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(left_notices(&mut bob_rx), vec![1]);
    }
}
