use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use agora_types::events::CloseReason;

use crate::gateway::Gateway;
use crate::registry::SessionMessage;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long the writer gets to flush the close frame once the session ended.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Drive one upgraded channel WebSocket from handshake to close.
///
/// The token comes from the upgrade request's query string. Refusals close
/// with 1008 and faults with 1011, before or after the join.
pub async fn handle_connection(
    socket: WebSocket,
    gateway: Gateway,
    channel_id: i64,
    token: String,
) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let pong_received = Arc::new(AtomicBool::new(true));
    let mut writer = tokio::spawn(write_loop(sender, rx, pong_received.clone()));
    let mut writer_done = false;

    let mut session = match gateway.open(channel_id, tx) {
        Ok(session) => session,
        Err(e) => {
            warn!("Channel {} session could not start: {}", channel_id, e);
            writer.abort();
            return;
        }
    };

    let reason = match gateway.connect(&mut session, &token).await {
        Err(e) => {
            warn!("Session {} refused on channel {}: {}", session.id(), channel_id, e);
            e.close_reason()
        }
        Ok(()) => loop {
            tokio::select! {
                frame = receiver.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match gateway.handle_frame(&mut session, &text).await {
                            Ok(outcome) => trace!("Session {} frame: {:?}", session.id(), outcome),
                            Err(e) => {
                                warn!(
                                    "Session {} failed: {} -- raw: {}",
                                    session.id(),
                                    e,
                                    preview(&text)
                                );
                                break e.close_reason();
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_received.store(true, Ordering::Release);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        warn!("Session {} sent {} binary bytes, ignored", session.id(), data.len());
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Normal,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Session {} transport error: {}", session.id(), e);
                        break CloseReason::InternalError;
                    }
                },
                _ = &mut writer => {
                    // Heartbeat timeout or the peer stopped accepting writes.
                    writer_done = true;
                    debug!("Session {} writer ended first", session.id());
                    break CloseReason::Normal;
                }
            }
        },
    };

    gateway.close(&mut session, reason).await;
    drop(session);

    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    info!("Channel {} connection finished ({})", channel_id, reason.code());
}

/// Forward queued session messages to the socket, with heartbeat.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<SessionMessage>,
    pong_received: Arc<AtomicBool>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(SessionMessage::Event(event)) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(SessionMessage::Close(reason)) => {
                    let frame = CloseFrame {
                        code: reason.code(),
                        reason: "".into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
                None => break,
            },
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
