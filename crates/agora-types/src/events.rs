use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Member, MessageKind};

/// Payloads sent FROM server TO client over a channel WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Welcome sent to the joining session only
    Connexion {
        message: String,
        #[serde(rename = "canal_id")]
        channel_id: i64,
        #[serde(rename = "utilisateurs_connectes")]
        occupancy: usize,
    },

    /// Someone joined or left the channel
    Notification {
        message: String,
        #[serde(rename = "canal_id")]
        channel_id: i64,
        #[serde(rename = "utilisateurs_connectes")]
        occupancy: usize,
    },

    /// A persisted chat message
    Message {
        id: i64,
        #[serde(rename = "contenu")]
        content: String,
        #[serde(rename = "canal_id")]
        channel_id: i64,
        #[serde(rename = "auteur")]
        author: Member,
        #[serde(rename = "date_creation")]
        created_at: DateTime<Utc>,
        #[serde(rename = "est_modifie")]
        edited: bool,
    },

    /// A frame from this session was refused
    Erreur { message: String },
}

impl ServerEvent {
    pub fn welcome(channel_name: &str, channel_id: i64, occupancy: usize) -> Self {
        Self::Connexion {
            message: format!("Bienvenue dans le canal #{channel_name}"),
            channel_id,
            occupancy,
        }
    }

    pub fn joined(handle: &str, channel_id: i64, occupancy: usize) -> Self {
        Self::Notification {
            message: format!("{handle} a rejoint le canal"),
            channel_id,
            occupancy,
        }
    }

    pub fn left(handle: &str, channel_id: i64, occupancy: usize) -> Self {
        Self::Notification {
            message: format!("{handle} a quitté le canal"),
            channel_id,
            occupancy,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Erreur {
            message: message.into(),
        }
    }
}

/// Frame sent FROM client TO server: one chat message.
///
/// Missing or null fields are tolerated and unknown fields ignored. The
/// message kind is kept as sent and checked by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "contenu", default)]
    pub content: Option<String>,
    #[serde(rename = "type_message", default)]
    pub kind: Option<String>,
    #[serde(rename = "url_fichier", default)]
    pub attachment_url: Option<String>,
}

impl ClientFrame {
    /// Trimmed content; empty when absent or null.
    pub fn content(&self) -> &str {
        self.content.as_deref().map_or("", str::trim)
    }

    /// The requested kind, `texte` when absent. `Err` carries an unknown name.
    pub fn kind(&self) -> Result<MessageKind, &str> {
        match self.kind.as_deref() {
            None => Ok(MessageKind::default()),
            Some(name) => MessageKind::from_wire(name).ok_or(name),
        }
    }
}

/// Why the server closed a channel WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client hung up
    Normal,
    /// Authentication, authorization or channel lookup failed
    PolicyViolation,
    /// Unhandled fault while serving the session
    InternalError,
}

impl CloseReason {
    pub fn code(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::PolicyViolation => 1008,
            Self::InternalError => 1011,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_wire_shape() {
        let json = serde_json::to_value(ServerEvent::joined("alice", 1, 2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "notification",
                "message": "alice a rejoint le canal",
                "canal_id": 1,
                "utilisateurs_connectes": 2,
            })
        );
    }

    #[test]
    fn message_wire_shape() {
        let created_at = "2026-01-02T03:04:05Z".parse().unwrap();
        let event = ServerEvent::Message {
            id: 7,
            content: "hello".into(),
            channel_id: 1,
            author: Member {
                id: 3,
                handle: "alice".into(),
                first_name: Some("Alice".into()),
                last_name: None,
            },
            created_at,
            edited: false,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["contenu"], "hello");
        assert_eq!(json["auteur"]["nom_utilisateur"], "alice");
        assert_eq!(json["auteur"]["prenom"], "Alice");
        assert_eq!(json["est_modifie"], false);
        assert_eq!(json["date_creation"], "2026-01-02T03:04:05Z");
    }

    #[test]
    fn client_frame_defaults() {
        let frame: ClientFrame = serde_json::from_str(r#"{"contenu":"  salut "}"#).unwrap();
        assert_eq!(frame.content(), "salut");
        assert_eq!(frame.kind(), Ok(MessageKind::Texte));
        assert!(frame.attachment_url.is_none());

        let frame: ClientFrame = serde_json::from_str("{}").unwrap();
        assert_eq!(frame.content(), "");
    }

    #[test]
    fn client_frame_is_lenient() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"contenu":null,"type_message":null,"extra":1}"#).unwrap();
        assert_eq!(frame.content(), "");
        assert_eq!(frame.kind(), Ok(MessageKind::Texte));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"contenu":"x","type_message":"video"}"#).unwrap();
        assert_eq!(frame.kind(), Err("video"));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"contenu":"x","type_message":"image"}"#).unwrap();
        assert_eq!(frame.kind(), Ok(MessageKind::Image));
    }

    #[test]
    fn client_frame_rejects_non_string_content() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"contenu":42}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>("[]").is_err());
    }

    #[test]
    fn close_codes() {
        assert_eq!(CloseReason::PolicyViolation.code(), 1008);
        assert_eq!(CloseReason::InternalError.code(), 1011);
    }
}
