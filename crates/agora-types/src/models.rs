use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permissions::PermissionCode;

/// Role reference carried by an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: i64,
    pub name: String,
}

/// Snapshot of a user account, read at authentication time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub handle: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub role: Option<RoleRef>,
}

impl Identity {
    pub fn member(&self) -> Member {
        Member {
            id: self.id,
            handle: self.handle.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

/// Public summary of an identity, as shown to other channel members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    #[serde(rename = "nom_utilisateur")]
    pub handle: String,
    #[serde(rename = "prenom")]
    pub first_name: Option<String>,
    #[serde(rename = "nom")]
    pub last_name: Option<String>,
}

/// A permission row joined through `roles_permissions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub code: PermissionCode,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    /// Role name required to join, if any.
    pub min_role: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Texte,
    Image,
    Fichier,
    Systeme,
}

impl MessageKind {
    /// Parse a wire name (`texte`, `image`, ...). Unknown names give `None`.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "texte" => Some(Self::Texte),
            "image" => Some(Self::Image),
            "fichier" => Some(Self::Fichier),
            "systeme" => Some(Self::Systeme),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Texte => "texte",
            Self::Image => "image",
            Self::Fichier => "fichier",
            Self::Systeme => "systeme",
        }
    }
}

/// A message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub author_id: i64,
    pub channel_id: i64,
    pub kind: MessageKind,
    pub attachment_url: Option<String>,
}

/// A persisted message, with the id and timestamp assigned by storage.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub channel_id: i64,
    pub kind: MessageKind,
    pub attachment_url: Option<String>,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
}
