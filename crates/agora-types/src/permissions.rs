use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A permission code as stored in the `permissions` table (`lire_messages`, ...).
///
/// The vocabulary is seed data, not a closed enum: new codes can be added in
/// storage without a rebuild. The well-known codes the gateway and the REST
/// layer check are exposed as constants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionCode(String);

impl PermissionCode {
    pub const READ_USERS: &'static str = "lire_utilisateurs";
    pub const CREATE_USERS: &'static str = "creer_utilisateurs";
    pub const UPDATE_USERS: &'static str = "modifier_utilisateurs";
    pub const DELETE_USERS: &'static str = "supprimer_utilisateurs";
    pub const READ_ROLES: &'static str = "lire_roles";
    pub const MANAGE_ROLES: &'static str = "gerer_roles";
    pub const READ_PERMISSIONS: &'static str = "lire_permissions";
    pub const MANAGE_PERMISSIONS: &'static str = "gerer_permissions";
    pub const READ_CHANNELS: &'static str = "lire_canaux";
    pub const CREATE_CHANNELS: &'static str = "creer_canaux";
    pub const UPDATE_CHANNELS: &'static str = "modifier_canaux";
    pub const DELETE_CHANNELS: &'static str = "supprimer_canaux";
    pub const READ_MESSAGES: &'static str = "lire_messages";
    pub const SEND_MESSAGES: &'static str = "envoyer_messages";
    pub const UPDATE_MESSAGES: &'static str = "modifier_messages";
    pub const DELETE_MESSAGES: &'static str = "supprimer_messages";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the code belongs to the seeded vocabulary.
    pub fn is_known(&self) -> bool {
        VOCABULARY.iter().any(|(code, _, _)| *code == self.0)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PermissionCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Seeded permission vocabulary: (code, display name, category).
pub const VOCABULARY: &[(&str, &str, &str)] = &[
    (PermissionCode::READ_USERS, "Lire les utilisateurs", "utilisateurs"),
    (PermissionCode::CREATE_USERS, "Créer des utilisateurs", "utilisateurs"),
    (PermissionCode::UPDATE_USERS, "Modifier des utilisateurs", "utilisateurs"),
    (PermissionCode::DELETE_USERS, "Supprimer des utilisateurs", "utilisateurs"),
    (PermissionCode::READ_ROLES, "Lire les rôles", "roles"),
    (PermissionCode::MANAGE_ROLES, "Gérer les rôles", "roles"),
    (PermissionCode::READ_PERMISSIONS, "Lire les permissions", "permissions"),
    (PermissionCode::MANAGE_PERMISSIONS, "Gérer les permissions", "permissions"),
    (PermissionCode::READ_CHANNELS, "Lire les canaux", "canaux"),
    (PermissionCode::CREATE_CHANNELS, "Créer des canaux", "canaux"),
    (PermissionCode::UPDATE_CHANNELS, "Modifier des canaux", "canaux"),
    (PermissionCode::DELETE_CHANNELS, "Supprimer des canaux", "canaux"),
    (PermissionCode::READ_MESSAGES, "Lire les messages", "messages"),
    (PermissionCode::SEND_MESSAGES, "Envoyer des messages", "messages"),
    (PermissionCode::UPDATE_MESSAGES, "Modifier des messages", "messages"),
    (PermissionCode::DELETE_MESSAGES, "Supprimer des messages", "messages"),
];

/// The effective permissions of one identity, as resolved through its role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionCode>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c.as_str() == code)
    }

    pub fn insert(&mut self, code: PermissionCode) -> bool {
        self.0.insert(code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionCode> {
        self.0.iter()
    }
}

impl FromIterator<PermissionCode> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
