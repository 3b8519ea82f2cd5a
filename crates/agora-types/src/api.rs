use serde::{Deserialize, Serialize};

use crate::models::Member;
use crate::permissions::PermissionSet;

// -- Token claims --

/// Bearer token claims. `sub` is the user handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub nom_utilisateur: String,
    pub mot_de_passe: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub ancien_mot_de_passe: String,
    pub nouveau_mot_de_passe: String,
}

/// Plain confirmation body.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub member: Member,
    pub role: Option<String>,
    pub permissions: PermissionSet,
}

// -- Roster --

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub canal_id: i64,
    pub nombre_utilisateurs: usize,
    pub utilisateurs: Vec<Member>,
}
