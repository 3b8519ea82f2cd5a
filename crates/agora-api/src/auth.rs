use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use tracing::{error, info, warn};

use agora_access::AccessGate;
use agora_access::password::{hash_password, verify_password};
use agora_db::Database;
use agora_gateway::ChannelRegistry;
use agora_types::api::{
    ChangePasswordRequest, LoginRequest, MeResponse, MessageResponse, TokenResponse,
};
use agora_types::models::Identity;

use crate::middleware::status_for;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub gate: AccessGate,
    pub registry: ChannelRegistry,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    let user = state
        .db
        .get_user_by_username(&req.nom_utilisateur)
        .map_err(|e| {
            error!("Login lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_password(&req.mot_de_passe, &user.password) {
        warn!("Failed login for {}", user.username);
        return Err(StatusCode::UNAUTHORIZED);
    }
    if !user.active {
        return Err(StatusCode::FORBIDDEN);
    }

    let token = state
        .gate
        .verifier()
        .issue(user.id, &user.username)
        .map_err(|e| {
            error!("Token issuance failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!("{} logged in", user.username);
    Ok(Json(TokenResponse::bearer(token)))
}

/// The authenticated caller with its role and effective permissions.
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<MeResponse>, StatusCode> {
    let permissions = state.gate.resolve(&identity).map_err(|e| status_for(&e))?;

    Ok(Json(MeResponse {
        member: identity.member(),
        role: identity.role.as_ref().map(|r| r.name.clone()),
        permissions,
    }))
}

/// Replace the caller's password after checking the current one.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, StatusCode> {
    let user = state
        .db
        .get_user_by_username(&identity.handle)
        .map_err(|e| {
            error!("Password lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_password(&req.ancien_mot_de_passe, &user.password) {
        warn!("{} gave a wrong current password", user.username);
        return Err(StatusCode::BAD_REQUEST);
    }

    let hash = hash_password(&req.nouveau_mot_de_passe).map_err(|e| {
        error!("Password hashing failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    state.db.set_user_password(user.id, &hash).map_err(|e| {
        error!("Password update failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("{} changed their password", user.username);
    Ok(Json(MessageResponse {
        message: "Mot de passe modifié avec succès".into(),
    }))
}
