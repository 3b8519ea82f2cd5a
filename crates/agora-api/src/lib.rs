//! REST surface next to the gateway: login, password change, the caller's
//! own identity and the live roster of a channel.

pub mod auth;
pub mod middleware;
pub mod roster;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use agora_types::PermissionCode;

pub use auth::{AppState, AppStateInner};
use middleware::{PermissionGuard, require_auth, require_permission};

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/moi", get(auth::me))
        .route("/auth/changer-mot-de-passe", post(auth::change_password))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    // Layers run outside-in: authenticate first, then check the permission.
    let roster_routes = Router::new()
        .route("/ws/canaux/{canal_id}/utilisateurs", get(roster::channel_roster))
        .layer(from_fn_with_state(
            PermissionGuard::new(state.clone(), PermissionCode::READ_CHANNELS),
            require_permission,
        ))
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(roster_routes)
}
