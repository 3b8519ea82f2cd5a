use axum::{
    Json,
    extract::{Path, State},
};

use agora_types::api::RosterResponse;

use crate::auth::AppState;

/// Members currently connected to a channel's WebSocket.
pub async fn channel_roster(
    State(state): State<AppState>,
    Path(canal_id): Path<i64>,
) -> Json<RosterResponse> {
    let utilisateurs = state.registry.list(canal_id).await;
    Json(RosterResponse {
        canal_id,
        nombre_utilisateurs: utilisateurs.len(),
        utilisateurs,
    })
}
