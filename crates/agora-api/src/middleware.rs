use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use tracing::error;

use agora_access::AccessError;
use agora_types::models::Identity;

use crate::auth::AppState;

/// Authenticate the `Authorization: Bearer` token and attach the
/// [`Identity`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    let identity = state.gate.authenticate(token).map_err(|e| status_for(&e))?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// State for [`require_permission`]: which code the wrapped routes need.
#[derive(Clone)]
pub struct PermissionGuard {
    state: AppState,
    code: &'static str,
}

impl PermissionGuard {
    pub fn new(state: AppState, code: &'static str) -> Self {
        Self { state, code }
    }
}

/// Must run inside [`require_auth`].
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    guard
        .state
        .gate
        .require(identity, guard.code)
        .map_err(|e| status_for(&e))?;

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub(crate) fn status_for(err: &AccessError) -> StatusCode {
    match err {
        AccessError::InvalidToken(_) | AccessError::UnknownIdentity(_) => StatusCode::UNAUTHORIZED,
        AccessError::InactiveIdentity(_)
        | AccessError::PermissionDenied(_)
        | AccessError::RoleRequired(_) => StatusCode::FORBIDDEN,
        AccessError::Signing(e) => {
            error!("Token signing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        AccessError::Store(e) => {
            error!("Access check failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
