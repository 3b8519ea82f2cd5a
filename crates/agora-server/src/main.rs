mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use agora_access::password::hash_password;
use agora_access::{AccessConfig, AccessGate};
use agora_api::{AppState, AppStateInner};
use agora_db::Database;
use agora_gateway::{ChannelRegistry, Gateway, connection};

use crate::config::ServerConfig;

/// Password of the seeded `admin` account.
const SEED_ADMIN_PASSWORD: &str = "admin123";

#[derive(Deserialize)]
struct ChatQuery {
    #[serde(default)]
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agora=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let access = AccessConfig::from_env()?;
    if access.uses_dev_secret() {
        warn!("AGORA_JWT_SECRET is not set, using the development secret");
    }

    let db = Arc::new(Database::open(&config.db_path)?);
    if config.seed {
        agora_db::seed::run(&db, &hash_password(SEED_ADMIN_PASSWORD)?)?;
    }

    let registry = ChannelRegistry::new();
    let gate = AccessGate::new(&access, db.clone());
    let gateway = Gateway::new(gate.clone(), db.clone(), registry.clone());

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        gate,
        registry,
    });

    let ws_route = Router::new()
        .route("/ws/chat/{canal_id}", get(ws_upgrade))
        .with_state(gateway);

    let app = Router::new()
        .merge(agora_api::router(app_state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Agora server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(gateway): State<Gateway>,
    Path(canal_id): Path<i64>,
    Query(query): Query<ChatQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, gateway, canal_id, query.token)
    })
}
