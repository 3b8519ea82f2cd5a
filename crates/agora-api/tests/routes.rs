//! REST routes against a seeded in-memory database.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use agora_access::password::hash_password;
use agora_access::{AccessConfig, AccessGate};
use agora_api::{AppState, AppStateInner};
use agora_db::Database;
use agora_db::queries::NewUser;
use agora_gateway::{ChannelRegistry, SessionHandle};
use agora_types::models::Member;

fn state() -> AppState {
    let db = Database::open_in_memory().unwrap();
    agora_db::seed::run(&db, &hash_password("admin123").unwrap()).unwrap();
    let hash = hash_password("secret").unwrap();
    for (name, role) in [("alice", Some("moderateur")), ("carol", None)] {
        db.create_user(&NewUser {
            username: name,
            email: &format!("{name}@example.com"),
            password_hash: &hash,
            first_name: Some("Alice"),
            last_name: None,
            role,
        })
        .unwrap();
    }
    let db = Arc::new(db);
    let gate = AccessGate::new(&AccessConfig::new("api-tests"), db.clone());
    Arc::new(AppStateInner {
        db,
        gate,
        registry: ChannelRegistry::new(),
    })
}

fn app(state: &AppState) -> Router {
    agora_api::router(state.clone())
}

fn token(state: &AppState, handle: &str) -> String {
    let user = state.db.get_user_by_username(handle).unwrap().unwrap();
    state.gate.verifier().issue(user.id, handle).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::post("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "nom_utilisateur": username, "mot_de_passe": password }).to_string(),
        ))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn login_issues_a_verifiable_bearer_token() {
    let state = state();
    let (status, body) = send(app(&state), login_request("alice", "secret")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    let claims = state
        .gate
        .verifier()
        .verify(body["access_token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.sub, "alice");
}

#[tokio::test]
async fn login_failures() {
    let state = state();

    let (status, _) = send(app(&state), login_request("alice", "wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app(&state), login_request("nobody", "secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    state.db.set_user_active("alice", false).unwrap();
    let (status, _) = send(app(&state), login_request("alice", "secret")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn change_password_request(token: Option<&str>, old: &str, new: &str) -> Request<Body> {
    let mut builder = Request::post("/auth/changer-mot-de-passe")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(
            json!({ "ancien_mot_de_passe": old, "nouveau_mot_de_passe": new }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn change_password_replaces_the_hash() {
    let state = state();
    let token = token(&state, "alice");

    let (status, body) = send(
        app(&state),
        change_password_request(Some(&token), "secret", "nouveau-secret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Mot de passe modifié avec succès");

    let (status, _) = send(app(&state), login_request("alice", "nouveau-secret")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app(&state), login_request("alice", "secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_checks_the_current_one() {
    let state = state();
    let token = token(&state, "alice");

    let (status, _) = send(
        app(&state),
        change_password_request(Some(&token), "wrong", "nouveau-secret"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app(&state),
        change_password_request(None, "secret", "nouveau-secret"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app(&state), login_request("alice", "secret")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn me_requires_a_token() {
    let state = state();

    let (status, _) = send(app(&state), get("/auth/moi", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(app(&state), get("/auth/moi", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_lists_role_and_permissions() {
    let state = state();
    let token = token(&state, "alice");

    let (status, body) = send(app(&state), get("/auth/moi", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nom_utilisateur"], "alice");
    assert_eq!(body["prenom"], "Alice");
    assert_eq!(body["role"], "moderateur");

    let permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(permissions.contains(&"envoyer_messages"));
    assert!(!permissions.contains(&"gerer_roles"));
}

#[tokio::test]
async fn roster_lists_connected_members() {
    let state = state();
    let (tx, _rx) = mpsc::unbounded_channel();
    let member = Member {
        id: 42,
        handle: "dave".into(),
        first_name: None,
        last_name: None,
    };
    state
        .registry
        .register(SessionHandle::new(Uuid::new_v4(), member, tx), 1)
        .await;

    let token = token(&state, "alice");
    let (status, body) = send(app(&state), get("/ws/canaux/1/utilisateurs", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canal_id"], 1);
    assert_eq!(body["nombre_utilisateurs"], 1);
    assert_eq!(body["utilisateurs"][0]["nom_utilisateur"], "dave");

    let (_, body) = send(app(&state), get("/ws/canaux/2/utilisateurs", Some(&token))).await;
    assert_eq!(body["nombre_utilisateurs"], 0);
}

#[tokio::test]
async fn roster_requires_channel_read_permission() {
    let state = state();

    let (status, _) = send(app(&state), get("/ws/canaux/1/utilisateurs", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = token(&state, "carol");
    let (status, _) = send(app(&state), get("/ws/canaux/1/utilisateurs", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
