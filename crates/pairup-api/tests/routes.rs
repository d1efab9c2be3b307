use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use pairup_api::{AppStateInner, router};
use pairup_engine::memory::MemoryStore;
use pairup_engine::venue::NoopRecommender;
use pairup_engine::{Engine, EngineConfig};
use pairup_types::api::Claims;
use pairup_types::models::UserId;

const SECRET: &str = "route-test-secret";

fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(Engine::new(
        store.clone(),
        store,
        Arc::new(NoopRecommender),
        EngineConfig::default(),
    ));
    router(AppStateInner::new(engine, SECRET))
}

fn token(user: UserId, username: &str) -> String {
    let claims = Claims {
        sub: user,
        username: username.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_group(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/groups",
        Some(token),
        Some(json!({
            "name": name,
            "size": 4,
            "neighborhood": "Soho",
            "vibe": "chill",
            "intent": "any",
            "governance": "single-decider",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["group"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/groups", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/groups", Some("not-a-jwt"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = encode(
        &Header::default(),
        &Claims {
            sub: UserId::new(),
            username: "mallory".into(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        },
        &EncodingKey::from_secret(b"other-secret"),
    )
    .unwrap();
    let (status, _) = send(&app, Method::GET, "/groups/00000000-0000-0000-0000-000000000000", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_ids_and_profiles_are_rejected() {
    let app = app();
    let alice = token(UserId::new(), "alice");

    let (status, _) = send(&app, Method::GET, "/groups/not-a-uuid/candidates", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/groups",
        Some(&alice),
        Some(json!({ "name": "  ", "size": 4, "intent": "any", "governance": "consensus" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn outsiders_cannot_browse_for_a_group() {
    let app = app();
    let alice = token(UserId::new(), "alice");
    let eve = token(UserId::new(), "eve");
    let group = create_group(&app, &alice, "A").await;

    let (status, body) = send(&app, Method::GET, &format!("/groups/{}/candidates", group), Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn mutual_like_match_chat_and_teardown() {
    let app = app();
    let alice = token(UserId::new(), "alice");
    let bob = token(UserId::new(), "bob");
    let a = create_group(&app, &alice, "A").await;
    let b = create_group(&app, &bob, "B").await;

    let (status, body) = send(&app, Method::GET, &format!("/groups/{}/candidates", a), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["candidates"][0]["group"]["id"], b.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/decisions", a),
        Some(&alice),
        Some(json!({ "target_id": b, "decision": "yes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mutual"], false);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/decisions", b),
        Some(&bob),
        Some(json!({ "target_id": a, "decision": "yes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mutual"], true);
    let match_id = body["match"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/groups/{}/match", a), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"]["id"], match_id.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/invitations", a),
        Some(&alice),
        Some(json!({ "to_group": b })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_MATCHED");
    assert_eq!(body["error"]["refresh"], true);

    let messages = format!("/matches/{}/messages", match_id);
    let (status, _) = send(&app, Method::POST, &messages, Some(&alice), Some(json!({ "body": "hello" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, Method::GET, &format!("{}?limit=10", messages), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"][0]["body"], "hello");

    let (status, _) = send(&app, Method::DELETE, &format!("/matches/{}", match_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, &format!("/matches/{}", match_id), Some(&bob), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "MATCH_NOT_FOUND");

    let (status, body) = send(&app, Method::GET, &format!("/groups/{}/match", b), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["match"].is_null());
}

#[tokio::test]
async fn invitation_accept_by_decider() {
    let app = app();
    let alice = token(UserId::new(), "alice");
    let bob = token(UserId::new(), "bob");
    let a = create_group(&app, &alice, "A").await;
    let b = create_group(&app, &bob, "B").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/groups/{}/invitations", a),
        Some(&alice),
        Some(json!({ "to_group": b })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let invitation_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/groups/{}/invitations?direction=incoming", b),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], invitation_id.as_str());

    let respond = format!("/invitations/{}/respond", invitation_id);
    let (status, _) = send(&app, Method::POST, &respond, Some(&alice), Some(json!({ "decision": "accept" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::POST, &respond, Some(&bob), Some(json!({ "decision": "accept" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert!(body["match"]["id"].is_string());
}
