use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use bio_links::{
    auth::AdminGate,
    identity::{DecodedIdToken, IdTokenKey, IdentityProvider, JwtConfig, JwtIdentityProvider},
    routes::routes,
    state::AppState,
};
use fixtures::identity::{router, IdentityFixture, DEFAULT_AUDIENCE, DEFAULT_ISSUER};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "shared-fixture-secret";

fn fixture() -> IdentityFixture {
    IdentityFixture::new(SECRET, DEFAULT_ISSUER, DEFAULT_AUDIENCE)
}

async fn request_token(body: Value) -> String {
    let response = router(fixture())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/id-token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    json["idToken"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_root_banner() {
    let response = router(fixture())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Identity Provider Fixture Server");
}

#[tokio::test]
async fn test_issued_token_carries_requested_claims() {
    let token = request_token(json!({
        "uid": "alice",
        "email": "alice@example.com",
        "admin": true,
        "authAgeSecs": 120
    }))
    .await;

    let mut validation = Validation::default();
    validation.set_issuer(&[DEFAULT_ISSUER]);
    validation.set_audience(&[DEFAULT_AUDIENCE]);
    let claims = decode::<DecodedIdToken>(
        &token,
        &DecodingKey::from_secret(SECRET.as_bytes()),
        &validation,
    )
    .unwrap()
    .claims;

    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
    assert_eq!(claims.admin, Some(true));
    assert_eq!(claims.iat - claims.auth_time, 120);
}

fn server() -> axum::Router {
    let provider = JwtIdentityProvider::new(JwtConfig {
        id_token_key: IdTokenKey::Secret(SECRET.as_bytes().to_vec()),
        issuer: DEFAULT_ISSUER.to_string(),
        audience: DEFAULT_AUDIENCE.to_string(),
        session_secret: b"server-session-secret".to_vec(),
        session_issuer: "https://session.bio-links.local".to_string(),
    })
    .unwrap();

    routes(AppState::new(Arc::new(provider), AdminGate::AllowAll))
}

async fn exchange(token: &str) -> StatusCode {
    server()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/session")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "idToken": token }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_server_accepts_fresh_fixture_tokens() {
    let fresh = request_token(json!({ "uid": "alice" })).await;
    assert_eq!(exchange(&fresh).await, StatusCode::OK);

    let stale = request_token(json!({ "uid": "alice", "authAgeSecs": 900 })).await;
    assert_eq!(exchange(&stale).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_fixture_token_verifies_with_server_provider() {
    let token = request_token(json!({ "uid": "bob" })).await;
    let provider = JwtIdentityProvider::new(JwtConfig {
        id_token_key: IdTokenKey::Secret(SECRET.as_bytes().to_vec()),
        issuer: DEFAULT_ISSUER.to_string(),
        audience: DEFAULT_AUDIENCE.to_string(),
        session_secret: b"unused".to_vec(),
        session_issuer: "https://session.bio-links.local".to_string(),
    })
    .unwrap();

    let decoded = provider.verify_id_token(&token).await.unwrap();
    assert_eq!(decoded.uid(), "bob");
}
