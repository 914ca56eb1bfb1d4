//! A stand-in identity provider that hands out signed identity tokens for any uid.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use bio_links::identity::DecodedIdToken;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub use bio_links::identity::jwt::{DEFAULT_AUDIENCE, DEFAULT_ISSUER};

/// Lifetime of an issued identity token
const TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(Clone)]
pub struct IdentityFixture {
    secret: Arc<[u8]>,
    issuer: String,
    audience: String,
}

impl IdentityFixture {
    pub fn new(secret: impl AsRef<[u8]>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    pub fn issue(&self, request: &TokenRequest) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now().timestamp();
        let claims = DecodedIdToken {
            sub: request.uid.clone(),
            auth_time: now - request.auth_age_secs,
            iat: now,
            exp: now + TOKEN_TTL_SECS,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            email: request.email.clone(),
            admin: request.admin,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub uid: String,
    pub email: Option<String>,
    pub admin: Option<bool>,
    /// Pretend the user signed in this long ago
    #[serde(default)]
    pub auth_age_secs: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub id_token: String,
}

pub fn router(fixture: IdentityFixture) -> Router {
    Router::new()
        .route("/", get(|| async { "Identity Provider Fixture Server" }))
        .route("/id-token", post(issue_token))
        .with_state(fixture)
}

async fn issue_token(
    State(fixture): State<IdentityFixture>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let id_token = fixture.issue(&request).map_err(|e| {
        error!("Failed to sign identity token: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!(uid = %request.uid, auth_age_secs = request.auth_age_secs, "Issued identity token");
    Ok(Json(TokenResponse { id_token }))
}
