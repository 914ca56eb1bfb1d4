use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use tracing::{info, warn};

use crate::{
    auth::{is_recent_sign_in, AuthError, SESSION_DURATION},
    cookies::{expired_session_cookie, session_cookie},
    errors::ServerResult,
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub id_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    SignedIn,
    SignedOut,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: SessionStatus,
}

/// Existence check, always an empty 200
pub async fn probe() {}

/// Exchange a recently issued identity token for a session cookie
#[tracing::instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    cookies: Cookies,
    body: Result<Json<SignInRequest>, JsonRejection>,
) -> ServerResult<Json<StatusBody>> {
    let Json(body) = body?;

    let decoded = state
        .identity
        .verify_id_token(&body.id_token)
        .await
        .map_err(AuthError::from)?;

    let now = Utc::now().timestamp();
    if !is_recent_sign_in(decoded.auth_time, now) {
        warn!(
            uid = %decoded.sub,
            signed_in_secs_ago = now - decoded.auth_time,
            "Refusing to mint a session from a stale sign in"
        );
        return Err(AuthError::StaleToken.into());
    }

    let session = state
        .identity
        .create_session_cookie(&body.id_token, SESSION_DURATION)
        .await?;
    cookies.add(session_cookie(session));

    info!(uid = %decoded.sub, "Signed in, session cookie set");
    Ok(Json(StatusBody {
        status: SessionStatus::SignedIn,
    }))
}

/// Drop the session cookie. Nothing is checked.
pub async fn sign_out(cookies: Cookies) -> Json<StatusBody> {
    cookies.add(expired_session_cookie());
    info!("Session cookie cleared");

    Json(StatusBody {
        status: SessionStatus::SignedOut,
    })
}
