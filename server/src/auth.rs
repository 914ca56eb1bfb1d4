use std::str::FromStr;
use std::time::Duration;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use color_eyre::eyre::eyre;
use tower_cookies::Cookies;
use tracing::{info, warn};

use crate::{
    errors::{ServerError, WithStatus},
    identity::IdentityError,
    state::AppState,
};

/// Cookie name for storing the session credential
pub const SESSION_COOKIE_NAME: &str = "__session";

/// How long a minted session stays valid (5 days)
pub const SESSION_DURATION: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// An identity token can only be exchanged this soon after the user signed in
pub const RECENT_SIGN_IN_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Whether a sign-in at `auth_time` is recent enough to mint a session at `now`
pub fn is_recent_sign_in(auth_time: i64, now: i64) -> bool {
    now.saturating_sub(auth_time) < RECENT_SIGN_IN_WINDOW.as_secs() as i64
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid identity token")]
    InvalidToken(#[source] IdentityError),
    #[error("Recent sign in required!")]
    StaleToken,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Identity provider failed")]
    Provider(#[source] IdentityError),
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken(_) | IdentityError::InvalidSessionCookie(_) => {
                AuthError::InvalidToken(err)
            }
            IdentityError::InvalidDuration(_) | IdentityError::Minting(_) => {
                AuthError::Provider(err)
            }
        }
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken(_) | AuthError::StaleToken | AuthError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Policy guarding administrator-only resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdminGate {
    /// Every caller is treated as an administrator
    #[default]
    AllowAll,
    /// Caller needs a valid session cookie carrying `admin: true`
    SessionClaim,
}

impl FromStr for AdminGate {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow-all" => Ok(AdminGate::AllowAll),
            "session-claim" => Ok(AdminGate::SessionClaim),
            other => Err(eyre!(
                "Unknown ADMIN_GATE {other:?}, expected allow-all or session-claim"
            )),
        }
    }
}

impl AdminGate {
    pub fn from_env() -> color_eyre::Result<Self> {
        match std::env::var("ADMIN_GATE") {
            Ok(value) => value.parse(),
            Err(_) => Ok(AdminGate::default()),
        }
    }
}

/// A caller that passed the administrator gate
#[derive(Debug, Clone)]
pub struct AdminCaller {
    /// Set when the gate identified the caller from their session
    pub uid: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.admin_gate == AdminGate::AllowAll {
            return Ok(AdminCaller { uid: None });
        }

        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| eyre!(message))
            .with_status(StatusCode::INTERNAL_SERVER_ERROR)?;

        let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) else {
            info!("No session cookie on admin request");
            return Err(AuthError::Unauthorized.into());
        };

        let claims = match state.identity.verify_session_cookie(cookie.value()).await {
            Ok(claims) => claims,
            Err(err) => {
                info!(error = %err, "Session cookie rejected on admin request");
                return Err(AuthError::Unauthorized.into());
            }
        };

        if claims.admin != Some(true) {
            warn!(
                uid = %claims.sub,
                "User attempted to access admin resource without admin privileges"
            );
            return Err(AuthError::Unauthorized.into());
        }

        Ok(AdminCaller {
            uid: Some(claims.sub),
        })
    }
}
