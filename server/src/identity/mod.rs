//! Identity provider collaborator.
//!
//! Verifies identity tokens issued to clients and mints/verifies the longer lived
//! session cookies exchanged for them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod jwt;

pub use jwt::{IdTokenKey, JwtConfig, JwtIdentityProvider};

/// Claims of a verified identity token or session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedIdToken {
    /// The user's uid
    pub sub: String,
    /// When the user actually signed in (unix seconds)
    pub auth_time: i64,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Custom claim set on administrator accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
}

impl DecodedIdToken {
    pub fn uid(&self) -> &str {
        &self.sub
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("ID token rejected: {0}")]
    InvalidToken(String),
    #[error("Session cookie rejected: {0}")]
    InvalidSessionCookie(String),
    #[error("Session duration must be between 5 minutes and 2 weeks, got {0:?}")]
    InvalidDuration(Duration),
    #[error("Failed to mint session cookie")]
    Minting(#[source] jsonwebtoken::errors::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<DecodedIdToken, IdentityError>;

    /// Exchange a valid identity token for a session cookie valid for `expires_in`
    async fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in: Duration,
    ) -> Result<String, IdentityError>;

    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
    ) -> Result<DecodedIdToken, IdentityError>;
}
