use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::eyre::{eyre, WrapErr};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use tracing::{debug, warn};

use super::{DecodedIdToken, IdentityError, IdentityProvider};

pub const DEFAULT_ISSUER: &str = "https://securetoken.bio-links.local";
pub const DEFAULT_AUDIENCE: &str = "bio-links";
pub const DEFAULT_SESSION_ISSUER: &str = "https://session.bio-links.local";

pub const MIN_SESSION_DURATION: Duration = Duration::from_secs(5 * 60);
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// How far in the future `auth_time` may be before a token is refused
const ALLOWED_CLOCK_SKEW_SECS: i64 = 60;

/// Key used to check identity token signatures
#[derive(Clone)]
pub enum IdTokenKey {
    /// HS256 shared secret
    Secret(Vec<u8>),
    /// RS256 public key in PEM format
    RsaPublicKeyPem(Vec<u8>),
}

#[derive(Clone)]
pub struct JwtConfig {
    pub id_token_key: IdTokenKey,
    pub issuer: String,
    pub audience: String,
    pub session_secret: Vec<u8>,
    pub session_issuer: String,
}

impl JwtConfig {
    pub fn from_env() -> color_eyre::Result<Self> {
        let id_token_key = match env::var("ID_TOKEN_PUBLIC_KEY") {
            Ok(encoded) => {
                let pem = base64::Engine::decode(
                    &base64::engine::general_purpose::STANDARD,
                    encoded.trim(),
                )
                .wrap_err("Failed to decode base64-encoded ID_TOKEN_PUBLIC_KEY")?;
                IdTokenKey::RsaPublicKeyPem(pem)
            }
            Err(_) => {
                let secret = env::var("ID_TOKEN_SECRET").map_err(|_| {
                    eyre!("Either ID_TOKEN_PUBLIC_KEY or ID_TOKEN_SECRET must be set")
                })?;
                IdTokenKey::Secret(secret.into_bytes())
            }
        };

        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!("SESSION_SECRET not set, generating one. Sessions will not survive a restart");
                generate_secret()
            }
        };

        Ok(Self {
            id_token_key,
            issuer: env::var("ID_TOKEN_ISSUER").unwrap_or_else(|_| DEFAULT_ISSUER.to_string()),
            audience: env::var("ID_TOKEN_AUDIENCE")
                .unwrap_or_else(|_| DEFAULT_AUDIENCE.to_string()),
            session_secret,
            session_issuer: env::var("SESSION_ISSUER")
                .unwrap_or_else(|_| DEFAULT_SESSION_ISSUER.to_string()),
        })
    }
}

fn generate_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 64];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

fn validation(algorithm: Algorithm, issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
    validation
}

/// Checks on top of signature, expiry, issuer and audience
fn check_claims(claims: &DecodedIdToken, now: i64) -> Result<(), String> {
    if claims.sub.is_empty() {
        return Err("subject is empty".to_string());
    }

    if claims.auth_time > now + ALLOWED_CLOCK_SKEW_SECS {
        return Err("auth_time is in the future".to_string());
    }

    Ok(())
}

/// Identity provider backed by signed JWTs.
///
/// Identity tokens are checked against the configured issuer key. Session cookies
/// are JWTs signed with the session secret and carry the claims of the identity
/// token they were exchanged for.
pub struct JwtIdentityProvider {
    id_token_key: DecodingKey,
    id_token_validation: Validation,
    session_encoding_key: EncodingKey,
    session_decoding_key: DecodingKey,
    session_validation: Validation,
    session_issuer: String,
    audience: String,
}

impl JwtIdentityProvider {
    pub fn new(config: JwtConfig) -> color_eyre::Result<Self> {
        let (id_token_key, algorithm) = match &config.id_token_key {
            IdTokenKey::Secret(secret) => (DecodingKey::from_secret(secret), Algorithm::HS256),
            IdTokenKey::RsaPublicKeyPem(pem) => (
                DecodingKey::from_rsa_pem(pem).wrap_err("Failed to parse ID token public key")?,
                Algorithm::RS256,
            ),
        };

        Ok(Self {
            id_token_key,
            id_token_validation: validation(algorithm, &config.issuer, &config.audience),
            session_encoding_key: EncodingKey::from_secret(&config.session_secret),
            session_decoding_key: DecodingKey::from_secret(&config.session_secret),
            session_validation: validation(
                Algorithm::HS256,
                &config.session_issuer,
                &config.audience,
            ),
            session_issuer: config.session_issuer,
            audience: config.audience,
        })
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    #[tracing::instrument(skip_all)]
    async fn verify_id_token(&self, id_token: &str) -> Result<DecodedIdToken, IdentityError> {
        let data = decode::<DecodedIdToken>(id_token, &self.id_token_key, &self.id_token_validation)
            .map_err(|err| IdentityError::InvalidToken(err.to_string()))?;

        check_claims(&data.claims, Utc::now().timestamp()).map_err(IdentityError::InvalidToken)?;

        debug!(uid = %data.claims.sub, "Verified ID token");
        Ok(data.claims)
    }

    #[tracing::instrument(skip_all, fields(expires_in = expires_in.as_secs()))]
    async fn create_session_cookie(
        &self,
        id_token: &str,
        expires_in: Duration,
    ) -> Result<String, IdentityError> {
        if !(MIN_SESSION_DURATION..=MAX_SESSION_DURATION).contains(&expires_in) {
            return Err(IdentityError::InvalidDuration(expires_in));
        }

        let decoded = self.verify_id_token(id_token).await?;

        let now = Utc::now().timestamp();
        let claims = DecodedIdToken {
            iss: self.session_issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            exp: now + expires_in.as_secs() as i64,
            ..decoded
        };

        let cookie = encode(&Header::new(Algorithm::HS256), &claims, &self.session_encoding_key)
            .map_err(IdentityError::Minting)?;

        debug!(uid = %claims.sub, "Minted session cookie");
        Ok(cookie)
    }

    #[tracing::instrument(skip_all)]
    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
    ) -> Result<DecodedIdToken, IdentityError> {
        let data = decode::<DecodedIdToken>(
            session_cookie,
            &self.session_decoding_key,
            &self.session_validation,
        )
        .map_err(|err| IdentityError::InvalidSessionCookie(err.to_string()))?;

        check_claims(&data.claims, Utc::now().timestamp())
            .map_err(IdentityError::InvalidSessionCookie)?;

        Ok(data.claims)
    }
}
