use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::AdminGate;
use crate::identity::{IdentityProvider, JwtConfig, JwtIdentityProvider};

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub admin_gate: AdminGate,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, admin_gate: AdminGate) -> Self {
        Self {
            identity,
            admin_gate,
        }
    }

    pub fn from_env() -> color_eyre::Result<Self> {
        let jwt_config = JwtConfig::from_env()?;
        info!(
            issuer = %jwt_config.issuer,
            audience = %jwt_config.audience,
            "Identity token verification configured"
        );
        let identity = JwtIdentityProvider::new(jwt_config)?;

        let admin_gate = AdminGate::from_env()?;
        if admin_gate == AdminGate::AllowAll {
            warn!("ADMIN_GATE is allow-all, every caller is treated as an administrator");
        }

        Ok(Self::new(Arc::new(identity), admin_gate))
    }

    /// Git SHA the binary was built from
    pub fn version(&self) -> &'static str {
        env!("VERGEN_GIT_SHA")
    }
}
