use axum::Json;
use serde::Serialize;
use tracing::debug;

use crate::auth::AdminCaller;

#[derive(Debug, Serialize)]
pub struct Dog {
    pub name: &'static str,
}

/// Placeholder resource behind the administrator gate
pub async fn example_protected_resource(caller: AdminCaller) -> Json<Dog> {
    debug!(uid = ?caller.uid, "Serving protected resource");
    Json(Dog { name: "dog" })
}
