use axum::{
    extract::Request,
    routing::{get, post},
};
use sentry_tower::{NewSentryLayer, SentryHttpLayer};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;

use crate::state::AppState;

pub mod protected;
pub mod session;

/// Build the application router with all routes
pub fn routes(app_state: AppState) -> axum::Router {
    axum::Router::new()
        .route(
            "/session",
            get(session::probe)
                .post(session::sign_in)
                .delete(session::sign_out),
        )
        .route(
            "/example-protected-resource",
            post(protected::example_protected_resource),
        )
        .layer(CookieManagerLayer::new())
        .layer(
            ServiceBuilder::new()
                .layer(NewSentryLayer::<Request>::new_from_top())
                .layer(SentryHttpLayer::with_transaction()),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
