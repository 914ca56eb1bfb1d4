//! Session exchange service and realtime profile bindings for bio-links.

pub mod auth;
pub mod auth_state;
pub mod binding;
pub mod cookies;
pub mod documents;
pub mod errors;
pub mod identity;
pub mod profile;
pub mod routes;
pub mod server;
pub mod setup;
pub mod state;
pub mod store;
pub mod subscription;
