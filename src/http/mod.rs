//! Axum HTTP server handlers for the token, introspection, JWKS and discovery endpoints.

pub mod context;
mod handler_introspect;
mod handler_token;
mod handler_well_known;
pub mod server;

pub use context::AppState;
pub use server::build_router;
