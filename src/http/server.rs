//! Main router configuration assembling the token, introspection and discovery endpoints.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::{
    context::AppState,
    handler_introspect::handle_introspect,
    handler_token::handle_token,
    handler_well_known::{jwks_handler, oauth_authorization_server_handler},
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/token", post(handle_token))
        .route("/introspect", post(handle_introspect))
        .route("/jwks", get(jwks_handler));

    let well_known_routes = Router::new()
        .route(
            "/oauth-authorization-server",
            get(oauth_authorization_server_handler),
        )
        .route("/jwks.json", get(jwks_handler));

    Router::new()
        .nest("/oauth2", oauth_routes)
        .nest("/.well-known", well_known_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
