//! Handles discovery endpoints - authorization server metadata and JWKS

use axum::{extract::State, response::Json};
use serde_json::{Value, json};
use std::sync::Arc;

use super::context::AppState;
use crate::oauth::{JsonWebKeySet, KeyManager};

/// OAuth 2.0 Authorization Server Metadata handler
/// GET /.well-known/oauth-authorization-server
///
/// Returns metadata about the OAuth authorization server as specified by RFC 8414.
pub async fn oauth_authorization_server_handler(State(state): State<AppState>) -> Json<Value> {
    let metadata = json!({
        "issuer": state.external_base,
        "token_endpoint": format!("{}/oauth2/token", state.external_base),
        "jwks_uri": format!("{}/oauth2/jwks", state.external_base),
        "introspection_endpoint": format!("{}/oauth2/introspect", state.external_base),
        "scopes_supported": state.client_registry.scopes(),
        "response_types_supported": [],
        "grant_types_supported": ["client_credentials"],
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
        "introspection_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"]
    });

    Json(metadata)
}

/// JWKS (JSON Web Key Set) handler
/// GET /oauth2/jwks and GET /.well-known/jwks.json
///
/// Returns the public key used by the authorization server for signing tokens.
pub async fn jwks_handler(State(key_manager): State<Arc<KeyManager>>) -> Json<JsonWebKeySet> {
    Json(key_manager.jwk_set())
}
