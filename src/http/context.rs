//! Application state shared by the HTTP handlers.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::oauth::{ClientRegistry, KeyManager, TokenIssuer};

#[derive(Clone)]
pub struct AppState {
    /// Issuer identifier and base of every published URL
    pub external_base: String,
    /// Decision core for the token endpoint
    pub token_issuer: Arc<TokenIssuer>,
    /// Signing key, read for JWKS publication
    pub key_manager: Arc<KeyManager>,
    /// Bootstrap clients, read for metadata
    pub client_registry: Arc<ClientRegistry>,
}

impl AppState {
    pub fn new(
        token_issuer: Arc<TokenIssuer>,
        key_manager: Arc<KeyManager>,
        client_registry: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            external_base: token_issuer.issuer().trim_end_matches('/').to_string(),
            token_issuer,
            key_manager,
            client_registry,
        }
    }
}

impl FromRef<AppState> for Arc<KeyManager> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.key_manager.clone()
    }
}

impl FromRef<AppState> for Arc<TokenIssuer> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_issuer.clone()
    }
}

#[cfg(test)]
pub(crate) fn create_test_app_state() -> AppState {
    use crate::oauth::{Argon2Verifier, ClientRecordInput};
    use argon2::Params;

    let verifier = Arc::new(Argon2Verifier::with_params(
        Params::new(1024, 1, 1, None).unwrap(),
    ));

    let client_registry = Arc::new(
        ClientRegistry::load(
            vec![ClientRecordInput {
                client_description: "Service A".to_string(),
                client_id: "svc-a".to_string(),
                client_secret: "s3cr3t".to_string(),
                scopes: vec!["read".to_string(), "write".to_string()],
                grant_types: vec!["client_credentials".to_string()],
                redirect_uris: None,
            }],
            verifier.as_ref(),
        )
        .unwrap(),
    );

    let key_manager = Arc::new(
        KeyManager::from_pem(
            include_str!("../../tests/fixtures/test_private_key.pem"),
            None,
        )
        .unwrap(),
    );

    let token_issuer = Arc::new(TokenIssuer::new(
        client_registry.clone(),
        verifier,
        key_manager.clone(),
        "https://auth.example.com".to_string(),
        chrono::Duration::minutes(5),
    ));

    AppState::new(token_issuer, key_manager, client_registry)
}
