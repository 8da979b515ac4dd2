//! Handles POST /oauth2/introspect - Reports whether an access token is active (RFC 7662)

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::handler_token::{extract_client_auth, form_or_invalid_request, oauth_error_response};
use crate::errors::OAuthError;
use crate::oauth::{IntrospectionResponse, TokenIssuer};

/// Introspection endpoint form parameters
#[derive(Default, Deserialize)]
pub struct IntrospectionForm {
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Handle token introspection requests from registered clients
/// POST /oauth2/introspect
pub async fn handle_introspect(
    State(token_issuer): State<Arc<TokenIssuer>>,
    headers: HeaderMap,
    form: Result<Form<IntrospectionForm>, FormRejection>,
) -> Response {
    let form = match form_or_invalid_request(form) {
        Ok(form) => form,
        Err(e) => {
            tracing::debug!(error = %e, "malformed introspection request");
            return oauth_error_response(&e);
        }
    };

    let Some(client_auth) = extract_client_auth(
        &headers,
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
    ) else {
        return oauth_error_response(&OAuthError::InvalidCredentials(
            "client authentication is required".to_string(),
        ));
    };

    let Some(token) = form.token.filter(|token| !token.is_empty()) else {
        return oauth_error_response(&OAuthError::InvalidRequest(
            "token is required".to_string(),
        ));
    };

    // token_type_hint is ignored; only access tokens are issued
    let result = tokio::task::spawn_blocking(move || {
        let client =
            token_issuer.authenticate(&client_auth.client_id, &client_auth.client_secret)?;
        let claims = token_issuer.introspect(&token);

        tracing::debug!(
            client_id = %client.client_id,
            active = claims.is_some(),
            "token introspected"
        );

        Ok::<_, OAuthError>(claims)
    })
    .await
    .unwrap_or_else(|e| {
        Err(OAuthError::SigningFailed(format!(
            "introspection task failed: {e}"
        )))
    });

    match result {
        Ok(claims) => {
            let body = claims
                .map(IntrospectionResponse::from)
                .unwrap_or_else(IntrospectionResponse::inactive);

            (
                StatusCode::OK,
                [(header::CACHE_CONTROL, "no-store")],
                Json(body),
            )
                .into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "introspection rejected");
            oauth_error_response(&e)
        }
    }
}
