//! Handles POST /oauth2/token - Issues signed access tokens for the client_credentials grant

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::Deserialize;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::{
    GrantType, OAuthErrorResponse, TokenIssuer, TokenRequest, TokenResponse, parse_scope,
};

/// Token endpoint form parameters
#[derive(Default, Deserialize)]
pub struct TokenForm {
    pub grant_type: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Client credentials presented with a token request
pub struct ClientAuthentication {
    pub client_id: String,
    pub client_secret: String,
}

/// Extract client authentication from the Authorization header
/// (client_secret_basic) or the form body (client_secret_post)
pub(crate) fn extract_client_auth(
    headers: &HeaderMap,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> Option<ClientAuthentication> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(encoded) = auth_str.strip_prefix("Basic ") {
                if let Ok(decoded) = BASE64_STANDARD.decode(encoded.trim()) {
                    if let Ok(credentials) = String::from_utf8(decoded) {
                        if let Some((client_id, client_secret)) = credentials.split_once(':') {
                            return decode_basic_credential(client_id)
                                .zip(decode_basic_credential(client_secret))
                                .map(|(client_id, client_secret)| ClientAuthentication {
                                    client_id,
                                    client_secret,
                                });
                        }
                    }
                }
            }
        }
    }

    form_client_id.map(|client_id| ClientAuthentication {
        client_id: client_id.to_string(),
        client_secret: form_client_secret.unwrap_or_default().to_string(),
    })
}

/// Basic credentials are form-urlencoded before base64 (RFC 6749 section 2.3.1)
fn decode_basic_credential(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Read a form body, mapping a bad body or content type onto `invalid_request`
pub(crate) fn form_or_invalid_request<T>(
    form: Result<Form<T>, FormRejection>,
) -> Result<T, OAuthError> {
    form.map(|Form(form)| form)
        .map_err(|rejection| OAuthError::InvalidRequest(rejection.body_text()))
}

fn build_token_request(headers: &HeaderMap, form: TokenForm) -> Result<TokenRequest, OAuthError> {
    let grant_type = form
        .grant_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("grant_type is required".to_string()))?;

    // Authorization codes and refresh tokens are never minted here, so only
    // client_credentials can be exchanged.
    if GrantType::parse(grant_type) != Some(GrantType::ClientCredentials) {
        return Err(OAuthError::UnsupportedGrantType(grant_type.to_string()));
    }

    let client_auth = extract_client_auth(
        headers,
        form.client_id.as_deref(),
        form.client_secret.as_deref(),
    )
    .ok_or_else(|| {
        OAuthError::InvalidCredentials("client authentication is required".to_string())
    })?;

    let mut request = TokenRequest::new(
        client_auth.client_id,
        client_auth.client_secret,
        GrantType::ClientCredentials,
    )
    .with_scopes(parse_scope(form.scope.as_deref().unwrap_or_default()));

    if let Some(redirect_uri) = form.redirect_uri {
        request = request.with_redirect_uri(redirect_uri);
    }

    Ok(request)
}

/// Fixed description per rejection; internal detail stays in the logs
fn error_description(error: &OAuthError) -> &'static str {
    match error {
        OAuthError::UnknownClient(_) | OAuthError::InvalidCredentials(_) => {
            "client authentication failed"
        }
        OAuthError::UnauthorizedGrantType(_) => {
            "the client is not authorized to use this grant type"
        }
        OAuthError::InvalidScope(_) => "the requested scope is not allowed for this client",
        OAuthError::InvalidRedirect(_) => "the redirect URI is not registered for this client",
        OAuthError::UnsupportedGrantType(_) => "the grant type is not supported",
        OAuthError::InvalidRequest(_) => "the request is missing a parameter or is malformed",
        OAuthError::SigningFailed(_) => "the access token could not be issued",
    }
}

/// Map a rejection onto an RFC 6749 section 5.2 error response
pub(crate) fn oauth_error_response(error: &OAuthError) -> Response {
    let status = match error {
        OAuthError::UnknownClient(_) | OAuthError::InvalidCredentials(_) => {
            StatusCode::UNAUTHORIZED
        }
        OAuthError::SigningFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };

    let body = OAuthErrorResponse {
        error: error.error_code().to_string(),
        error_description: Some(error_description(error).to_string()),
    };

    let mut response = (status, [(header::CACHE_CONTROL, "no-store")], Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
    }

    response
}

/// Handle OAuth token requests
/// POST /oauth2/token
pub async fn handle_token(
    State(token_issuer): State<Arc<TokenIssuer>>,
    headers: HeaderMap,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Response {
    let request = match form_or_invalid_request(form)
        .and_then(|form| build_token_request(&headers, form))
    {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "malformed token request");
            return oauth_error_response(&e);
        }
    };

    // Secret verification and RSA signing are CPU bound
    let result = tokio::task::spawn_blocking(move || token_issuer.issue(&request))
        .await
        .unwrap_or_else(|e| Err(OAuthError::SigningFailed(format!("issuer task failed: {e}"))));

    match result {
        Ok(token) => (
            StatusCode::OK,
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(TokenResponse::from(token)),
        )
            .into_response(),
        Err(e) => oauth_error_response(&e),
    }
}
