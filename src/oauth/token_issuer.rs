//! Token issuance decisions: client authentication, grant type and scope
//! authorization, and signing of the resulting claim set.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::errors::OAuthError;
use crate::oauth::clients::ClientRegistry;
use crate::oauth::credentials::CredentialVerifier;
use crate::oauth::keys::KeyManager;
use crate::oauth::types::*;

/// Issues signed access tokens to registered clients.
///
/// Every call is independent; the issuer only reads from the registry and
/// the key manager.
pub struct TokenIssuer {
    registry: Arc<ClientRegistry>,
    verifier: Arc<dyn CredentialVerifier>,
    keys: Arc<KeyManager>,
    /// Server issuer URL (external base)
    issuer: String,
    /// Access token lifetime
    token_lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(
        registry: Arc<ClientRegistry>,
        verifier: Arc<dyn CredentialVerifier>,
        keys: Arc<KeyManager>,
        issuer: String,
        token_lifetime: Duration,
    ) -> Self {
        Self {
            registry,
            verifier,
            keys,
            issuer,
            token_lifetime,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn token_lifetime(&self) -> Duration {
        self.token_lifetime
    }

    /// Authenticate a registered client by its secret
    pub fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<&ClientRecord, OAuthError> {
        let client = self.registry.lookup(client_id)?;
        self.authenticate_client(client, client_secret)?;
        Ok(client)
    }

    /// Claims of an access token this server issued, if it is still valid.
    /// Tokens signed by another key or issuer, or already expired, are inactive.
    pub fn introspect(&self, token: &str) -> Option<TokenClaims> {
        match self.keys.verify::<TokenClaims>(token, &self.issuer) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "inactive token presented for introspection");
                None
            }
        }
    }

    /// Decide and, if permitted, issue a token for the request
    pub fn issue(&self, request: &TokenRequest) -> Result<IssuedToken, OAuthError> {
        self.issue_at(request, Utc::now())
    }

    /// Same as [`TokenIssuer::issue`] with an explicit issuance time
    pub fn issue_at(
        &self,
        request: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, OAuthError> {
        let result = self.decide_and_sign(request, now);

        match &result {
            Ok(token) => tracing::info!(
                client_id = %request.client_id,
                grant_type = %request.grant_type,
                scope = %token.claims.scope,
                jti = %token.claims.jti,
                "issued access token"
            ),
            Err(e @ OAuthError::SigningFailed(_)) => tracing::error!(
                client_id = %request.client_id,
                error = %e,
                "token signing failed"
            ),
            Err(e) => tracing::debug!(
                client_id = %request.client_id,
                grant_type = %request.grant_type,
                error = %e,
                "token request rejected"
            ),
        }

        result
    }

    fn decide_and_sign(
        &self,
        request: &TokenRequest,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, OAuthError> {
        let client = self.registry.lookup(&request.client_id)?;

        self.authenticate_client(client, &request.client_secret)?;
        Self::authorize_grant_type(client, request.grant_type)?;
        let granted_scopes = Self::authorize_scopes(client, &request.scopes)?;

        if request.grant_type == GrantType::AuthorizationCode {
            if let Some(redirect_uri) = &request.redirect_uri {
                Self::validate_redirect_uri(client, redirect_uri)?;
            }
        }

        let claims = TokenClaims {
            iss: self.issuer.clone(),
            sub: client.client_id.clone(),
            scope: join_scopes(&granted_scopes),
            iat: now.timestamp(),
            exp: (now + self.token_lifetime).timestamp(),
            jti: generate_token_id(),
        };

        let access_token = self.keys.sign(&claims)?;

        Ok(IssuedToken {
            access_token,
            claims,
            key_id: self.keys.key_id().to_string(),
        })
    }

    /// Authenticate a client
    fn authenticate_client(
        &self,
        client: &ClientRecord,
        client_secret: &str,
    ) -> Result<(), OAuthError> {
        if !self
            .verifier
            .verify(client_secret, &client.client_secret_hash)
        {
            return Err(OAuthError::InvalidCredentials(format!(
                "client {} presented an invalid secret",
                client.client_id
            )));
        }

        Ok(())
    }

    fn authorize_grant_type(client: &ClientRecord, grant_type: GrantType) -> Result<(), OAuthError> {
        if !client.grant_types.contains(&grant_type) {
            return Err(OAuthError::UnauthorizedGrantType(format!(
                "client {} is not authorized for {grant_type}",
                client.client_id
            )));
        }

        Ok(())
    }

    /// Granted scopes are the requested scopes the client is allowed; an empty
    /// request grants every allowed scope.
    fn authorize_scopes(
        client: &ClientRecord,
        requested: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, OAuthError> {
        if requested.is_empty() {
            return Ok(client.scopes.clone());
        }

        let granted: BTreeSet<String> = requested.intersection(&client.scopes).cloned().collect();

        if granted.is_empty() {
            return Err(OAuthError::InvalidScope(format!(
                "none of the requested scopes are allowed for client {}",
                client.client_id
            )));
        }

        Ok(granted)
    }

    fn validate_redirect_uri(client: &ClientRecord, redirect_uri: &str) -> Result<(), OAuthError> {
        if !client.redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return Err(OAuthError::InvalidRedirect(format!(
                "redirect URI is not registered for client {}",
                client.client_id
            )));
        }

        Ok(())
    }
}
