//! OAuth 2.1 core types and data structures.
//!
//! Defines grant types, client records, token requests, and issued tokens.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// OAuth 2.1 Grant Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    /// All grant types the server knows about
    pub const ALL: [GrantType; 3] = [
        GrantType::AuthorizationCode,
        GrantType::ClientCredentials,
        GrantType::RefreshToken,
    ];

    /// Parse a grant type name, ignoring ASCII case. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|grant_type| grant_type.as_str().eq_ignore_ascii_case(value))
    }

    /// Wire name of the grant type
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth 2.1 Token Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Bearer,
}

/// Client record as supplied by the bootstrap configuration, before validation.
///
/// The secret is plaintext here and is hashed exactly once when the registry
/// is built.
#[derive(Clone, Deserialize)]
pub struct ClientRecordInput {
    /// Human readable description
    #[serde(default)]
    pub client_description: String,
    /// Unique client identifier
    pub client_id: String,
    /// Plaintext client secret
    pub client_secret: String,
    /// Scopes the client may request
    #[serde(default, deserialize_with = "string_entries")]
    pub scopes: Vec<String>,
    /// Grant type names; unrecognized names are ignored at load
    #[serde(default, deserialize_with = "string_entries")]
    pub grant_types: Vec<String>,
    /// Registered redirect URIs
    #[serde(default, deserialize_with = "optional_string_entries")]
    pub redirect_uris: Option<Vec<String>>,
}

/// Keep only the string entries of a list; numbers, maps and the like are dropped.
fn string_entries<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            serde_yaml::Value::String(value) => Some(value),
            _ => None,
        })
        .collect())
}

fn optional_string_entries<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(value) => string_entries(value).map(Some).map_err(serde::de::Error::custom),
    }
}

impl fmt::Debug for ClientRecordInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRecordInput")
            .field("client_description", &self.client_description)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("scopes", &self.scopes)
            .field("grant_types", &self.grant_types)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// Registered OAuth client. Immutable once the registry is built.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// Unique client identifier
    pub client_id: String,
    /// One-way hash of the client secret
    pub(crate) client_secret_hash: String,
    /// Human readable description
    pub description: String,
    /// Scopes that can be granted to this client
    pub scopes: BTreeSet<String>,
    /// Grant types allowed for this client
    pub grant_types: BTreeSet<GrantType>,
    /// Redirect URIs, in registration order
    pub redirect_uris: Vec<String>,
}

impl fmt::Debug for ClientRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRecord")
            .field("client_id", &self.client_id)
            .field("client_secret_hash", &"[redacted]")
            .field("description", &self.description)
            .field("scopes", &self.scopes)
            .field("grant_types", &self.grant_types)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

/// Token request presented to the issuer
#[derive(Clone)]
pub struct TokenRequest {
    /// Client ID
    pub client_id: String,
    /// Presented client secret
    pub client_secret: String,
    /// Grant type
    pub grant_type: GrantType,
    /// Requested scopes; empty means "everything the client is allowed"
    pub scopes: BTreeSet<String>,
    /// Redirect URI (authorization_code grant only)
    pub redirect_uri: Option<String>,
}

impl TokenRequest {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        grant_type: GrantType,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant_type,
            scopes: BTreeSet::new(),
            redirect_uri: None,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("grant_type", &self.grant_type)
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Claim set embedded in an issued access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject (the client ID)
    pub sub: String,
    /// Granted scopes joined by a single space
    pub scope: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiration (seconds since epoch)
    pub exp: i64,
    /// Unique token identifier
    pub jti: String,
}

/// Signed access token and the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS serialization
    pub access_token: String,
    /// Claims protected by the signature
    pub claims: TokenClaims,
    /// Identifier of the signing key
    pub key_id: String,
}

impl IssuedToken {
    /// Lifetime of the token in seconds
    pub fn expires_in(&self) -> u64 {
        (self.claims.exp - self.claims.iat).max(0) as u64
    }

    pub fn granted_scopes(&self) -> BTreeSet<String> {
        parse_scope(&self.claims.scope)
    }
}

/// Token Response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type
    pub token_type: TokenType,
    /// Expires in seconds
    pub expires_in: u64,
    /// Granted scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl From<IssuedToken> for TokenResponse {
    fn from(token: IssuedToken) -> Self {
        let expires_in = token.expires_in();
        let scope = Some(token.claims.scope).filter(|scope| !scope.is_empty());
        Self {
            access_token: token.access_token,
            token_type: TokenType::Bearer,
            expires_in,
            scope,
        }
    }
}

/// OAuth Error Response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    /// Error code
    pub error: String,
    /// Error description
    pub error_description: Option<String>,
}

/// Token introspection response (RFC 7662). Inactive tokens carry only
/// `active: false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    pub fn inactive() -> Self {
        Self::default()
    }
}

impl From<TokenClaims> for IntrospectionResponse {
    fn from(claims: TokenClaims) -> Self {
        Self {
            active: true,
            scope: Some(claims.scope).filter(|scope| !scope.is_empty()),
            client_id: Some(claims.sub.clone()),
            token_type: Some(TokenType::Bearer),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            sub: Some(claims.sub),
            iss: Some(claims.iss),
            jti: Some(claims.jti),
        }
    }
}

/// Generate a unique token identifier
pub fn generate_token_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse scope string into a set
pub fn parse_scope(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(|s| s.to_string()).collect()
}

/// Join scopes into a space-separated string
pub fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().cloned().collect::<Vec<_>>().join(" ")
}
