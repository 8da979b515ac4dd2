//! Standardized error types following the `error-seaauth-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-seaauth-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when PORT cannot be parsed
    #[error("error-seaauth-config-2 Parsing PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-seaauth-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when duration string cannot be parsed
    #[error("error-seaauth-config-4 Failed to parse duration '{0}': {1}")]
    DurationParsingFailed(String, String),

    /// Error when a numeric setting cannot be parsed
    #[error("error-seaauth-config-5 Failed to parse {0}: {1}")]
    NumberParsingFailed(String, std::num::ParseIntError),

    /// Error when a base64 setting is empty
    #[error("error-seaauth-config-6 Base64 string for {0} is empty")]
    EmptyBase64(String),

    /// Error when a base64 setting cannot be decoded
    #[error("error-seaauth-config-7 Invalid base64 string for {0}: {1}")]
    InvalidBase64(String, String),

    /// Error when the authorized clients document has the wrong shape
    #[error("error-seaauth-config-8 Invalid YAML format: {0}")]
    InvalidClientsDocument(String),

    /// Error when the configured key material is incomplete or unreadable
    #[error("error-seaauth-config-9 Invalid key material: {0}")]
    InvalidKeyMaterial(String),
}

/// Client registry errors raised while loading bootstrap client records
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two records share the same client identifier
    #[error("error-seaauth-registry-1 Duplicate client: {0}")]
    DuplicateClient(String),

    /// A record failed validation
    #[error("error-seaauth-registry-2 Invalid client: {0}")]
    InvalidClient(String),

    /// A client secret could not be hashed
    #[error("error-seaauth-registry-3 Client secret hashing failed: {0}")]
    SecretHashingFailed(String),
}

/// Signing key errors
#[derive(Debug, Error)]
pub enum KeyError {
    /// RSA key generation failed
    #[error("error-seaauth-keys-1 Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// PEM or DER key material could not be decoded
    #[error("error-seaauth-keys-2 Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The RSA modulus is smaller than allowed
    #[error("error-seaauth-keys-3 RSA modulus of {0} bits is below the {1} bit minimum")]
    KeyTooSmall(usize, usize),

    /// The public key does not belong to the private key
    #[error("error-seaauth-keys-4 Public key does not match private key")]
    KeyMismatch,

    /// Token signing failed
    #[error("error-seaauth-keys-5 Signing failed: {0}")]
    SigningFailed(String),

    /// Token verification failed
    #[error("error-seaauth-keys-6 Verification failed: {0}")]
    VerificationFailed(String),
}

/// Credential hashing errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The hashing capability failed to produce a hash
    #[error("error-seaauth-credentials-1 Hashing failed: {0}")]
    HashingFailed(String),
}

/// OAuth token endpoint errors
#[derive(Debug, Error)]
pub enum OAuthError {
    /// No client is registered under the presented identifier
    #[error("error-seaauth-oauth-1 Unknown client: {0}")]
    UnknownClient(String),

    /// The presented secret does not match the stored hash
    #[error("error-seaauth-oauth-2 Invalid client credentials: {0}")]
    InvalidCredentials(String),

    /// The client may not use the requested grant type
    #[error("error-seaauth-oauth-3 Unauthorized grant type: {0}")]
    UnauthorizedGrantType(String),

    /// None of the requested scopes are allowed for the client
    #[error("error-seaauth-oauth-4 Invalid scope: {0}")]
    InvalidScope(String),

    /// The redirect URI is not registered for the client
    #[error("error-seaauth-oauth-5 Invalid redirect URI: {0}")]
    InvalidRedirect(String),

    /// Signing the token failed
    #[error("error-seaauth-oauth-6 Signing failed: {0}")]
    SigningFailed(String),

    /// The grant type is not served by this endpoint
    #[error("error-seaauth-oauth-7 Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// The request is missing a parameter or is malformed
    #[error("error-seaauth-oauth-8 Invalid request: {0}")]
    InvalidRequest(String),
}

impl OAuthError {
    /// RFC 6749 section 5.2 error code for this rejection
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuthError::UnknownClient(_) | OAuthError::InvalidCredentials(_) => "invalid_client",
            OAuthError::UnauthorizedGrantType(_) => "unauthorized_client",
            OAuthError::InvalidScope(_) => "invalid_scope",
            OAuthError::InvalidRedirect(_) | OAuthError::InvalidRequest(_) => "invalid_request",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::SigningFailed(_) => "server_error",
        }
    }

    /// Only signing faults are infrastructure errors worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, OAuthError::SigningFailed(_))
    }
}

impl From<KeyError> for OAuthError {
    fn from(err: KeyError) -> Self {
        OAuthError::SigningFailed(err.to_string())
    }
}
