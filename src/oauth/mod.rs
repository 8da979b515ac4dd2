//! OAuth 2.1 token issuance core: client registry, credential verification,
//! signing keys, and the token issuer that ties them together.

pub mod clients;
pub mod credentials;
pub mod keys;
pub mod token_issuer;
pub mod types;

// Re-export frequently used items from each module
pub use clients::ClientRegistry;
pub use credentials::{Argon2Verifier, CredentialVerifier};
pub use keys::{JsonWebKey, JsonWebKeySet, KeyManager, VerificationRecord};
pub use token_issuer::TokenIssuer;
pub use types::{
    ClientRecord, ClientRecordInput, GrantType, IntrospectionResponse, IssuedToken,
    OAuthErrorResponse, TokenClaims, TokenRequest, TokenResponse, TokenType, join_scopes,
    parse_scope,
};
