//! Token issuance integration tests
//!
//! These tests drive the core from configuration values through to a signed
//! token, and check the token the way a resource server would: against the
//! published JWK set only.

use argon2::Params;
use base64::{Engine, prelude::BASE64_STANDARD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use seaauth::config::{AuthorizedClients, RsaKeyBits, SigningKeyMaterial};
use seaauth::errors::{KeyError, OAuthError};
use seaauth::oauth::*;
use std::sync::Arc;

const PRIVATE_PEM: &str = include_str!("fixtures/test_private_key.pem");
const PUBLIC_PEM: &str = include_str!("fixtures/test_public_key.pem");
const SMALL_PRIVATE_PEM: &str = include_str!("fixtures/small_private_key.pem");
const ISSUER: &str = "https://auth.example.com";

const CLIENTS_YAML: &str = r#"
clients:
  - client_description: Service A
    client_id: svc-a
    client_secret: s3cr3t
    scopes:
      - read
      - write
    grant_types:
      - client_credentials
  - client_description: Reporting
    client_id: reporting
    client_secret: rep0rts
    scopes:
      - reports
    grant_types:
      - Client_Credentials
      - password
"#;

fn token_issuer() -> (TokenIssuer, Arc<KeyManager>) {
    let clients = AuthorizedClients::try_from(BASE64_STANDARD.encode(CLIENTS_YAML)).unwrap();
    let verifier = Arc::new(Argon2Verifier::with_params(
        Params::new(1024, 1, 1, None).unwrap(),
    ));
    let registry =
        Arc::new(ClientRegistry::load(clients.into_inner(), verifier.as_ref()).unwrap());

    let key_material = SigningKeyMaterial::from_base64(
        Some(BASE64_STANDARD.encode(PRIVATE_PEM)),
        Some(BASE64_STANDARD.encode(PUBLIC_PEM)),
    )
    .unwrap();
    let keys = Arc::new(
        key_material
            .key_manager(&RsaKeyBits::try_from(None::<String>).unwrap())
            .unwrap(),
    );

    let issuer = TokenIssuer::new(
        registry,
        verifier,
        keys.clone(),
        ISSUER.to_string(),
        chrono::Duration::minutes(5),
    );

    (issuer, keys)
}

/// Validate a token using nothing but the published JWK set
fn verify_with_jwks(token: &str, jwks: &JsonWebKeySet) -> TokenClaims {
    let header = jsonwebtoken::decode_header(token).unwrap();
    assert_eq!(header.alg, Algorithm::RS256);

    let kid = header.kid.unwrap();
    let jwk = jwks.keys.iter().find(|key| key.kid == kid).unwrap();
    let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).unwrap();

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[ISSUER]);

    jsonwebtoken::decode::<TokenClaims>(token, &decoding_key, &validation)
        .unwrap()
        .claims
}

#[test]
fn test_client_credentials_token_verifies_against_jwks() {
    let (issuer, keys) = token_issuer();

    let request = TokenRequest::new("svc-a", "s3cr3t", GrantType::ClientCredentials)
        .with_scopes(["read"]);
    let token = issuer.issue(&request).unwrap();

    let claims = verify_with_jwks(&token.access_token, &keys.jwk_set());
    assert_eq!(claims.iss, ISSUER);
    assert_eq!(claims.sub, "svc-a");
    assert_eq!(claims.scope, "read");
    assert_eq!(claims.exp - claims.iat, 300);
    assert_eq!(claims, token.claims);
}

#[test]
fn test_verification_record_is_stable() {
    let (issuer, keys) = token_issuer();

    let first = keys.verification_record().clone();
    issuer
        .issue(&TokenRequest::new(
            "svc-a",
            "s3cr3t",
            GrantType::ClientCredentials,
        ))
        .unwrap();
    assert_eq!(&first, keys.verification_record());
    assert_eq!(keys.jwk_set(), keys.jwk_set());
    assert_eq!(
        first.to_public_key_pem().unwrap().trim(),
        PUBLIC_PEM.trim()
    );
}

#[test]
fn test_unrecognized_grant_types_are_ignored_at_load() {
    let (issuer, _) = token_issuer();

    let token = issuer
        .issue(&TokenRequest::new(
            "reporting",
            "rep0rts",
            GrantType::ClientCredentials,
        ))
        .unwrap();
    assert_eq!(token.claims.scope, "reports");

    let result = issuer.issue(&TokenRequest::new(
        "reporting",
        "rep0rts",
        GrantType::RefreshToken,
    ));
    assert!(matches!(result, Err(OAuthError::UnauthorizedGrantType(_))));
}

#[test]
fn test_rejections_for_svc_a() {
    let (issuer, _) = token_issuer();

    let cases = [
        (
            TokenRequest::new("svc-a", "wrong", GrantType::ClientCredentials),
            "invalid_client",
        ),
        (
            TokenRequest::new("svc-a", "s3cr3t", GrantType::AuthorizationCode),
            "unauthorized_client",
        ),
        (
            TokenRequest::new("svc-z", "s3cr3t", GrantType::ClientCredentials),
            "invalid_client",
        ),
        (
            TokenRequest::new("svc-a", "s3cr3t", GrantType::ClientCredentials)
                .with_scopes(["reports"]),
            "invalid_scope",
        ),
    ];

    for (request, code) in cases {
        let err = issuer.issue(&request).unwrap_err();
        assert_eq!(err.error_code(), code, "{request:?}");
        assert!(!err.is_retryable());
    }
}

#[test]
fn test_concurrent_issuance() {
    let (issuer, keys) = token_issuer();
    let issuer = Arc::new(issuer);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let issuer = issuer.clone();
            std::thread::spawn(move || {
                issuer
                    .issue(&TokenRequest::new(
                        "svc-a",
                        "s3cr3t",
                        GrantType::ClientCredentials,
                    ))
                    .unwrap()
            })
        })
        .collect();

    let jwks = keys.jwk_set();
    let mut token_ids: Vec<String> = handles
        .into_iter()
        .map(|handle| verify_with_jwks(&handle.join().unwrap().access_token, &jwks).jti)
        .collect();
    token_ids.sort();
    token_ids.dedup();
    assert_eq!(token_ids.len(), 4);
}

#[test]
fn test_small_keys_are_rejected() {
    let result = KeyManager::from_pem(SMALL_PRIVATE_PEM, None);
    assert!(matches!(result, Err(KeyError::KeyTooSmall(1024, 2048))));
}
