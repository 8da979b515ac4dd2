//! Environment-based configuration types for the authorization server.

use anyhow::Result;
use base64::{Engine, prelude::BASE64_STANDARD};
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::errors::{ConfigError, KeyError};
use crate::oauth::keys::{DEFAULT_RSA_KEY_BITS, KeyManager};
use crate::oauth::types::ClientRecordInput;

/// HTTP server port configuration
#[derive(Clone, Debug)]
pub struct HttpPort(u16);

/// Access token lifetime configuration
#[derive(Clone, Debug)]
pub struct AccessTokenExpiration(chrono::Duration);

/// Bootstrap client records decoded from the base64 YAML document
#[derive(Clone, Debug)]
pub struct AuthorizedClients(Vec<ClientRecordInput>);

/// Modulus size used when a signing key has to be generated
#[derive(Clone, Debug)]
pub struct RsaKeyBits(usize);

/// PEM encoded signing key material, held until the key manager is built
#[derive(Clone, Default)]
pub struct SigningKeyMaterial {
    private_pem: Option<Zeroizing<String>>,
    public_pem: Option<Zeroizing<String>>,
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub external_base: String,
    pub access_token_expiration: AccessTokenExpiration,
    pub authorized_clients: AuthorizedClients,
    pub signing_key_material: SigningKeyMaterial,
    pub rsa_key_bits: RsaKeyBits,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let external_base = require_env("EXTERNAL_BASE")?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let access_token_expiration: AccessTokenExpiration =
            default_env("ACCESS_TOKEN_EXPIRATION", "5m").try_into()?;
        let authorized_clients: AuthorizedClients =
            require_env("AUTHORIZED_CLIENTS_YAML_BASE64")?.try_into()?;
        let signing_key_material = SigningKeyMaterial::from_base64(
            optional_env("PRIVATE_KEY_PEM_BASE64"),
            optional_env("PUBLIC_KEY_PEM_BASE64"),
        )?;
        let rsa_key_bits: RsaKeyBits = optional_env("RSA_KEY_BITS").try_into()?;

        Ok(Self {
            version: version()?,
            http_port,
            external_base: external_base.trim_end_matches('/').to_string(),
            access_token_expiration,
            authorized_clients,
            signing_key_material,
            rsa_key_bits,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

/// Decode a base64 setting whose value may have been wrapped across lines.
pub fn decode_base64_setting(name: &str, value: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    let compact: Zeroizing<String> = Zeroizing::new(
        value
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect(),
    );

    if compact.is_empty() {
        return Err(ConfigError::EmptyBase64(name.to_string()));
    }

    BASE64_STANDARD
        .decode(compact.as_bytes())
        .map(Zeroizing::new)
        .map_err(|e| ConfigError::InvalidBase64(name.to_string(), e.to_string()))
}

#[derive(Deserialize)]
struct ClientsDocument {
    clients: serde_yaml::Value,
}

/// Parse a YAML document of the form `clients: [ ... ]` into client records.
pub fn parse_clients_document(yaml: &str) -> Result<Vec<ClientRecordInput>, ConfigError> {
    let list_required =
        || ConfigError::InvalidClientsDocument("'clients' key must be a list".to_string());

    let document: ClientsDocument = serde_yaml::from_str(yaml).map_err(|_| list_required())?;
    if !document.clients.is_sequence() {
        return Err(list_required());
    }

    serde_yaml::from_value(document.clients)
        .map_err(|e| ConfigError::InvalidClientsDocument(e.to_string()))
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for AccessTokenExpiration {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(chrono::Duration::from_std(duration)?))
    }
}

impl AsRef<chrono::Duration> for AccessTokenExpiration {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for AuthorizedClients {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let decoded = decode_base64_setting("authorized clients YAML", &value)?;
        let yaml = std::str::from_utf8(&decoded).map_err(|_| {
            ConfigError::InvalidClientsDocument("document is not valid UTF-8".to_string())
        })?;

        Ok(Self(parse_clients_document(yaml)?))
    }
}

impl AuthorizedClients {
    pub fn into_inner(self) -> Vec<ClientRecordInput> {
        self.0
    }
}

impl AsRef<Vec<ClientRecordInput>> for AuthorizedClients {
    fn as_ref(&self) -> &Vec<ClientRecordInput> {
        &self.0
    }
}

impl TryFrom<Option<String>> for RsaKeyBits {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        match value {
            None => Ok(Self(DEFAULT_RSA_KEY_BITS)),
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(Self)
                .map_err(|err| {
                    ConfigError::NumberParsingFailed("RSA_KEY_BITS".to_string(), err).into()
                }),
        }
    }
}

impl AsRef<usize> for RsaKeyBits {
    fn as_ref(&self) -> &usize {
        &self.0
    }
}

impl SigningKeyMaterial {
    /// Build from the base64 encoded PEM settings. A public key without its
    /// private key is rejected.
    pub fn from_base64(
        private_key: Option<String>,
        public_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let private_pem = private_key
            .map(|value| Self::decode_pem("private key PEM", &value))
            .transpose()?;
        let public_pem = public_key
            .map(|value| Self::decode_pem("public key PEM", &value))
            .transpose()?;

        Self::from_pem(private_pem, public_pem)
    }

    pub fn from_pem(
        private_pem: Option<Zeroizing<String>>,
        public_pem: Option<Zeroizing<String>>,
    ) -> Result<Self, ConfigError> {
        if private_pem.is_none() && public_pem.is_some() {
            return Err(ConfigError::InvalidKeyMaterial(
                "a public key was configured without its private key".to_string(),
            ));
        }

        Ok(Self {
            private_pem,
            public_pem,
        })
    }

    fn decode_pem(name: &str, value: &str) -> Result<Zeroizing<String>, ConfigError> {
        let decoded = decode_base64_setting(name, value)?;
        std::str::from_utf8(&decoded)
            .map(|pem| Zeroizing::new(pem.to_string()))
            .map_err(|_| ConfigError::InvalidKeyMaterial(format!("{name} is not valid UTF-8")))
    }

    /// Load the configured key pair, or generate a fresh one when no key
    /// material was supplied.
    pub fn key_manager(&self, bits: &RsaKeyBits) -> Result<KeyManager, KeyError> {
        match &self.private_pem {
            Some(private_pem) => {
                KeyManager::from_pem(private_pem, self.public_pem.as_ref().map(|pem| pem.as_str()))
            }
            None => {
                tracing::warn!(
                    bits = bits.0,
                    "no signing key configured, generating an ephemeral key; tokens will not verify after restart"
                );
                KeyManager::generate(bits.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::types::GrantType;

    const PRIVATE_PEM: &str = include_str!("../tests/fixtures/test_private_key.pem");
    const PUBLIC_PEM: &str = include_str!("../tests/fixtures/test_public_key.pem");
    const OTHER_PUBLIC_PEM: &str = include_str!("../tests/fixtures/other_public_key.pem");

    const CLIENTS_YAML: &str = r#"
clients:
  - client_description: Service A
    client_id: svc-a
    client_secret: s3cr3t
    scopes: [read, write]
    grant_types: [client_credentials]
  - client_description: Web App
    client_id: web-app
    client_secret: web-secret
    scopes: [openid]
    grant_types: [AUTHORIZATION_CODE, refresh_token]
    redirect_uris:
      - https://app.example.com/callback
"#;

    fn encode(value: &str) -> String {
        BASE64_STANDARD.encode(value)
    }

    #[test]
    fn test_http_port() {
        assert_eq!(*HttpPort::try_from("9090".to_string()).unwrap().as_ref(), 9090);
        assert_eq!(*HttpPort::try_from(String::new()).unwrap().as_ref(), 8080);
        assert!(HttpPort::try_from("http".to_string()).is_err());
    }

    #[test]
    fn test_access_token_expiration() {
        let expiration = AccessTokenExpiration::try_from("5m".to_string()).unwrap();
        assert_eq!(*expiration.as_ref(), chrono::Duration::minutes(5));

        let expiration = AccessTokenExpiration::try_from("1h".to_string()).unwrap();
        assert_eq!(*expiration.as_ref(), chrono::Duration::hours(1));

        let err = AccessTokenExpiration::try_from("soon".to_string()).unwrap_err();
        assert!(err.to_string().starts_with("error-seaauth-config-4"));
    }

    #[test]
    fn test_rsa_key_bits() {
        assert_eq!(*RsaKeyBits::try_from(None::<String>).unwrap().as_ref(), 2048);
        assert_eq!(
            *RsaKeyBits::try_from(Some("4096".to_string())).unwrap().as_ref(),
            4096
        );
        assert!(RsaKeyBits::try_from(Some("lots".to_string())).is_err());
    }

    #[test]
    fn test_authorized_clients_decoding() {
        let clients = AuthorizedClients::try_from(encode(CLIENTS_YAML)).unwrap();
        let clients = clients.into_inner();

        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].client_id, "svc-a");
        assert_eq!(clients[0].client_description, "Service A");
        assert_eq!(clients[0].scopes, vec!["read", "write"]);
        assert!(clients[0].redirect_uris.is_none());
        assert_eq!(clients[1].grant_types, vec!["AUTHORIZATION_CODE", "refresh_token"]);
        assert_eq!(
            clients[1].redirect_uris,
            Some(vec!["https://app.example.com/callback".to_string()])
        );
        assert_eq!(GrantType::parse(&clients[1].grant_types[0]), Some(GrantType::AuthorizationCode));
    }

    #[test]
    fn test_authorized_clients_accepts_wrapped_base64() {
        let encoded = encode(CLIENTS_YAML);
        let wrapped = encoded
            .as_bytes()
            .chunks(76)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\n");

        let clients = AuthorizedClients::try_from(wrapped).unwrap();
        assert_eq!(clients.as_ref().len(), 2);
    }

    #[test]
    fn test_authorized_clients_empty() {
        let err = AuthorizedClients::try_from("\n".to_string()).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn test_authorized_clients_invalid_base64() {
        let err = AuthorizedClients::try_from("not*base64!".to_string()).unwrap_err();
        assert!(err.to_string().contains("Invalid base64"));
    }

    #[test]
    fn test_clients_key_must_be_a_list() {
        for yaml in ["clients: svc-a", "other: []", "- svc-a", "clients:\n  svc-a: {}"] {
            let err = parse_clients_document(yaml).unwrap_err();
            assert!(
                err.to_string().contains("'clients' key must be a list"),
                "unexpected error for {yaml:?}: {err}"
            );
        }
    }

    #[test]
    fn test_clients_non_string_list_entries_are_skipped() {
        let records = parse_clients_document(
            "clients:\n  - client_id: svc-a\n    client_secret: s3cr3t\n    scopes: [read, 123]\n    grant_types: [client_credentials, true]\n",
        )
        .unwrap();

        assert_eq!(records[0].scopes, vec!["read"]);
        assert_eq!(records[0].grant_types, vec!["client_credentials"]);
    }

    #[test]
    fn test_clients_missing_required_field() {
        let err = parse_clients_document("clients:\n  - client_id: svc-a\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidClientsDocument(_)));
    }

    #[test]
    fn test_signing_key_material_public_only_is_rejected() {
        let result = SigningKeyMaterial::from_base64(None, Some(encode(PUBLIC_PEM)));
        assert!(matches!(result, Err(ConfigError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_signing_key_material_pair() {
        let material =
            SigningKeyMaterial::from_base64(Some(encode(PRIVATE_PEM)), Some(encode(PUBLIC_PEM)))
                .unwrap();

        let keys = material.key_manager(&RsaKeyBits(2048)).unwrap();
        assert_eq!(
            keys.verification_record().to_public_key_pem().unwrap().trim(),
            PUBLIC_PEM.trim()
        );
    }

    #[test]
    fn test_signing_key_material_private_only() {
        let material = SigningKeyMaterial::from_base64(Some(encode(PRIVATE_PEM)), None).unwrap();
        assert!(material.key_manager(&RsaKeyBits(2048)).is_ok());
    }

    #[test]
    fn test_signing_key_material_mismatch() {
        let material = SigningKeyMaterial::from_base64(
            Some(encode(PRIVATE_PEM)),
            Some(encode(OTHER_PUBLIC_PEM)),
        )
        .unwrap();

        assert!(matches!(
            material.key_manager(&RsaKeyBits(2048)),
            Err(KeyError::KeyMismatch)
        ));
    }

    #[test]
    fn test_signing_key_material_invalid_base64() {
        let result = SigningKeyMaterial::from_base64(Some("%%%".to_string()), None);
        assert!(matches!(result, Err(ConfigError::InvalidBase64(_, _))));
    }

    #[test]
    fn test_version() {
        assert!(!version().unwrap().is_empty());
    }
}
