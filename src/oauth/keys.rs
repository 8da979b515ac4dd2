//! RSA signing key ownership and the published verification key set.
//!
//! The private key is consumed when a [`KeyManager`] is built: it is turned
//! into a signing key and then dropped (the `rsa` crate zeroizes it). Only the
//! key id and the public key are reachable from outside.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    traits::PublicKeyParts,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use uuid::Uuid;

use crate::errors::KeyError;

/// Smallest accepted RSA modulus
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// Modulus size used when no key material is configured
pub const DEFAULT_RSA_KEY_BITS: usize = 2048;

/// Algorithm of every issued token
const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// JWK (JSON Web Key) representation for the JWKS endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA")
    pub kty: String,
    /// Public key use (always "sig")
    #[serde(rename = "use")]
    pub key_use: String,
    /// Key ID
    pub kid: String,
    /// Algorithm (RS256)
    pub alg: String,
    /// RSA modulus (base64url encoded)
    pub n: String,
    /// RSA exponent (base64url encoded)
    pub e: String,
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// Public half of the signing key, safe to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub key_id: String,
    pub public_key: RsaPublicKey,
}

impl VerificationRecord {
    pub fn to_jwk(&self) -> JsonWebKey {
        JsonWebKey {
            kty: "RSA".to_string(),
            key_use: "sig".to_string(),
            kid: self.key_id.clone(),
            alg: "RS256".to_string(),
            n: BASE64_URL_SAFE_NO_PAD.encode(self.public_key.n().to_bytes_be()),
            e: BASE64_URL_SAFE_NO_PAD.encode(self.public_key.e().to_bytes_be()),
        }
    }

    /// SPKI PEM encoding of the public key
    pub fn to_public_key_pem(&self) -> Result<String, KeyError> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("public key PEM export: {e}")))
    }
}

/// Owns the process signing key.
///
/// Built once at startup and shared behind an `Arc`; signing takes `&self` and
/// needs no locking.
pub struct KeyManager {
    verification: VerificationRecord,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl KeyManager {
    /// Generate a fresh RSA key pair
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_RSA_KEY_BITS {
            return Err(KeyError::KeyTooSmall(bits, MIN_RSA_KEY_BITS));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| KeyError::KeyGenerationFailed(e.to_string()))?;

        Self::from_private_key(private_key)
    }

    /// Load a PKCS#8 (or PKCS#1) private key and an optional SPKI public key.
    ///
    /// When the public key is given it must belong to the private key.
    pub fn from_pem(private_pem: &str, public_pem: Option<&str>) -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("private key: {e}")))?;

        if let Some(public_pem) = public_pem {
            let public_key = RsaPublicKey::from_public_key_pem(public_pem)
                .map_err(|e| KeyError::InvalidKeyMaterial(format!("public key: {e}")))?;

            if public_key != RsaPublicKey::from(&private_key) {
                return Err(KeyError::KeyMismatch);
            }
        }

        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, KeyError> {
        let public_key = RsaPublicKey::from(&private_key);

        let bits = public_key.n().bits();
        if bits < MIN_RSA_KEY_BITS {
            return Err(KeyError::KeyTooSmall(bits, MIN_RSA_KEY_BITS));
        }

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("private key PEM export: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("signing key: {e}")))?;

        let verification = VerificationRecord {
            key_id: Uuid::new_v4().to_string(),
            public_key,
        };

        let jwk = verification.to_jwk();
        let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|e| KeyError::InvalidKeyMaterial(format!("verification key: {e}")))?;

        tracing::info!(kid = %verification.key_id, bits, "signing key ready");

        Ok(Self {
            verification,
            encoding_key,
            decoding_key,
        })
    }

    pub fn key_id(&self) -> &str {
        &self.verification.key_id
    }

    /// Key id and public key; identical for the lifetime of the manager
    pub fn verification_record(&self) -> &VerificationRecord {
        &self.verification
    }

    pub fn jwk_set(&self) -> JsonWebKeySet {
        JsonWebKeySet {
            keys: vec![self.verification.to_jwk()],
        }
    }

    /// Sign claims as an RS256 JWS carrying this key's `kid`
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, KeyError> {
        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(self.verification.key_id.clone());

        jsonwebtoken::encode(&header, claims, &self.encoding_key)
            .map_err(|e| KeyError::SigningFailed(e.to_string()))
    }

    /// Check signature, `kid`, issuer and expiry of a token signed by this manager
    pub fn verify<T: DeserializeOwned>(&self, token: &str, issuer: &str) -> Result<T, KeyError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| KeyError::VerificationFailed(e.to_string()))?;

        if header.kid.as_deref() != Some(self.verification.key_id.as_str()) {
            return Err(KeyError::VerificationFailed("unknown key id".to_string()));
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        jsonwebtoken::decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| KeyError::VerificationFailed(e.to_string()))
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_id", &self.verification.key_id)
            .finish_non_exhaustive()
    }
}
