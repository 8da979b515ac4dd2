//! Immutable registry of bootstrap OAuth clients.
//!
//! Records are validated and their secrets hashed once, when the registry is
//! built. After that the registry is only read, so it can be shared across
//! request handlers behind an `Arc` without any locking.

use std::collections::{BTreeSet, HashMap};
use url::Url;

use crate::errors::{OAuthError, RegistryError};
use crate::oauth::credentials::CredentialVerifier;
use crate::oauth::types::{ClientRecord, ClientRecordInput, GrantType};

/// Client Registry
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientRecord>,
}

impl ClientRegistry {
    /// Validate and hash every input record. Any invalid record aborts the
    /// whole load; a partially built registry is never returned.
    pub fn load(
        records: Vec<ClientRecordInput>,
        verifier: &dyn CredentialVerifier,
    ) -> Result<Self, RegistryError> {
        let mut clients = HashMap::with_capacity(records.len());

        for input in records {
            let record = Self::build_record(input, verifier)?;

            if clients.contains_key(&record.client_id) {
                return Err(RegistryError::DuplicateClient(record.client_id));
            }

            tracing::info!(
                client_id = %record.client_id,
                description = %record.description,
                "registering client"
            );
            clients.insert(record.client_id.clone(), record);
        }

        tracing::info!(count = clients.len(), "client registry loaded");

        Ok(Self { clients })
    }

    fn build_record(
        input: ClientRecordInput,
        verifier: &dyn CredentialVerifier,
    ) -> Result<ClientRecord, RegistryError> {
        let client_id = input.client_id.trim().to_string();
        if client_id.is_empty() {
            return Err(RegistryError::InvalidClient(
                "client_id must not be empty".to_string(),
            ));
        }

        if input.client_secret.is_empty() {
            return Err(RegistryError::InvalidClient(format!(
                "client {client_id} has no client_secret"
            )));
        }

        let grant_types: BTreeSet<GrantType> = input
            .grant_types
            .iter()
            .filter_map(|name| {
                let grant_type = GrantType::parse(name);
                if grant_type.is_none() {
                    tracing::debug!(client_id = %client_id, grant_type = %name, "ignoring unrecognized grant type");
                }
                grant_type
            })
            .collect();

        if grant_types.is_empty() {
            return Err(RegistryError::InvalidClient(format!(
                "client {client_id} has no recognized grant type"
            )));
        }

        let scopes: BTreeSet<String> = input
            .scopes
            .iter()
            .map(|scope| scope.trim())
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect();

        if let Some(scope) = scopes.iter().find(|scope| scope.contains(char::is_whitespace)) {
            return Err(RegistryError::InvalidClient(format!(
                "client {client_id} scope '{scope}' contains whitespace"
            )));
        }

        let redirect_uris = input.redirect_uris.unwrap_or_default();
        for redirect_uri in &redirect_uris {
            Self::validate_redirect_uri(&client_id, redirect_uri)?;
        }

        let client_secret_hash = verifier
            .hash(&input.client_secret)
            .map_err(|e| RegistryError::SecretHashingFailed(format!("client {client_id}: {e}")))?;

        Ok(ClientRecord {
            client_id,
            client_secret_hash,
            description: input.client_description,
            scopes,
            grant_types,
            redirect_uris,
        })
    }

    fn validate_redirect_uri(client_id: &str, redirect_uri: &str) -> Result<(), RegistryError> {
        let url = Url::parse(redirect_uri).map_err(|e| {
            RegistryError::InvalidClient(format!(
                "client {client_id} redirect URI '{redirect_uri}' is invalid: {e}"
            ))
        })?;

        if url.fragment().is_some() {
            return Err(RegistryError::InvalidClient(format!(
                "client {client_id} redirect URI '{redirect_uri}' must not contain a fragment"
            )));
        }

        Ok(())
    }

    /// Look up a client by identifier
    pub fn lookup(&self, client_id: &str) -> Result<&ClientRecord, OAuthError> {
        self.clients
            .get(client_id)
            .ok_or_else(|| OAuthError::UnknownClient(client_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Union of all registered scopes
    pub fn scopes(&self) -> BTreeSet<String> {
        self.clients
            .values()
            .flat_map(|client| client.scopes.iter().cloned())
            .collect()
    }

    pub fn clients(&self) -> impl Iterator<Item = &ClientRecord> {
        self.clients.values()
    }
}
