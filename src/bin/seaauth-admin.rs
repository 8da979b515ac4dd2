//! seaauth administration CLI.
//!
//! Prepares the environment values the server reads at startup:
//!
//! ```bash
//! # Fresh RSA key pair as PRIVATE_KEY_PEM_BASE64 / PUBLIC_KEY_PEM_BASE64 lines
//! seaauth-admin generate-keys --bits 3072
//!
//! # AUTHORIZED_CLIENTS_YAML_BASE64 value for a clients document
//! seaauth-admin encode-clients clients.yaml
//!
//! # Validate a clients document (plain YAML, or base64 with --base64)
//! seaauth-admin check-clients clients.yaml
//! ```

use anyhow::{Context, Result};
use base64::{Engine, prelude::BASE64_STANDARD};
use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding},
};
use seaauth::{
    config::{decode_base64_setting, parse_clients_document},
    errors::KeyError,
    oauth::{
        Argon2Verifier, ClientRegistry, KeyManager, join_scopes,
        keys::{DEFAULT_RSA_KEY_BITS, MIN_RSA_KEY_BITS},
    },
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "seaauth-admin")]
#[command(about = "Prepare configuration for the seaauth authorization server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA signing key pair and print it as environment lines
    GenerateKeys {
        /// RSA modulus size in bits
        #[arg(long, default_value_t = DEFAULT_RSA_KEY_BITS)]
        bits: usize,
    },
    /// Print the base64 encoding of a clients YAML document
    EncodeClients {
        /// Path to the clients YAML document
        file: PathBuf,
    },
    /// Load a clients document into a registry and summarize it
    CheckClients {
        /// Path to the clients document
        file: PathBuf,

        /// The file holds the base64 encoded document
        #[arg(long)]
        base64: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::GenerateKeys { bits } => generate_keys(bits),
        Commands::EncodeClients { file } => encode_clients(&file),
        Commands::CheckClients { file, base64 } => check_clients(&file, base64),
    }
}

fn generate_keys(bits: usize) -> Result<()> {
    if bits < MIN_RSA_KEY_BITS {
        return Err(KeyError::KeyTooSmall(bits, MIN_RSA_KEY_BITS).into());
    }

    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| KeyError::KeyGenerationFailed(e.to_string()))?;
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::InvalidKeyMaterial(e.to_string()))?;
    let public_pem = RsaPublicKey::from(&private_key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::InvalidKeyMaterial(e.to_string()))?;

    // Refuse to print a pair the server would not load
    KeyManager::from_pem(&private_pem, Some(public_pem.as_str()))?;

    println!(
        "PRIVATE_KEY_PEM_BASE64={}",
        BASE64_STANDARD.encode(private_pem.as_bytes())
    );
    println!(
        "PUBLIC_KEY_PEM_BASE64={}",
        BASE64_STANDARD.encode(public_pem.as_bytes())
    );

    Ok(())
}

fn encode_clients(file: &Path) -> Result<()> {
    let yaml = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    parse_clients_document(&yaml)?;

    println!("{}", BASE64_STANDARD.encode(yaml.as_bytes()));

    Ok(())
}

fn check_clients(file: &Path, base64: bool) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let records = if base64 {
        let decoded = decode_base64_setting("authorized clients YAML", &contents)?;
        parse_clients_document(std::str::from_utf8(&decoded)?)?
    } else {
        parse_clients_document(&contents)?
    };

    let registry = ClientRegistry::load(records, &Argon2Verifier::new())?;

    let mut clients: Vec<_> = registry.clients().collect();
    clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));

    println!("{} client(s) loaded", registry.len());
    for client in clients {
        let grant_types = client
            .grant_types
            .iter()
            .map(|grant_type| grant_type.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        println!();
        println!("client_id:     {}", client.client_id);
        println!("description:   {}", client.description);
        println!("grant_types:   {grant_types}");
        println!("scopes:        {}", join_scopes(&client.scopes));
        if !client.redirect_uris.is_empty() {
            println!("redirect_uris: {}", client.redirect_uris.join(", "));
        }
    }

    Ok(())
}
