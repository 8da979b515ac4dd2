//! seaauth authorization server binary.
//!
//! Loads the bootstrap clients and signing key from the environment, then
//! serves the token and discovery endpoints with graceful shutdown.

use anyhow::Result;
use seaauth::{
    config::Config,
    http::{AppState, build_router},
    oauth::{Argon2Verifier, ClientRegistry, CredentialVerifier, TokenIssuer},
};
use std::{env, sync::Arc};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "seaauth=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = seaauth::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting seaauth");

    let config = Config::new()?;

    let verifier: Arc<dyn CredentialVerifier> = Arc::new(Argon2Verifier::new());
    let client_registry = Arc::new(ClientRegistry::load(
        config.authorized_clients.clone().into_inner(),
        verifier.as_ref(),
    )?);

    let key_manager = Arc::new(
        config
            .signing_key_material
            .key_manager(&config.rsa_key_bits)?,
    );

    let token_issuer = Arc::new(TokenIssuer::new(
        client_registry.clone(),
        verifier,
        key_manager.clone(),
        config.external_base.clone(),
        *config.access_token_expiration.as_ref(),
    ));
    tracing::info!(
        issuer = %token_issuer.issuer(),
        key_id = %key_manager.key_id(),
        token_lifetime_seconds = token_issuer.token_lifetime().num_seconds(),
        "token issuer ready"
    );

    let app = build_router(AppState::new(token_issuer, key_manager, client_registry));

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Start HTTP server
    {
        let bind_address = format!("0.0.0.0:{}", config.http_port.as_ref());
        let listener = TcpListener::bind(&bind_address).await?;
        tracing::info!(%bind_address, issuer = %config.external_base, "Starting server");

        let inner_token = token.clone();
        tracker.spawn(async move {
            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_token.cancelled().await;
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "axum task failed");
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
