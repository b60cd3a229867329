//! # vidora-server
//!
//! HTTP API server for the Vidora video platform.
//!
//! This binary provides:
//! - **REST API** (axum) for accounts, the home feed, the watch page,
//!   uploads, reactions, subscriptions, and comments
//! - **SQLite persistence** through the `vidora-store` crate
//! - **Media storage** on the local filesystem, served under `/media/`
//! - **Signed access tokens** (Ed25519) so no session state lives on the
//!   server

mod api;
mod auth;
mod config;
mod error;
mod media_store;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vidora_store::Database;

use crate::api::AppState;
use crate::auth::TokenKeys;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vidora_server=debug")),
        )
        .init();

    info!("Starting Vidora server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        database = %config.database_path.display(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Database (runs pending migrations)
    let db = Database::open(&config.database_path)?;

    // Media store (creates directory if missing)
    let media = Arc::new(
        MediaStore::new(config.media_storage_path.clone(), config.max_upload_size).await?,
    );

    // Token signing key: configured seed, or a fresh ephemeral key
    let token_keys = match config.token_signing_key {
        Some(seed) => TokenKeys::from_seed(seed),
        None => {
            info!("No TOKEN_SIGNING_KEY configured, issued tokens will not survive a restart");
            TokenKeys::ephemeral()
        }
    };

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        media,
        token_keys,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
