//! Verifiable credential custody service.
//!
//! # Architecture Overview
//!
//! ```text
//!     REST client
//!         │
//!         ▼
//!     api (axum, Bearer auth)
//!         │
//!         ▼
//!     credential::orchestrator ──────► status_list::engine
//!         │                                 │
//!         ▼                                 ▼
//!     custody::wallet_service ──► vault   blockchain::transaction
//!                                           │
//!                                           ▼
//!                                     blockchain::client ──► EVM node
//!
//!     storage (DashMap + JSON snapshot) under every service
//!     lifecycle::reconciler finishes pending status list updates
//! ```
//!
//! The config file path is the first argument or `CUSTODY_CONFIG`; without
//! either, defaults are used. Secrets come from the environment.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use vc_custody::api::{self, AppState};
use vc_custody::blockchain::BlockchainClient;
use vc_custody::config::{load_config, CustodyConfig, Secrets};
use vc_custody::lifecycle::{build_services, run_reconciler, signals, Shutdown};
use vc_custody::observability::{logging, metrics};
use vc_custody::storage::MemoryStore;

const DEFAULT_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CUSTODY_CONFIG").ok())
        .map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => CustodyConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "vc-custody starting"
    );
    if config.api.api_key == DEFAULT_API_KEY {
        tracing::warn!("API key is the built-in placeholder; set api.api_key");
    }

    let secrets = Secrets::from_env(&config.vault)?;

    let client = Arc::new(BlockchainClient::new(config.blockchain.clone()).await?);
    client.verify_chain_id().await?;

    let store = match &config.storage.snapshot_path {
        Some(path) => MemoryStore::load_from_file(path)?,
        None => MemoryStore::new(),
    };
    let services = build_services(&config, &secrets, client.clone(), store)?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let reconciler = config.reconciler.enabled.then(|| {
        tokio::spawn(run_reconciler(
            services.credentials.clone(),
            config.reconciler.clone(),
            shutdown.subscribe(),
        ))
    });

    let app = api::router(
        AppState::new(&services, Some(client), &config.api.api_key),
        &config.server,
    );
    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(signals::wait_for_signal())
        .await?;

    shutdown.trigger();
    if let Some(handle) = reconciler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Reconciler task failed");
        }
    }

    let pending = services.status_lists.pending_lists();
    if !pending.is_empty() {
        tracing::warn!(lists = ?pending, "Exiting with unreconciled status list updates");
    }
    services.store.save_to_file()?;

    tracing::info!("Shutdown complete");
    Ok(())
}
