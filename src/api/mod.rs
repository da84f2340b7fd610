//! REST surface.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → TraceLayer / TimeoutLayer / body limit
//!     → auth.rs (Bearer API key, everything except /health)
//!     → handlers.rs (parse, call service)
//!     → error.rs (CustodyError → status code + JSON body)
//! ```
//!
//! # Design Decisions
//! - Handlers are thin pass-throughs; all rules live in the services
//! - The request timeout must exceed the chain confirmation ceiling, since
//!   issuance and revocation wait for receipts

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::blockchain::BlockchainClient;
use crate::config::ServerConfig;
use crate::credential::CredentialOrchestrator;
use crate::custody::WalletCustody;
use crate::lifecycle::Services;
use crate::status_list::StatusListEngine;

use self::auth::api_key_middleware;
use self::handlers::*;

/// Shared state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub custody: Arc<WalletCustody>,
    pub status_lists: Arc<StatusListEngine>,
    pub credentials: Arc<CredentialOrchestrator>,
    /// Live node client for health reporting; absent when running on a fake chain.
    pub chain: Option<Arc<BlockchainClient>>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(services: &Services, chain: Option<Arc<BlockchainClient>>, api_key: &str) -> Self {
        Self {
            custody: services.custody.clone(),
            status_lists: services.status_lists.clone(),
            credentials: services.credentials.clone(),
            chain,
            api_key: Arc::from(api_key),
        }
    }
}

/// Build the full router with middleware.
#[allow(deprecated)]
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let protected = Router::new()
        .route("/wallets", post(create_wallet).get(list_wallets))
        .route("/wallets/import", post(import_wallet))
        .route(
            "/wallets/{address}",
            get(get_wallet).patch(update_wallet).delete(deactivate_wallet),
        )
        .route("/wallets/{address}/balance", get(wallet_balance))
        .route(
            "/wallets/{address}/issuer-role",
            get(issuer_role).post(grant_issuer_role),
        )
        .route("/status-lists", post(create_status_list).get(list_status_lists))
        .route("/status-lists/{list_id}", get(status_list_metadata))
        .route("/status-lists/{list_id}/uri", put(update_status_list_uri))
        .route("/status-lists/{list_id}/versions", get(status_list_versions))
        .route("/status-lists/{list_id}/document", get(status_list_document))
        .route("/status-lists/{list_id}/entries/{index}", get(status_list_entry))
        .route("/status-lists/{list_id}/reconcile", post(reconcile_list))
        .route("/credentials", post(issue_credential).get(list_credentials))
        .route("/credentials/verify", post(verify_credential))
        .route("/credentials/{credential_id}", get(get_credential))
        .route("/credentials/{credential_id}/revoke", post(revoke_credential))
        .route("/credentials/{credential_id}/restore", post(restore_credential))
        .route("/credentials/{credential_id}/chain-status", get(credential_chain_status))
        .route("/credentials/{credential_id}/anchor", get(credential_anchor))
        .route("/reconcile", post(reconcile_all))
        .layer(middleware::from_fn_with_state(state.clone(), api_key_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(server.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
        .layer(TraceLayer::new_for_http())
}
