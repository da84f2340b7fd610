//! Service wiring.
//!
//! # Responsibilities
//! - Build the encoder, transaction manager and capability check for a chain
//! - Construct the vault, custody, status list and credential services in
//!   dependency order over one store
//!
//! # Design Decisions
//! - The chain is passed in as a [`ChainAdapter`], so the same wiring runs
//!   against a live node or a scripted fake
//! - Secrets are handed over explicitly; nothing is global

use std::sync::Arc;

use crate::blockchain::{
    AbiEncoder, ChainAdapter, ContractAddresses, ContractEncoder, ContractRoleCheck,
    IssuerCapability, SigningCredentials, TransactionManager, TxParams,
};
use crate::config::{CustodyConfig, Secrets};
use crate::credential::CredentialOrchestrator;
use crate::custody::WalletCustody;
use crate::error::{CustodyError, CustodyResult};
use crate::status_list::StatusListEngine;
use crate::storage::MemoryStore;
use crate::vault::KeyVault;

/// Fully wired services sharing one store and one transaction manager.
#[derive(Clone)]
pub struct Services {
    pub store: MemoryStore,
    pub transactions: Arc<TransactionManager>,
    pub custody: Arc<WalletCustody>,
    pub status_lists: Arc<StatusListEngine>,
    pub credentials: Arc<CredentialOrchestrator>,
}

pub fn build_services(
    config: &CustodyConfig,
    secrets: &Secrets,
    chain: Arc<dyn ChainAdapter>,
    store: MemoryStore,
) -> CustodyResult<Services> {
    let encoder: Arc<dyn ContractEncoder> =
        Arc::new(AbiEncoder::new(ContractAddresses::from_config(&config.contracts)?));
    let transactions = Arc::new(TransactionManager::new(
        chain,
        TxParams::from(&config.blockchain),
    ));
    let capability: Arc<dyn IssuerCapability> =
        Arc::new(ContractRoleCheck::new(transactions.clone(), encoder.clone()));

    let admin = secrets
        .admin_private_key
        .as_ref()
        .map(|key| SigningCredentials::from_private_key(key, config.blockchain.chain_id))
        .transpose()
        .map_err(|e| CustodyError::Crypto(format!("admin key: {}", e)))?;

    let vault = Arc::new(KeyVault::new(
        secrets.master_password.clone(),
        config.vault.kdf_iterations,
    ));
    let shared = Arc::new(store.clone());

    let custody = Arc::new(WalletCustody::new(
        shared.clone(),
        vault,
        transactions.clone(),
        encoder.clone(),
        capability.clone(),
        admin,
    ));
    let status_lists = Arc::new(StatusListEngine::new(
        shared.clone(),
        shared.clone(),
        transactions.clone(),
        encoder.clone(),
        capability,
        config.status_lists.clone(),
    ));
    let credentials = Arc::new(CredentialOrchestrator::new(
        custody.clone(),
        status_lists.clone(),
        transactions.clone(),
        encoder,
        shared,
        config.credentials.clone(),
    ));

    tracing::info!(
        chain_id = config.blockchain.chain_id,
        registry = %config.contracts.registry_address,
        "Services initialized"
    );

    Ok(Services {
        store,
        transactions,
        custody,
        status_lists,
        credentials,
    })
}
