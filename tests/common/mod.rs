//! Shared utilities for integration tests: a scripted in-process chain and
//! fully wired services running on it.

#![allow(dead_code)]

use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::{Transaction as _, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vc_custody::blockchain::contracts::{encode_bool, function_name_for};
use vc_custody::blockchain::{BlockchainError, BlockchainResult, ChainAdapter, ChainReceipt};
use vc_custody::config::{CustodyConfig, Secrets};
use vc_custody::credential::{AnchorStatus, IssueRequest};
use vc_custody::custody::WalletMetadata;
use vc_custody::lifecycle::{build_services, Services};
use vc_custody::status_list::{StatusListRecord, StatusPurpose};
use vc_custody::storage::MemoryStore;

pub const MASTER_PASSWORD: &str = "master-password-for-tests";
/// Well-known development key; used as the admin signer.
pub const ADMIN_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const API_KEY: &str = "integration-test-api-key";

/// What the fake node does with a transaction for a given function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Accept and mine with success.
    Mine,
    /// Reject the raw transaction at submission.
    Reject,
    /// Mine with failed execution.
    Revert,
    /// Accept but do not mine until released.
    Hold,
    /// Accept and mine, but lose the submit response.
    DropResponse,
}

#[derive(Debug, Clone)]
pub struct Submitted {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub function: &'static str,
}

#[derive(Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, ChainReceipt>,
    held: Vec<TxHash>,
    defaults: HashMap<&'static str, Behavior>,
    once: HashMap<&'static str, VecDeque<Behavior>>,
    submitted: Vec<Submitted>,
    rejected: Vec<&'static str>,
    /// `None` grants the issuer role to everyone.
    issuers: Option<HashSet<Address>>,
    revoked_on_chain: bool,
    reads_down: bool,
    block: u64,
}

impl ChainState {
    fn next_behavior(&mut self, function: &'static str) -> Behavior {
        if let Some(b) = self.once.get_mut(function).and_then(VecDeque::pop_front) {
            return b;
        }
        self.defaults.get(function).copied().unwrap_or(Behavior::Mine)
    }

    fn mine(&mut self, hash: TxHash, success: bool) {
        self.block += 1;
        self.receipts.insert(
            hash,
            ChainReceipt {
                tx_hash: hash,
                success,
                gas_used: if success { 52_000 } else { 31_000 },
                block_number: Some(self.block),
                logs: Vec::new(),
            },
        );
    }
}

/// In-process chain that decodes and checks every signed transaction.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Behaviour for every later transaction calling `function`.
    pub fn script(&self, function: &'static str, behavior: Behavior) {
        self.state.lock().unwrap().defaults.insert(function, behavior);
    }

    /// Behaviour for the next transaction calling `function` only.
    pub fn script_once(&self, function: &'static str, behavior: Behavior) {
        self.state
            .lock()
            .unwrap()
            .once
            .entry(function)
            .or_default()
            .push_back(behavior);
    }

    /// Mine every held transaction successfully.
    pub fn release_all(&self) {
        let mut state = self.state.lock().unwrap();
        for hash in std::mem::take(&mut state.held) {
            state.mine(hash, true);
        }
    }

    /// Mine every held transaction with failed execution.
    pub fn fail_held(&self) {
        let mut state = self.state.lock().unwrap();
        for hash in std::mem::take(&mut state.held) {
            state.mine(hash, false);
        }
    }

    pub fn set_issuers(&self, issuers: Option<Vec<Address>>) {
        self.state.lock().unwrap().issuers = issuers.map(|v| v.into_iter().collect());
    }

    pub fn set_revoked_on_chain(&self, revoked: bool) {
        self.state.lock().unwrap().revoked_on_chain = revoked;
    }

    /// Make read calls fail as if the node were unreachable.
    pub fn set_reads_down(&self, down: bool) {
        self.state.lock().unwrap().reads_down = down;
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn count(&self, function: &str) -> usize {
        self.submitted().iter().filter(|s| s.function == function).count()
    }

    pub fn rejected(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().rejected.clone()
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.state.lock().unwrap().nonces.get(&address).copied().unwrap_or(0)
    }

    pub fn last_hash(&self, function: &str) -> Option<TxHash> {
        self.submitted()
            .iter()
            .rev()
            .find(|s| s.function == function)
            .map(|s| s.hash)
    }
}

#[async_trait]
impl ChainAdapter for FakeChain {
    async fn get_nonce(&self, address: Address) -> BlockchainResult<u64> {
        Ok(self.nonce(address))
    }

    async fn call(&self, _to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        let state = self.state.lock().unwrap();
        if state.reads_down {
            return Err(BlockchainError::Rpc("connection refused".to_string()));
        }
        match function_name_for(&data) {
            Some("hasRole") => {
                // selector | role | account (left padded)
                let account = data
                    .get(4 + 32 + 12..4 + 64)
                    .map(Address::from_slice)
                    .ok_or_else(|| BlockchainError::Encoding("short hasRole call".into()))?;
                let allowed = state.issuers.as_ref().is_none_or(|set| set.contains(&account));
                Ok(encode_bool(allowed))
            }
            Some("isCredentialRevoked") => Ok(encode_bool(state.revoked_on_chain)),
            other => Err(BlockchainError::Rpc(format!("unexpected call {:?}", other))),
        }
    }

    async fn submit_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| BlockchainError::Submission(format!("undecodable transaction: {}", e)))?;
        let from = envelope
            .recover_signer()
            .map_err(|e| BlockchainError::Submission(format!("bad signature: {}", e)))?;
        let hash = *envelope.tx_hash();
        let nonce = envelope.nonce();
        let function = function_name_for(envelope.input()).unwrap_or("unknown");

        let mut state = self.state.lock().unwrap();
        let behavior = state.next_behavior(function);
        if behavior == Behavior::Reject {
            state.rejected.push(function);
            return Err(BlockchainError::Submission(format!(
                "{} rejected: execution not permitted",
                function
            )));
        }

        let expected = state.nonces.get(&from).copied().unwrap_or(0);
        if nonce != expected {
            return Err(BlockchainError::Submission(format!(
                "invalid nonce: expected {}, got {}",
                expected, nonce
            )));
        }
        state.nonces.insert(from, expected + 1);
        state.submitted.push(Submitted {
            hash,
            from,
            nonce,
            function,
        });

        match behavior {
            Behavior::Mine | Behavior::DropResponse => state.mine(hash, true),
            Behavior::Revert => state.mine(hash, false),
            Behavior::Hold => state.held.push(hash),
            Behavior::Reject => unreachable!(),
        }

        if behavior == Behavior::DropResponse {
            return Err(BlockchainError::Rpc("connection reset by peer".to_string()));
        }
        Ok(hash)
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ChainReceipt>> {
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).cloned())
    }

    async fn get_balance(&self, _address: Address) -> BlockchainResult<U256> {
        Ok(U256::from(1_000_000_000_000_000_000u128))
    }
}

/// Fast settings: cheap KDF, short confirmation bound, no metadata anchor.
pub fn test_config() -> CustodyConfig {
    let mut config = CustodyConfig::default();
    config.vault.kdf_iterations = 1_000;
    config.blockchain.confirmation_attempts = 3;
    config.blockchain.confirmation_interval_ms = 5;
    config.credentials.anchor_metadata = false;
    config.status_lists.base_url = "https://status.example/lists".to_string();
    config.api.api_key = API_KEY.to_string();
    config
}

pub struct Harness {
    pub chain: Arc<FakeChain>,
    pub services: Services,
    pub config: CustodyConfig,
}

pub fn harness() -> Harness {
    harness_with(test_config(), true)
}

pub fn harness_with(config: CustodyConfig, with_admin: bool) -> Harness {
    harness_on_store(config, with_admin, MemoryStore::new())
}

pub fn harness_on_store(config: CustodyConfig, with_admin: bool, store: MemoryStore) -> Harness {
    harness_on_chain(config, with_admin, store, FakeChain::new())
}

/// Services over an existing chain, as after a process restart.
pub fn harness_on_chain(
    config: CustodyConfig,
    with_admin: bool,
    store: MemoryStore,
    chain: Arc<FakeChain>,
) -> Harness {
    let secrets = Secrets::new(
        MASTER_PASSWORD,
        with_admin.then(|| ADMIN_KEY.to_string()),
    );
    let services = build_services(&config, &secrets, chain.clone(), store).unwrap();
    Harness {
        chain,
        services,
        config,
    }
}

impl Harness {
    pub fn admin_address(&self) -> Address {
        self.services.custody.admin_signer().unwrap().address()
    }

    pub fn issuer_wallet(&self) -> WalletMetadata {
        self.services
            .custody
            .create_wallet("issuer", "university registrar", None)
            .unwrap()
    }

    pub async fn create_list(
        &self,
        list_id: &str,
        wallet: &WalletMetadata,
        purpose: StatusPurpose,
    ) -> StatusListRecord {
        self.services
            .credentials
            .create_status_list(list_id, None, purpose, "did:ex:university", &wallet.address, None)
            .await
            .unwrap()
    }

    pub fn issue_request(&self, wallet: &WalletMetadata, list_id: &str) -> IssueRequest {
        IssueRequest {
            issuer_did: "did:ex:university".to_string(),
            holder_did: "did:ex:alice".to_string(),
            credential_type: "UniversityDegreeCredential".to_string(),
            status_list_id: list_id.to_string(),
            issuer_wallet_address: wallet.address.to_string(),
            holder_wallet_address: Address::repeat_byte(0xa1).to_string(),
            claims: [
                ("degree".to_string(), "BSc Computer Science".into()),
                ("graduationYear".to_string(), 2024i64.into()),
            ]
            .into_iter()
            .collect(),
            expires_at: None,
            issuer_password: None,
        }
    }

    /// Poll until the metadata anchor of a credential leaves `Pending`.
    pub async fn settled_anchor(&self, credential_id: &str) -> Option<AnchorStatus> {
        for _ in 0..200 {
            match self.services.credentials.anchor_status(credential_id) {
                Some(AnchorStatus::Pending) => tokio::time::sleep(Duration::from_millis(5)).await,
                other => return other,
            }
        }
        self.services.credentials.anchor_status(credential_id)
    }
}
