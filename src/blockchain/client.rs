//! JSON-RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to the primary endpoint and any failovers
//! - Serve reads (nonce, calls, receipts, balances) from the first endpoint that answers
//! - Submit raw transactions to the primary endpoint only
//! - Classify node rejections apart from transport failures

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::adapter::ChainAdapter;
use crate::blockchain::types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainId, ChainReceipt, ReceiptLog,
};
use crate::observability::metrics;

/// Blockchain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct BlockchainClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: BlockchainConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Create a new blockchain client.
    ///
    /// Succeeds even when the node is unreachable; a chain id mismatch is
    /// only logged here; see [`BlockchainClient::verify_chain_id`].
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url))
            as Arc<dyn Provider + Send + Sync>);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url))
                    as Arc<dyn Provider + Send + Sync>);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Run a read against each endpoint in order until one answers.
    async fn read<T, F, Fut>(&self, method: &'static str, op: F) -> BlockchainResult<T>
    where
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, op(provider.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider")
                }
                Err(_) => tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider"),
            }
        }
        Err(BlockchainError::Rpc(format!(
            "{}: all {} RPC providers failed",
            method,
            self.providers.len()
        )))
    }

    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.read("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.read("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    /// Reachability check used by `/health`.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }

    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }
}

/// Map a receipt to the chain-agnostic view.
fn to_chain_receipt(receipt: &TransactionReceipt) -> ChainReceipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| ReceiptLog {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
        })
        .collect();

    ChainReceipt {
        tx_hash: receipt.transaction_hash,
        success: receipt.status(),
        gas_used: receipt.gas_used as u64,
        block_number: receipt.block_number,
        logs,
    }
}

/// JSON-RPC error responses come from the node; everything else is transport.
fn classify_submission_error(err: TransportError) -> BlockchainError {
    match err {
        RpcError::ErrorResp(payload) => BlockchainError::Submission(payload.message.to_string()),
        other => BlockchainError::Rpc(other.to_string()),
    }
}

#[async_trait]
impl ChainAdapter for BlockchainClient {
    async fn get_nonce(&self, address: Address) -> BlockchainResult<u64> {
        self.read("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(data);
        self.read("eth_call", |p| {
            let request = request.clone();
            async move { p.call(request).await }
        })
        .await
    }

    async fn submit_raw(&self, raw: Bytes) -> BlockchainResult<TxHash> {
        // primary only: failovers may not share its mempool
        let provider = &self.providers[0];
        match timeout(self.timeout_duration, provider.send_raw_transaction(&raw)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) => Err(classify_submission_error(e)),
            Err(_) => Err(BlockchainError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ChainReceipt>> {
        let receipt = self
            .read("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;
        Ok(receipt.as_ref().map(to_chain_receipt))
    }

    async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.read("eth_getBalance", |p| async move { p.get_balance(address).await })
            .await
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
