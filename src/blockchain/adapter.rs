//! Chain access boundary.
//!
//! Everything above this trait (transaction lifecycle, status lists,
//! issuance) is written against `ChainAdapter`, so tests can substitute a
//! scripted fake for a live node.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::blockchain::types::{BlockchainResult, ChainReceipt};

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Transaction count of `address` at the latest block.
    async fn get_nonce(&self, address: Address) -> BlockchainResult<u64>;

    /// Read-only contract call.
    async fn call(&self, to: Address, data: Bytes) -> BlockchainResult<Bytes>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    ///
    /// A node-level rejection must be reported as
    /// [`BlockchainError::Submission`](crate::blockchain::types::BlockchainError::Submission).
    async fn submit_raw(&self, raw: Bytes) -> BlockchainResult<TxHash>;

    /// Receipt for `tx_hash`, or `None` while the transaction is not mined.
    async fn get_receipt(&self, tx_hash: TxHash) -> BlockchainResult<Option<ChainReceipt>>;

    /// Native balance of `address`.
    async fn get_balance(&self, address: Address) -> BlockchainResult<U256>;
}
