//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Bytes, TxHash, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node rejected the raw transaction. Never retried automatically.
    #[error("Transaction rejected by node: {0}")]
    Submission(String),

    /// Transaction was mined but execution failed.
    #[error("Transaction {tx_hash} reverted (gas used {gas_used}, {} logs)", logs.len())]
    Reverted {
        tx_hash: TxHash,
        gas_used: u64,
        logs: Vec<ReceiptLog>,
    },

    /// No receipt within the polling bound. The transaction may still land.
    #[error("Transaction {tx_hash} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_hash: TxHash, attempts: u32 },

    /// Invalid private key format or signing failure.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Call data could not be encoded or a return value decoded.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// A log entry emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Chain-agnostic view of a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReceipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub gas_used: u64,
    pub block_number: Option<u64>,
    pub logs: Vec<ReceiptLog>,
}

/// Outcome of polling for a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Receipt present with success status.
    Confirmed(ChainReceipt),
    /// Receipt present with failure status.
    Reverted(ChainReceipt),
    /// No receipt after exhausting every attempt.
    TimedOut { attempts: u32 },
}

/// Lifecycle state of a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxState {
    Built,
    Signed,
    Submitted,
    Confirmed,
    Failed,
    Timeout,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Built => "built",
            TxState::Signed => "signed",
            TxState::Submitted => "submitted",
            TxState::Confirmed => "confirmed",
            TxState::Failed => "failed",
            TxState::Timeout => "timeout",
        }
    }

    /// Terminal states end the lifecycle; no further transition is valid.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Failed | TxState::Timeout)
    }
}
