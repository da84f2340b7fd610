//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! ContractCall
//!     → contracts.rs (ABI encoding, target address)
//!     → transaction.rs (build at confirmed nonce, sign, submit, poll receipt)
//!     → adapter.rs (ChainAdapter boundary)
//!     → client.rs (JSON-RPC with timeouts and read failover)
//! ```
//!
//! # Security Constraints
//! - Signing credentials come from the vault or the externally supplied admin key
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - A rejected submission is never retried

pub mod adapter;
pub mod capability;
pub mod client;
pub mod contracts;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use adapter::ChainAdapter;
pub use capability::{ContractRoleCheck, FnCapability, IssuerCapability};
pub use client::BlockchainClient;
pub use contracts::{AbiEncoder, ContractAddresses, ContractCall, ContractEncoder, EncodedCall};
pub use transaction::{TransactionManager, TransactionRecord, TxParams};
pub use types::{
    BlockchainConfig, BlockchainError, BlockchainResult, ChainId, ChainReceipt, ConfirmationStatus,
    TxState,
};
pub use wallet::SigningCredentials;
