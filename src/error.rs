//! Service-level error taxonomy.
//!
//! Lower layers keep their own error enums ([`BlockchainError`],
//! [`StorageError`]); they convert into [`CustodyError`] at the service
//! boundary so callers can match on the failure class without string parsing.

use thiserror::Error;

use crate::blockchain::types::BlockchainError;
use crate::storage::StorageError;

/// Errors surfaced by custody, status list and credential operations.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Bad input. Raised before any side effect.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing wallet, credential or status list.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The record already exists.
    #[error("{kind} already exists: {id}")]
    Conflict { kind: &'static str, id: String },

    /// Wrong decryption password or tampered key blob.
    #[error("Authentication failure: key material could not be decrypted")]
    AuthenticationFailure,

    /// The signer lacks a required on-chain capability.
    #[error("Address {address} lacks capability {capability}")]
    MissingCapability { address: String, capability: &'static str },

    /// Chain submission, revert, or confirmation timeout.
    #[error(transparent)]
    Chain(#[from] BlockchainError),

    /// Local and chain state diverged, or an update is still unreconciled.
    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Key generation, encoding or signing failure.
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl CustodyError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn conflict(kind: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict { kind, id: id.into() }
    }

    /// True when the outcome on chain is unknown (the transaction may still land).
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            CustodyError::Chain(BlockchainError::ConfirmationTimeout { .. })
        )
    }
}

/// Result type for service operations.
pub type CustodyResult<T> = Result<T, CustodyError>;
