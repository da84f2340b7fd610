//! Local persistence for wallets, credentials and status list versions.
//!
//! # Responsibilities
//! - Keyed save/find for the three record kinds
//! - Enforce the uniqueness the lifecycle relies on: `(listId, version)`
//!   for status lists, `credentialId` and `(listId, index)` for credentials
//! - Track the per-list index allocation cursor
//! - Hold the unreconciled update of each list until it resolves
//!
//! # Design Decisions
//! - Stores are synchronous traits; chain writes happen before, never inside, a store call
//! - No transaction spans the store and the chain

pub mod memory;

use alloy::primitives::Address;
use thiserror::Error;

use crate::credential::types::Credential;
use crate::custody::types::WalletRecord;
use crate::status_list::types::{PendingUpdate, StatusListRecord};

pub use memory::MemoryStore;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A uniqueness constraint rejected the write.
    #[error("Duplicate {kind}: {key}")]
    Duplicate { kind: &'static str, key: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Wallet rows keyed by address.
pub trait WalletStore: Send + Sync {
    /// Insert a new wallet; `Duplicate` if the address is taken.
    fn insert_wallet(&self, wallet: WalletRecord) -> StorageResult<()>;
    /// Overwrite an existing wallet row.
    fn save_wallet(&self, wallet: WalletRecord) -> StorageResult<()>;
    fn find_wallet(&self, address: &Address) -> Option<WalletRecord>;
    fn list_wallets(&self) -> Vec<WalletRecord>;
}

/// Credential rows keyed by id, with a unique `(listId, index)` secondary key.
pub trait CredentialStore: Send + Sync {
    /// Insert a new credential; `Duplicate` if the id or status slot is taken.
    fn insert_credential(&self, credential: Credential) -> StorageResult<()>;
    /// Overwrite an existing credential row. The status slot must not change.
    fn save_credential(&self, credential: Credential) -> StorageResult<()>;
    fn find_credential(&self, credential_id: &str) -> Option<Credential>;
    fn find_by_status_entry(&self, list_id: &str, index: u64) -> Option<Credential>;
    fn list_credentials(&self) -> Vec<Credential>;
}

/// Append-only status list versions.
pub trait StatusListStore: Send + Sync {
    /// Append a version; `Duplicate` if `(listId, version)` exists.
    fn insert_version(&self, record: StatusListRecord) -> StorageResult<()>;
    fn latest_version(&self, list_id: &str) -> Option<StatusListRecord>;
    fn find_version(&self, list_id: &str, version: u64) -> Option<StatusListRecord>;
    /// All versions, ascending.
    fn versions(&self, list_id: &str) -> Vec<StatusListRecord>;
    fn list_ids(&self) -> Vec<String>;
    /// Next index to hand out for a list (0 if never allocated).
    fn index_cursor(&self, list_id: &str) -> u64;
    fn set_index_cursor(&self, list_id: &str, next: u64) -> StorageResult<()>;
    /// Record the parked update of a list, replacing any earlier one.
    fn save_pending(&self, update: PendingUpdate) -> StorageResult<()>;
    fn clear_pending(&self, list_id: &str) -> StorageResult<()>;
    fn pending_updates(&self) -> Vec<PendingUpdate>;
}
