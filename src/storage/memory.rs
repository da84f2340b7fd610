//! In-memory store with optional JSON snapshot persistence.

use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::credential::types::Credential;
use crate::custody::types::WalletRecord;
use crate::status_list::types::{PendingUpdate, StatusListRecord};
use crate::storage::{
    CredentialStore, StatusListStore, StorageError, StorageResult, WalletStore,
};

/// On-disk layout of a snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    wallets: Vec<WalletRecord>,
    credentials: Vec<Credential>,
    status_lists: Vec<StatusListRecord>,
    cursors: BTreeMap<String, u64>,
    #[serde(default)]
    pending: Vec<PendingUpdate>,
}

/// Thread-safe store backed by `DashMap`s.
///
/// When a snapshot path is set, every mutation rewrites the snapshot
/// (write to a temp file, then rename). Snapshot writes are serialized. The
/// in-memory change is committed first; a failed snapshot write is logged
/// and the next successful one carries the change.
#[derive(Clone, Default)]
pub struct MemoryStore {
    wallets: Arc<DashMap<Address, WalletRecord>>,
    credentials: Arc<DashMap<String, Credential>>,
    /// (listId, index) → credentialId
    status_entries: Arc<DashMap<(String, u64), String>>,
    status_lists: Arc<DashMap<String, BTreeMap<u64, StatusListRecord>>>,
    cursors: Arc<DashMap<String, u64>>,
    pending: Arc<DashMap<String, PendingUpdate>>,
    persistence_path: Option<PathBuf>,
    snapshot_lock: Arc<Mutex<()>>,
}

impl MemoryStore {
    /// Create an empty store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a snapshot file if it exists; later writes go to the same file.
    pub fn load_from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let store = Self {
            persistence_path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;

            for wallet in snapshot.wallets {
                store.wallets.insert(wallet.address, wallet);
            }
            for credential in snapshot.credentials {
                store.status_entries.insert(
                    (credential.status_list_id.clone(), credential.status_list_index),
                    credential.credential_id.clone(),
                );
                store.credentials.insert(credential.credential_id.clone(), credential);
            }
            for record in snapshot.status_lists {
                store
                    .status_lists
                    .entry(record.list_id.clone())
                    .or_default()
                    .insert(record.version, record);
            }
            for (list_id, next) in snapshot.cursors {
                store.cursors.insert(list_id, next);
            }
            for update in snapshot.pending {
                store.pending.insert(update.candidate.list_id.clone(), update);
            }

            tracing::info!(
                path = %path.display(),
                wallets = store.wallets.len(),
                credentials = store.credentials.len(),
                status_lists = store.status_lists.len(),
                pending = store.pending.len(),
                "Loaded store snapshot"
            );
        }

        Ok(store)
    }

    /// Write the snapshot file, if persistence is enabled.
    pub fn save_to_file(&self) -> StorageResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let _guard = self.snapshot_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut wallets: Vec<_> = self.wallets.iter().map(|r| r.value().clone()).collect();
        wallets.sort_by_key(|w| w.address);
        let mut credentials: Vec<_> = self.credentials.iter().map(|r| r.value().clone()).collect();
        credentials.sort_by(|a, b| a.credential_id.cmp(&b.credential_id));
        let mut status_lists: Vec<_> = self
            .status_lists
            .iter()
            .flat_map(|r| r.value().values().cloned().collect::<Vec<_>>())
            .collect();
        status_lists.sort_by(|a, b| (&a.list_id, a.version).cmp(&(&b.list_id, b.version)));
        let cursors = self
            .cursors
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect();
        let mut pending: Vec<_> = self.pending.iter().map(|r| r.value().clone()).collect();
        pending.sort_by(|a, b| a.candidate.list_id.cmp(&b.candidate.list_id));

        let snapshot = Snapshot {
            wallets,
            credentials,
            status_lists,
            cursors,
            pending,
        };

        let tmp = path.with_extension("tmp");
        {
            let writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(writer, &snapshot)?;
        }
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), "Saved store snapshot");
        Ok(())
    }

    /// Snapshot after a committed mutation.
    fn snapshot(&self) {
        if let Err(e) = self.save_to_file() {
            tracing::error!(error = %e, "Failed to write store snapshot");
        }
    }
}

impl WalletStore for MemoryStore {
    fn insert_wallet(&self, wallet: WalletRecord) -> StorageResult<()> {
        match self.wallets.entry(wallet.address) {
            Entry::Occupied(_) => {
                return Err(StorageError::Duplicate {
                    kind: "wallet",
                    key: wallet.address.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(wallet);
            }
        }
        self.snapshot();
        Ok(())
    }

    fn save_wallet(&self, wallet: WalletRecord) -> StorageResult<()> {
        self.wallets.insert(wallet.address, wallet);
        self.snapshot();
        Ok(())
    }

    fn find_wallet(&self, address: &Address) -> Option<WalletRecord> {
        self.wallets.get(address).map(|r| r.value().clone())
    }

    fn list_wallets(&self) -> Vec<WalletRecord> {
        let mut wallets: Vec<_> = self.wallets.iter().map(|r| r.value().clone()).collect();
        wallets.sort_by_key(|w| w.created_at);
        wallets
    }
}

impl CredentialStore for MemoryStore {
    fn insert_credential(&self, credential: Credential) -> StorageResult<()> {
        let slot_key = (credential.status_list_id.clone(), credential.status_list_index);
        {
            let by_id = match self.credentials.entry(credential.credential_id.clone()) {
                Entry::Occupied(_) => {
                    return Err(StorageError::Duplicate {
                        kind: "credential",
                        key: credential.credential_id,
                    })
                }
                Entry::Vacant(slot) => slot,
            };

            match self.status_entries.entry(slot_key) {
                Entry::Occupied(e) => {
                    let (list_id, index) = e.key();
                    return Err(StorageError::Duplicate {
                        kind: "status list entry",
                        key: format!("{}#{}", list_id, index),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(credential.credential_id.clone());
                }
            }
            by_id.insert(credential);
        }
        self.snapshot();
        Ok(())
    }

    fn save_credential(&self, credential: Credential) -> StorageResult<()> {
        self.status_entries.insert(
            (credential.status_list_id.clone(), credential.status_list_index),
            credential.credential_id.clone(),
        );
        self.credentials.insert(credential.credential_id.clone(), credential);
        self.snapshot();
        Ok(())
    }

    fn find_credential(&self, credential_id: &str) -> Option<Credential> {
        self.credentials.get(credential_id).map(|r| r.value().clone())
    }

    fn find_by_status_entry(&self, list_id: &str, index: u64) -> Option<Credential> {
        let id = self
            .status_entries
            .get(&(list_id.to_string(), index))
            .map(|r| r.value().clone())?;
        self.find_credential(&id)
    }

    fn list_credentials(&self) -> Vec<Credential> {
        let mut credentials: Vec<_> = self.credentials.iter().map(|r| r.value().clone()).collect();
        credentials.sort_by_key(|c| c.issued_at);
        credentials
    }
}

impl StatusListStore for MemoryStore {
    fn insert_version(&self, record: StatusListRecord) -> StorageResult<()> {
        {
            let mut versions = self.status_lists.entry(record.list_id.clone()).or_default();
            if versions.contains_key(&record.version) {
                return Err(StorageError::Duplicate {
                    kind: "status list version",
                    key: format!("{}@{}", record.list_id, record.version),
                });
            }
            versions.insert(record.version, record);
        }
        self.snapshot();
        Ok(())
    }

    fn latest_version(&self, list_id: &str) -> Option<StatusListRecord> {
        self.status_lists
            .get(list_id)
            .and_then(|r| r.value().values().next_back().cloned())
    }

    fn find_version(&self, list_id: &str, version: u64) -> Option<StatusListRecord> {
        self.status_lists
            .get(list_id)
            .and_then(|r| r.value().get(&version).cloned())
    }

    fn versions(&self, list_id: &str) -> Vec<StatusListRecord> {
        self.status_lists
            .get(list_id)
            .map(|r| r.value().values().cloned().collect())
            .unwrap_or_default()
    }

    fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.status_lists.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    fn index_cursor(&self, list_id: &str) -> u64 {
        self.cursors.get(list_id).map(|r| *r.value()).unwrap_or(0)
    }

    fn set_index_cursor(&self, list_id: &str, next: u64) -> StorageResult<()> {
        self.cursors.insert(list_id.to_string(), next);
        self.snapshot();
        Ok(())
    }

    fn save_pending(&self, update: PendingUpdate) -> StorageResult<()> {
        self.pending.insert(update.candidate.list_id.clone(), update);
        self.snapshot();
        Ok(())
    }

    fn clear_pending(&self, list_id: &str) -> StorageResult<()> {
        if self.pending.remove(list_id).is_some() {
            self.snapshot();
        }
        Ok(())
    }

    fn pending_updates(&self) -> Vec<PendingUpdate> {
        let mut updates: Vec<_> = self.pending.iter().map(|r| r.value().clone()).collect();
        updates.sort_by(|a, b| a.candidate.list_id.cmp(&b.candidate.list_id));
        updates
    }
}
