//! Status list engine: list creation, index allocation, versioned updates.
//!
//! # Update Protocol
//! ```text
//! latest confirmed version N
//!     → apply change to a copy of its bitstring, hash, candidate version N+1
//!     → list write   (publish N+1, list issuer signs)
//!     → attribute write (optional, per-credential DID attribute)
//!     → both confirmed: persist N+1
//! ```
//!
//! A definite failure of the list write discards the candidate. A timeout,
//! or a failed attribute write after the list write confirmed, parks the
//! candidate as a pending update; `reconcile` re-polls the same hashes and
//! re-submits the attribute write. While an update is pending the list
//! accepts no further updates.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;

use crate::blockchain::capability::IssuerCapability;
use crate::blockchain::contracts::{ContractCall, ContractEncoder};
use crate::blockchain::transaction::TransactionManager;
use crate::blockchain::types::BlockchainError;
use crate::blockchain::wallet::SigningCredentials;
use crate::config::StatusListConfig;
use crate::credential::types::CredentialStatus;
use crate::error::{CustodyError, CustodyResult};
use crate::observability::metrics;
use crate::resilience::keyed_lock::KeyedMutex;
use crate::status_list::bitstring::{build_document, content_hash, document_bits, Bitstring};
use crate::status_list::types::{
    AttributeWrite, ListChange, PendingUpdate, StatusListMetadata, StatusListRecord, StatusPurpose,
    WriteState,
};
use crate::storage::{CredentialStore, StatusListStore, StorageError};
use crate::unix_now;

/// Caller-supplied signers for an update.
pub struct UpdateContext<'a> {
    pub list_signer: &'a SigningCredentials,
    pub attribute: Option<(ContractCall, &'a SigningCredentials)>,
    pub credential_id: Option<String>,
}

impl<'a> UpdateContext<'a> {
    /// Update with no attribute write.
    pub fn list_only(list_signer: &'a SigningCredentials) -> Self {
        Self {
            list_signer,
            attribute: None,
            credential_id: None,
        }
    }
}

/// Result of an update request.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Both writes confirmed; the version is persisted.
    Applied(StatusListRecord),
    /// The latest version already reflects the change; nothing was sent.
    Unchanged(StatusListRecord),
    /// Parked for reconciliation.
    Pending { version: u64, reason: String },
}

/// Final state of a reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileState {
    Applied,
    Pending(String),
    Discarded(String),
}

/// Result of reconciling one list.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub list_id: String,
    pub version: u64,
    pub credential_id: Option<String>,
    pub change: ListChange,
    pub state: ReconcileState,
}

enum Progress {
    Done,
    Stalled(String),
}

pub struct StatusListEngine {
    store: Arc<dyn StatusListStore>,
    credentials: Arc<dyn CredentialStore>,
    transactions: Arc<TransactionManager>,
    encoder: Arc<dyn ContractEncoder>,
    capability: Arc<dyn IssuerCapability>,
    config: StatusListConfig,
    list_locks: KeyedMutex<String>,
    pending: DashMap<String, PendingUpdate>,
}

impl StatusListEngine {
    pub fn new(
        store: Arc<dyn StatusListStore>,
        credentials: Arc<dyn CredentialStore>,
        transactions: Arc<TransactionManager>,
        encoder: Arc<dyn ContractEncoder>,
        capability: Arc<dyn IssuerCapability>,
        config: StatusListConfig,
    ) -> Self {
        let pending = DashMap::new();
        for update in store.pending_updates() {
            tracing::info!(
                list_id = %update.candidate.list_id,
                version = update.candidate.version,
                "Restored unreconciled status list update"
            );
            pending.insert(update.candidate.list_id.clone(), update);
        }
        metrics::set_pending_updates(pending.len());

        Self {
            store,
            credentials,
            transactions,
            encoder,
            capability,
            config,
            list_locks: KeyedMutex::new(),
            pending,
        }
    }

    /// Default publication URI for a list.
    pub fn default_uri(&self, list_id: &str) -> String {
        format!("{}/{}.json", self.config.base_url.trim_end_matches('/'), list_id)
    }

    /// Create a list at version 1 with an empty bitstring.
    ///
    /// The row is persisted only after the chain write confirms.
    pub async fn create_list(
        &self,
        list_id: &str,
        uri: Option<&str>,
        purpose: StatusPurpose,
        issuer: &str,
        signer: &SigningCredentials,
    ) -> CustodyResult<StatusListRecord> {
        validate_list_id(list_id)?;
        if issuer.trim().is_empty() {
            return Err(CustodyError::Validation("issuer is required".to_string()));
        }

        let _guard = self.list_locks.lock(&list_id.to_string()).await;
        if self.store.latest_version(list_id).is_some() || self.pending.contains_key(list_id) {
            return Err(CustodyError::conflict("status list", list_id));
        }

        if !self.capability.is_issuer(signer.address()).await? {
            return Err(CustodyError::MissingCapability {
                address: signer.address().to_string(),
                capability: "ISSUER_ROLE",
            });
        }

        let uri = uri.map(str::to_string).unwrap_or_else(|| self.default_uri(list_id));
        let now = unix_now();
        let bits = Bitstring::new();
        let document = build_document(&uri, issuer, purpose, &bits, now, self.config.validity_secs);
        let hash = content_hash(&document)?;

        let call = self.encoder.encode(&ContractCall::CreateList {
            list_id: list_id.to_string(),
            uri: uri.clone(),
            hash,
            size: bits.len(),
            purpose,
        })?;
        let tx = self.transactions.execute(signer, call).await?;

        let record = StatusListRecord {
            list_id: list_id.to_string(),
            version: 1,
            uri,
            hash,
            purpose,
            issuer: issuer.to_string(),
            issuer_wallet: signer.address(),
            document,
            tx_hash: tx.hash,
            created_at: now,
        };
        self.store.insert_version(record.clone()).map_err(|e| match e {
            StorageError::Duplicate { key, .. } => CustodyError::conflict("status list", key),
            other => other.into(),
        })?;

        metrics::record_status_list_version(list_id, 1);
        tracing::info!(list_id, hash = %hash, purpose = %purpose, "Status list created");
        Ok(record)
    }

    /// Hand out the next never-used index of a list.
    ///
    /// The cursor is persisted before returning, so an index is consumed even
    /// if the issuance that requested it aborts.
    pub async fn allocate_index(&self, list_id: &str) -> CustodyResult<u64> {
        let _guard = self.list_locks.lock(&list_id.to_string()).await;
        let latest = self.latest(list_id)?;

        let next = latest.size().max(self.store.index_cursor(list_id));
        self.store.set_index_cursor(list_id, next + 1)?;

        tracing::debug!(list_id, index = next, "Status list index allocated");
        Ok(next)
    }

    /// Bit value in the latest confirmed version.
    pub fn is_revoked(&self, list_id: &str, index: u64) -> CustodyResult<bool> {
        let latest = self.latest(list_id)?;
        Ok(document_bits(&latest.document)?.get(index))
    }

    /// Set the bit for `index`.
    pub async fn revoke(
        &self,
        list_id: &str,
        index: u64,
        ctx: UpdateContext<'_>,
    ) -> CustodyResult<UpdateOutcome> {
        self.apply(list_id, ListChange::SetBit(index), ctx).await
    }

    /// Clear the bit for `index`.
    pub async fn restore(
        &self,
        list_id: &str,
        index: u64,
        ctx: UpdateContext<'_>,
    ) -> CustodyResult<UpdateOutcome> {
        self.apply(list_id, ListChange::ClearBit(index), ctx).await
    }

    /// Publish the same bits under a new URI.
    pub async fn update_uri(
        &self,
        list_id: &str,
        uri: &str,
        signer: &SigningCredentials,
    ) -> CustodyResult<UpdateOutcome> {
        if uri.parse::<url::Url>().is_err() {
            return Err(CustodyError::Validation(format!("'{}' is not a valid URI", uri)));
        }
        self.apply(
            list_id,
            ListChange::Relocate {
                uri: uri.to_string(),
            },
            UpdateContext::list_only(signer),
        )
        .await
    }

    async fn apply(
        &self,
        list_id: &str,
        change: ListChange,
        ctx: UpdateContext<'_>,
    ) -> CustodyResult<UpdateOutcome> {
        let _guard = self.list_locks.lock(&list_id.to_string()).await;
        if self.pending.contains_key(list_id) {
            return Err(CustodyError::Consistency(format!(
                "status list {} has an unreconciled update",
                list_id
            )));
        }

        let latest = self.latest(list_id)?;
        let mut bits = document_bits(&latest.document)?;
        let unchanged = match &change {
            ListChange::SetBit(index) => bits.get(*index),
            ListChange::ClearBit(index) => !bits.get(*index),
            ListChange::Relocate { uri } => *uri == latest.uri,
        };
        if unchanged {
            tracing::debug!(list_id, version = latest.version, change = ?change, "Status list already current");
            return Ok(UpdateOutcome::Unchanged(latest));
        }

        let mut uri = latest.uri.clone();
        match &change {
            ListChange::SetBit(index) => bits.set(*index, true),
            ListChange::ClearBit(index) => bits.set(*index, false),
            ListChange::Relocate { uri: new_uri } => uri = new_uri.clone(),
        }

        let now = unix_now();
        let version = latest.version + 1;
        let document = build_document(
            &uri,
            &latest.issuer,
            latest.purpose,
            &bits,
            now,
            self.config.validity_secs,
        );
        let hash = content_hash(&document)?;

        let mut update = PendingUpdate {
            candidate: StatusListRecord {
                list_id: list_id.to_string(),
                version,
                uri,
                hash,
                purpose: latest.purpose,
                issuer: latest.issuer.clone(),
                issuer_wallet: latest.issuer_wallet,
                document,
                tx_hash: None,
                created_at: now,
            },
            change,
            credential_id: ctx.credential_id,
            list_write: WriteState::Pending,
            attribute: ctx.attribute.as_ref().map(|(call, signer)| AttributeWrite {
                call: call.clone(),
                signer: signer.address(),
                state: WriteState::Pending,
            }),
            last_error: None,
            created_at: now,
        };

        let attribute_signer = ctx.attribute.as_ref().map(|(_, signer)| *signer);
        match self
            .drive(&mut update, Some(ctx.list_signer), attribute_signer)
            .await
        {
            Ok(Progress::Done) => Ok(UpdateOutcome::Applied(self.persist(update)?)),
            Ok(Progress::Stalled(reason)) => {
                tracing::warn!(
                    list_id,
                    version,
                    reason = %reason,
                    "Status list update parked for reconciliation"
                );
                update.last_error = Some(reason.clone());
                self.park(update)?;
                Ok(UpdateOutcome::Pending { version, reason })
            }
            Err(e) => {
                tracing::warn!(list_id, version, error = %e, "Status list update discarded");
                Err(e.into())
            }
        }
    }

    /// Advance both writes as far as possible.
    ///
    /// `Err` means the list write failed definitively and the candidate must
    /// be discarded.
    async fn drive(
        &self,
        update: &mut PendingUpdate,
        list_signer: Option<&SigningCredentials>,
        attribute_signer: Option<&SigningCredentials>,
    ) -> Result<Progress, BlockchainError> {
        let candidate = &update.candidate;

        match update.list_write {
            WriteState::Confirmed(_) => {}
            WriteState::InFlight(hash) => match self.transactions.check(hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    update.list_write = WriteState::Confirmed(hash);
                }
                Ok(Some(receipt)) => {
                    return Err(BlockchainError::Reverted {
                        tx_hash: hash,
                        gas_used: receipt.gas_used,
                        logs: receipt.logs,
                    });
                }
                Ok(None) => return Ok(Progress::Stalled(format!("list write {} not mined", hash))),
                Err(e) => return Ok(Progress::Stalled(format!("receipt query failed: {}", e))),
            },
            WriteState::Pending => {
                let Some(signer) = list_signer else {
                    return Ok(Progress::Stalled("list write has no signer".to_string()));
                };
                let call = self.encoder.encode(&ContractCall::Publish {
                    list_id: candidate.list_id.clone(),
                    version: candidate.version,
                    uri: candidate.uri.clone(),
                    hash: candidate.hash,
                })?;
                match self.transactions.execute(signer, call).await {
                    Ok(tx) => {
                        let hash = tx.hash.ok_or_else(|| {
                            BlockchainError::Wallet("confirmed transaction without hash".to_string())
                        })?;
                        update.list_write = WriteState::Confirmed(hash);
                    }
                    Err(BlockchainError::ConfirmationTimeout { tx_hash, attempts }) => {
                        update.list_write = WriteState::InFlight(tx_hash);
                        return Ok(Progress::Stalled(format!(
                            "list write {} not confirmed after {} attempts",
                            tx_hash, attempts
                        )));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let Some(attribute) = update.attribute.as_mut() else {
            return Ok(Progress::Done);
        };

        match attribute.state {
            WriteState::Confirmed(_) => Ok(Progress::Done),
            WriteState::InFlight(hash) => match self.transactions.check(hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    attribute.state = WriteState::Confirmed(hash);
                    Ok(Progress::Done)
                }
                Ok(Some(receipt)) => {
                    attribute.state = WriteState::Pending;
                    Ok(Progress::Stalled(format!(
                        "attribute write {} reverted (gas used {})",
                        hash, receipt.gas_used
                    )))
                }
                Ok(None) => Ok(Progress::Stalled(format!("attribute write {} not mined", hash))),
                Err(e) => Ok(Progress::Stalled(format!("receipt query failed: {}", e))),
            },
            WriteState::Pending => {
                let Some(signer) = attribute_signer else {
                    return Ok(Progress::Stalled(format!(
                        "attribute signer {} unavailable",
                        attribute.signer
                    )));
                };
                let call = self.encoder.encode(&attribute.call)?;
                match self.transactions.execute(signer, call).await {
                    Ok(tx) => {
                        let hash = tx.hash.ok_or_else(|| {
                            BlockchainError::Wallet("confirmed transaction without hash".to_string())
                        })?;
                        attribute.state = WriteState::Confirmed(hash);
                        Ok(Progress::Done)
                    }
                    Err(BlockchainError::ConfirmationTimeout { tx_hash, .. }) => {
                        attribute.state = WriteState::InFlight(tx_hash);
                        Ok(Progress::Stalled(format!("attribute write {} not confirmed", tx_hash)))
                    }
                    Err(e) => Ok(Progress::Stalled(format!("attribute write failed: {}", e))),
                }
            }
        }
    }

    fn persist(&self, update: PendingUpdate) -> CustodyResult<StatusListRecord> {
        let mut record = update.candidate;
        if let WriteState::Confirmed(hash) = update.list_write {
            record.tx_hash = Some(hash);
        }

        self.store.insert_version(record.clone()).map_err(|e| match e {
            StorageError::Duplicate { key, .. } => {
                CustodyError::Consistency(format!("status list version {} already persisted", key))
            }
            other => other.into(),
        })?;

        metrics::record_status_list_version(&record.list_id, record.version);
        tracing::info!(
            list_id = %record.list_id,
            version = record.version,
            hash = %record.hash,
            "Status list version confirmed"
        );
        Ok(record)
    }

    fn park(&self, update: PendingUpdate) -> CustodyResult<()> {
        let list_id = update.candidate.list_id.clone();
        self.pending.insert(list_id, update.clone());
        metrics::set_pending_updates(self.pending.len());
        self.store.save_pending(update)?;
        Ok(())
    }

    fn unpark(&self, list_id: &str) -> CustodyResult<()> {
        self.pending.remove(list_id);
        metrics::set_pending_updates(self.pending.len());
        self.store.clear_pending(list_id)?;
        Ok(())
    }

    /// Try to finish the pending update of a list.
    ///
    /// `resolve_signer` supplies credentials for re-submitting a failed
    /// attribute write; returning `None` leaves the update pending.
    pub async fn reconcile<F>(&self, list_id: &str, resolve_signer: F) -> CustodyResult<Option<Reconciled>>
    where
        F: Fn(Address) -> Option<SigningCredentials> + Send + Sync,
    {
        let _guard = self.list_locks.lock(&list_id.to_string()).await;
        let Some(mut update) = self.pending_update(list_id) else {
            return Ok(None);
        };

        let version = update.candidate.version;
        let credential_id = update.credential_id.clone();
        let change = update.change.clone();
        let reconciled = |state: ReconcileState| Reconciled {
            list_id: list_id.to_string(),
            version,
            credential_id: credential_id.clone(),
            change: change.clone(),
            state,
        };

        // persisted before the update could be cleared
        if let Some(existing) = self.store.find_version(list_id, version) {
            let state = if existing.hash == update.candidate.hash {
                ReconcileState::Applied
            } else {
                ReconcileState::Discarded(format!("version {} was persisted with other content", version))
            };
            self.unpark(list_id)?;
            return Ok(Some(reconciled(state)));
        }

        let attribute_signer = update
            .attribute
            .as_ref()
            .filter(|a| a.state == WriteState::Pending)
            .and_then(|a| resolve_signer(a.signer));

        let state = match self.drive(&mut update, None, attribute_signer.as_ref()).await {
            Ok(Progress::Done) => {
                self.persist(update)?;
                self.unpark(list_id)?;
                ReconcileState::Applied
            }
            Ok(Progress::Stalled(reason)) => {
                update.last_error = Some(reason.clone());
                self.park(update)?;
                ReconcileState::Pending(reason)
            }
            Err(e) => {
                tracing::warn!(list_id, version, error = %e, "Pending status list update discarded");
                self.unpark(list_id)?;
                ReconcileState::Discarded(e.to_string())
            }
        };

        Ok(Some(reconciled(state)))
    }

    /// Lists with an unreconciled update.
    pub fn pending_lists(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.pending.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn pending_update(&self, list_id: &str) -> Option<PendingUpdate> {
        self.pending.get(list_id).map(|r| r.value().clone())
    }

    pub fn latest(&self, list_id: &str) -> CustodyResult<StatusListRecord> {
        self.store
            .latest_version(list_id)
            .ok_or_else(|| CustodyError::not_found("status list", list_id))
    }

    pub fn versions(&self, list_id: &str) -> CustodyResult<Vec<StatusListRecord>> {
        let versions = self.store.versions(list_id);
        if versions.is_empty() {
            return Err(CustodyError::not_found("status list", list_id));
        }
        Ok(versions)
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.store.list_ids()
    }

    /// Summary of the latest version with credential counts.
    pub fn metadata(&self, list_id: &str) -> CustodyResult<StatusListMetadata> {
        let latest = self.latest(list_id)?;
        let bound: Vec<_> = self
            .credentials
            .list_credentials()
            .into_iter()
            .filter(|c| c.status_list_id == list_id)
            .collect();
        let valid = bound.iter().filter(|c| c.status == CredentialStatus::Valid).count();

        Ok(StatusListMetadata {
            list_id: latest.list_id.clone(),
            uri: latest.uri.clone(),
            hash: latest.hash,
            version: latest.version,
            purpose: latest.purpose,
            issuer: latest.issuer.clone(),
            issuer_wallet: latest.issuer_wallet,
            size: latest.size(),
            total_credentials: bound.len(),
            valid_credentials: valid,
            revoked_credentials: bound.len() - valid,
            pending_update: self.pending.contains_key(list_id),
        })
    }

    /// Re-hash every version and check the chain has no gaps.
    pub fn verify_integrity(&self, list_id: &str) -> CustodyResult<()> {
        let versions = self.versions(list_id)?;
        let mut problems = Vec::new();

        for (expected, record) in (1u64..).zip(&versions) {
            if record.version != expected {
                problems.push(format!("version {} found where {} expected", record.version, expected));
            }
            match content_hash(&record.document) {
                Ok(hash) if hash == record.hash => {}
                Ok(hash) => problems.push(format!(
                    "version {} stores hash {} but content hashes to {}",
                    record.version, record.hash, hash
                )),
                Err(e) => problems.push(format!("version {}: {}", record.version, e)),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CustodyError::Consistency(problems.join("; ")))
        }
    }
}

fn validate_list_id(list_id: &str) -> CustodyResult<()> {
    if list_id.is_empty() {
        return Err(CustodyError::Validation("statusListId is required".to_string()));
    }
    if !list_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CustodyError::Validation(format!(
            "statusListId '{}' may only contain letters, digits, '-', '_' and '.'",
            list_id
        )));
    }
    Ok(())
}
