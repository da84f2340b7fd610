//! Credential issuance, status changes and verification.
//!
//! # Issuance Pipeline
//! ```text
//! validate → resolve issuer key → allocate index → build + sign payload
//!     → issueCredential (blocking, must confirm) → persist row
//!     → setAttribute metadata anchor (spawned, best-effort)
//! ```
//!
//! Nothing is persisted unless the existence anchor confirms. Revoke and
//! restore persist the local status flip only once the status list version
//! and the attribute write have both confirmed; until then the change is a
//! pending update that [`CredentialOrchestrator::reconcile`] finishes.

use alloy::primitives::{Address, Bytes, TxHash};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::blockchain::contracts::{
    credential_metadata_attribute, decode_bool, ContractCall, ContractEncoder,
};
use crate::blockchain::transaction::TransactionManager;
use crate::blockchain::wallet::SigningCredentials;
use crate::config::CredentialConfig;
use crate::credential::envelope;
use crate::credential::types::{
    AnchorStatus, Credential, CredentialPayload, CredentialStatus, IssueRequest, StatusChange,
    StatusEntry, VcBody, Verification, CREDENTIALS_CONTEXT, STATUS_ENTRY_TYPE,
};
use crate::custody::{parse_address, WalletCustody};
use crate::error::{CustodyError, CustodyResult};
use crate::observability::metrics;
use crate::status_list::{
    ListChange, ReconcileState, Reconciled, StatusListEngine, StatusListRecord, StatusPurpose,
    UpdateContext, UpdateOutcome,
};
use crate::storage::{CredentialStore, StorageError};
use crate::unix_now;
use crate::vault::PasswordContext;

/// Filter for [`CredentialOrchestrator::list`]. Empty fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFilter {
    pub issuer_did: Option<String>,
    pub holder_did: Option<String>,
    pub status: Option<CredentialStatus>,
}

impl CredentialFilter {
    fn matches(&self, credential: &Credential) -> bool {
        self.issuer_did.as_ref().is_none_or(|d| *d == credential.issuer_did)
            && self.holder_did.as_ref().is_none_or(|d| *d == credential.holder_did)
            && self.status.is_none_or(|s| s == credential.status)
    }
}

pub struct CredentialOrchestrator {
    custody: Arc<WalletCustody>,
    status_lists: Arc<StatusListEngine>,
    transactions: Arc<TransactionManager>,
    encoder: Arc<dyn ContractEncoder>,
    credentials: Arc<dyn CredentialStore>,
    config: CredentialConfig,
    anchors: Arc<DashMap<String, AnchorStatus>>,
}

impl CredentialOrchestrator {
    pub fn new(
        custody: Arc<WalletCustody>,
        status_lists: Arc<StatusListEngine>,
        transactions: Arc<TransactionManager>,
        encoder: Arc<dyn ContractEncoder>,
        credentials: Arc<dyn CredentialStore>,
        config: CredentialConfig,
    ) -> Self {
        Self {
            custody,
            status_lists,
            transactions,
            encoder,
            credentials,
            config,
            anchors: Arc::new(DashMap::new()),
        }
    }

    pub fn custody(&self) -> &Arc<WalletCustody> {
        &self.custody
    }

    pub fn status_lists(&self) -> &Arc<StatusListEngine> {
        &self.status_lists
    }

    /// Create a status list signed by one of the custodial wallets.
    pub async fn create_status_list(
        &self,
        list_id: &str,
        uri: Option<&str>,
        purpose: StatusPurpose,
        issuer_did: &str,
        wallet: &Address,
        password: Option<&str>,
    ) -> CustodyResult<StatusListRecord> {
        let signer = self
            .custody
            .resolve_signer(wallet, PasswordContext::from_option(password))?;
        self.status_lists
            .create_list(list_id, uri, purpose, issuer_did, &signer)
            .await
    }

    /// Republish a list under a new URI, signed by the list's wallet.
    pub async fn update_status_list_uri(
        &self,
        list_id: &str,
        uri: &str,
        password: Option<&str>,
    ) -> CustodyResult<UpdateOutcome> {
        let list = self.status_lists.latest(list_id)?;
        let signer = self
            .custody
            .resolve_signer(&list.issuer_wallet, PasswordContext::from_option(password))?;
        self.status_lists.update_uri(list_id, uri, &signer).await
    }

    /// Issue a credential.
    pub async fn issue(&self, request: IssueRequest) -> CustodyResult<Credential> {
        let now = unix_now();
        let (issuer_wallet, holder_address) = validate_request(&request, now)?;
        let list = self.status_lists.latest(&request.status_list_id)?;

        let issuer = self.custody.resolve_signer(
            &issuer_wallet,
            PasswordContext::from_option(request.issuer_password.as_deref()),
        )?;
        let index = self.status_lists.allocate_index(&list.list_id).await?;

        let credential_id = format!("urn:uuid:{}", Uuid::new_v4());
        let expires_at = request
            .expires_at
            .unwrap_or(now.saturating_add(self.config.default_validity_secs));
        let payload = CredentialPayload {
            iss: request.issuer_did.clone(),
            sub: request.holder_did.clone(),
            jti: credential_id.clone(),
            iat: now,
            exp: Some(expires_at),
            vc: VcBody {
                context: vec![CREDENTIALS_CONTEXT.to_string()],
                types: vec![
                    "VerifiableCredential".to_string(),
                    request.credential_type.clone(),
                ],
                credential_subject: request.claims.clone(),
                credential_status: StatusEntry {
                    id: format!("{}#{}", list.uri, index),
                    kind: STATUS_ENTRY_TYPE.to_string(),
                    status_purpose: list.purpose.as_str().to_string(),
                    status_list_index: index.to_string(),
                    status_list_credential: list.uri.clone(),
                },
            },
        };
        let token = envelope::sign(&payload, &issuer)?;
        let content_hash = envelope::payload_hash(&payload)?;

        let privileged = self.custody.privileged_signer(&issuer);
        let call = self.encoder.encode(&ContractCall::IssueCredential {
            credential_id: credential_id.clone(),
            holder: holder_address,
            hash: content_hash,
        })?;
        let anchor = match self.transactions.execute(&privileged, call).await {
            Ok(tx) => tx,
            Err(e) => {
                metrics::record_credential_event("anchor_failed");
                tracing::warn!(
                    credential_id = %credential_id,
                    list_id = %list.list_id,
                    index,
                    error = %e,
                    "Existence anchor failed, credential not issued"
                );
                return Err(e.into());
            }
        };

        let credential = Credential {
            credential_id: credential_id.clone(),
            issuer_did: request.issuer_did,
            holder_did: request.holder_did,
            credential_type: request.credential_type,
            issuer_wallet,
            holder_address,
            payload,
            content_hash,
            status_list_id: list.list_id.clone(),
            status_list_index: index,
            status: CredentialStatus::Valid,
            issued_at: now,
            expires_at: Some(expires_at),
            updated_at: now,
            revoked_at: None,
            token,
            anchor_tx: anchor.hash,
        };
        self.credentials
            .insert_credential(credential.clone())
            .map_err(|e| match e {
                StorageError::Duplicate { key, .. } => CustodyError::Consistency(format!(
                    "credential anchored on chain but slot {} already taken locally",
                    key
                )),
                other => other.into(),
            })?;

        metrics::record_credential_event("issued");
        tracing::info!(
            credential_id = %credential_id,
            list_id = %list.list_id,
            index,
            "Credential issued"
        );

        if self.config.anchor_metadata {
            self.dispatch_metadata_anchor(&credential, privileged, now);
        } else {
            self.anchors.insert(credential_id, AnchorStatus::Skipped);
        }
        Ok(credential)
    }

    fn dispatch_metadata_anchor(&self, credential: &Credential, signer: SigningCredentials, now: u64) {
        let call = ContractCall::SetAttribute {
            identity: credential.issuer_wallet,
            name: credential_metadata_attribute(),
            value: Bytes::copy_from_slice(credential.content_hash.as_slice()),
            validity: self.attribute_validity(credential, now),
        };
        let credential_id = credential.credential_id.clone();
        let anchors = self.anchors.clone();
        let transactions = self.transactions.clone();
        let encoder = self.encoder.clone();

        anchors.insert(credential_id.clone(), AnchorStatus::Pending);
        tokio::spawn(async move {
            let result = match encoder.encode(&call) {
                Ok(encoded) => transactions.execute(&signer, encoded).await,
                Err(e) => Err(e),
            };
            let status = match result {
                Ok(tx) => match tx.hash {
                    Some(tx_hash) => AnchorStatus::Anchored { tx_hash },
                    None => AnchorStatus::Failed {
                        reason: "confirmed transaction without hash".to_string(),
                    },
                },
                Err(e) => AnchorStatus::Failed {
                    reason: e.to_string(),
                },
            };
            match &status {
                AnchorStatus::Anchored { tx_hash } => {
                    metrics::record_metadata_anchor("anchored");
                    tracing::debug!(credential_id = %credential_id, tx_hash = %tx_hash, "Metadata anchored");
                }
                _ => {
                    metrics::record_metadata_anchor("failed");
                    tracing::warn!(credential_id = %credential_id, status = ?status, "Metadata anchor failed");
                }
            }
            anchors.insert(credential_id, status);
        });
    }

    /// Seconds the metadata attribute stays valid: until expiry, or the configured default.
    fn attribute_validity(&self, credential: &Credential, now: u64) -> u64 {
        match credential.expires_at {
            Some(expires_at) => expires_at.saturating_sub(now).max(1),
            None => self.config.metadata_validity_secs,
        }
    }

    /// Set the credential's bit and revoke its metadata attribute.
    pub async fn revoke(
        &self,
        credential_id: &str,
        password: Option<&str>,
    ) -> CustodyResult<StatusChange> {
        let credential = self.get(credential_id)?;
        if credential.status != CredentialStatus::Valid {
            return Err(CustodyError::Validation(format!(
                "credential {} is already {}",
                credential_id,
                credential.status.as_str()
            )));
        }

        let attribute = ContractCall::RevokeAttribute {
            identity: credential.issuer_wallet,
            name: credential_metadata_attribute(),
            value: Bytes::copy_from_slice(credential.content_hash.as_slice()),
        };
        self.change_status(credential, ListChange::SetBit, attribute, password)
            .await
    }

    /// Clear the credential's bit and re-bind its metadata attribute.
    pub async fn restore(
        &self,
        credential_id: &str,
        password: Option<&str>,
    ) -> CustodyResult<StatusChange> {
        let credential = self.get(credential_id)?;
        if credential.status == CredentialStatus::Valid {
            return Err(CustodyError::Validation(format!(
                "credential {} is not revoked",
                credential_id
            )));
        }

        let attribute = ContractCall::SetAttribute {
            identity: credential.issuer_wallet,
            name: credential_metadata_attribute(),
            value: Bytes::copy_from_slice(credential.content_hash.as_slice()),
            validity: self.attribute_validity(&credential, unix_now()),
        };
        self.change_status(credential, ListChange::ClearBit, attribute, password)
            .await
    }

    async fn change_status(
        &self,
        credential: Credential,
        change: fn(u64) -> ListChange,
        attribute: ContractCall,
        password: Option<&str>,
    ) -> CustodyResult<StatusChange> {
        let issuer = self.custody.resolve_signer(
            &credential.issuer_wallet,
            PasswordContext::from_option(password),
        )?;
        let privileged = self.custody.privileged_signer(&issuer);
        let ctx = UpdateContext {
            list_signer: &issuer,
            attribute: Some((attribute, &privileged)),
            credential_id: Some(credential.credential_id.clone()),
        };

        let index = credential.status_list_index;
        let outcome = match change(index) {
            ListChange::SetBit(_) => {
                self.status_lists
                    .revoke(&credential.status_list_id, index, ctx)
                    .await?
            }
            _ => {
                self.status_lists
                    .restore(&credential.status_list_id, index, ctx)
                    .await?
            }
        };

        match outcome {
            UpdateOutcome::Applied(record) => {
                let updated = self.flip(&credential.credential_id, &change(index), record.purpose)?;
                Ok(StatusChange {
                    credential_id: updated.credential_id,
                    status: updated.status,
                    pending: false,
                    list_version: Some(record.version),
                })
            }
            UpdateOutcome::Unchanged(record) => {
                let target = target_status(&change(index), record.purpose);
                let current = self.get(&credential.credential_id)?;
                if current.status == target {
                    return Err(CustodyError::Validation(format!(
                        "credential {} is already {}",
                        current.credential_id,
                        target.as_str()
                    )));
                }
                let updated = self.flip(&credential.credential_id, &change(index), record.purpose)?;
                Ok(StatusChange {
                    credential_id: updated.credential_id,
                    status: updated.status,
                    pending: false,
                    list_version: Some(record.version),
                })
            }
            UpdateOutcome::Pending { version, reason } => {
                tracing::warn!(
                    credential_id = %credential.credential_id,
                    version,
                    reason = %reason,
                    "Status change pending chain confirmation"
                );
                Ok(StatusChange {
                    credential_id: credential.credential_id,
                    status: credential.status,
                    pending: true,
                    list_version: Some(version),
                })
            }
        }
    }

    /// Persist the local status matching a confirmed list change.
    fn flip(
        &self,
        credential_id: &str,
        change: &ListChange,
        purpose: StatusPurpose,
    ) -> CustodyResult<Credential> {
        let mut credential = self.get(credential_id)?;
        let now = unix_now();
        match change {
            ListChange::SetBit(_) => {
                credential.status = target_status(change, purpose);
                credential.revoked_at = Some(now);
                metrics::record_credential_event("revoked");
            }
            ListChange::ClearBit(_) => {
                credential.status = CredentialStatus::Valid;
                credential.revoked_at = None;
                metrics::record_credential_event("restored");
            }
            ListChange::Relocate { .. } => return Ok(credential),
        }
        credential.updated_at = now;
        self.credentials.save_credential(credential.clone())?;

        tracing::info!(
            credential_id,
            status = credential.status.as_str(),
            "Credential status changed"
        );
        Ok(credential)
    }

    /// Finish the pending update of one list and apply its credential change.
    pub async fn reconcile(
        &self,
        list_id: &str,
        password: Option<&str>,
    ) -> CustodyResult<Option<Reconciled>> {
        let ctx = PasswordContext::from_option(password);
        let custody = &self.custody;
        let resolve = |address: Address| {
            custody
                .admin_signer()
                .ok()
                .filter(|admin| admin.address() == address)
                .or_else(|| custody.resolve_signer(&address, ctx).ok())
        };

        let Some(reconciled) = self.status_lists.reconcile(list_id, resolve).await? else {
            return Ok(None);
        };
        if reconciled.state == ReconcileState::Applied {
            if let Some(credential_id) = &reconciled.credential_id {
                let purpose = self.status_lists.latest(list_id)?.purpose;
                self.flip(credential_id, &reconciled.change, purpose)?;
            }
        }
        Ok(Some(reconciled))
    }

    /// Reconcile every list with a pending update, using the master password.
    pub async fn reconcile_all(&self) -> Vec<Reconciled> {
        let mut results = Vec::new();
        for list_id in self.status_lists.pending_lists() {
            match self.reconcile(&list_id, None).await {
                Ok(Some(reconciled)) => results.push(reconciled),
                Ok(None) => {}
                Err(e) => tracing::warn!(list_id = %list_id, error = %e, "Reconciliation failed"),
            }
        }
        results
    }

    /// Check a token, collecting every failed check.
    pub async fn verify(&self, token: &str) -> Verification {
        let mut result = Verification::default();

        let parsed = match envelope::parse(token) {
            Ok(parsed) => parsed,
            Err(e) => {
                result.error(format!("malformed token: {}", e));
                return result.finish();
            }
        };
        let credential_id = parsed.payload.jti.clone();
        result.credential_id = Some(credential_id.clone());

        let Some(credential) = self.credentials.find_credential(&credential_id) else {
            result.error(format!("credential {} not found", credential_id));
            return result.finish();
        };
        result.status = Some(credential.status);

        match parsed.recover_signer() {
            Ok(signer) if signer == credential.issuer_wallet => {}
            Ok(signer) => result.error(format!(
                "signature made by {} not issuer wallet {}",
                signer, credential.issuer_wallet
            )),
            Err(e) => result.error(format!("bad signature: {}", e)),
        }
        if parsed.payload != credential.payload {
            result.error("payload differs from the issued credential");
        }

        if credential.status != CredentialStatus::Valid {
            result.error(format!("credential is {}", credential.status.as_str()));
        }

        match self
            .status_lists
            .is_revoked(&credential.status_list_id, credential.status_list_index)
        {
            Ok(true) => result.error(format!(
                "status list {} has bit {} set",
                credential.status_list_id, credential.status_list_index
            )),
            Ok(false) => {}
            Err(e) => result.warn(format!("status list check skipped: {}", e)),
        }

        if let Some(exp) = parsed.payload.exp {
            if exp <= unix_now() {
                result.error(format!("credential expired at {}", exp));
            }
        }

        match self.chain_status(&credential_id).await {
            Ok(true) => result.error("credential is revoked on chain"),
            Ok(false) => {}
            Err(e) => result.warn(format!("chain status unavailable: {}", e)),
        }

        metrics::record_credential_event("verified");
        result.finish()
    }

    /// Registry's view of the credential (`isCredentialRevoked`).
    pub async fn chain_status(&self, credential_id: &str) -> CustodyResult<bool> {
        let call = self.encoder.encode(&ContractCall::IsCredentialRevoked {
            credential_id: credential_id.to_string(),
        })?;
        let data = self.transactions.call(call).await?;
        Ok(decode_bool(&data)?)
    }

    pub fn get(&self, credential_id: &str) -> CustodyResult<Credential> {
        self.credentials
            .find_credential(credential_id)
            .ok_or_else(|| CustodyError::not_found("credential", credential_id))
    }

    pub fn list(&self, filter: &CredentialFilter) -> Vec<Credential> {
        let mut credentials: Vec<_> = self
            .credentials
            .list_credentials()
            .into_iter()
            .filter(|c| filter.matches(c))
            .collect();
        credentials.sort_by(|a, b| {
            a.issued_at
                .cmp(&b.issued_at)
                .then_with(|| a.credential_id.cmp(&b.credential_id))
        });
        credentials
    }

    /// Outcome of the metadata anchor dispatched at issuance.
    pub fn anchor_status(&self, credential_id: &str) -> Option<AnchorStatus> {
        self.anchors.get(credential_id).map(|s| s.value().clone())
    }

    /// Existence anchor transaction of a credential.
    pub fn anchor_tx(&self, credential_id: &str) -> CustodyResult<Option<TxHash>> {
        Ok(self.get(credential_id)?.anchor_tx)
    }
}

/// Local status a credential takes once `change` is on the list.
fn target_status(change: &ListChange, purpose: StatusPurpose) -> CredentialStatus {
    match (change, purpose) {
        (ListChange::SetBit(_), StatusPurpose::Revocation) => CredentialStatus::Revoked,
        (ListChange::SetBit(_), StatusPurpose::Suspension) => CredentialStatus::Suspended,
        _ => CredentialStatus::Valid,
    }
}

/// Reject bad input before any side effect. Returns the parsed
/// issuer wallet and holder addresses.
fn validate_request(request: &IssueRequest, now: u64) -> CustodyResult<(Address, Address)> {
    let required = [
        ("issuerDid", &request.issuer_did),
        ("holderDid", &request.holder_did),
        ("credentialType", &request.credential_type),
        ("statusListId", &request.status_list_id),
        ("issuerWalletAddress", &request.issuer_wallet_address),
        ("holderWalletAddress", &request.holder_wallet_address),
    ];
    let missing: Vec<_> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| *field)
        .collect();
    if !missing.is_empty() {
        return Err(CustodyError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    if let Some(expires_at) = request.expires_at {
        if expires_at <= now {
            return Err(CustodyError::Validation(
                "expiresAt must be in the future".to_string(),
            ));
        }
    }

    let issuer = parse_address("issuerWalletAddress", &request.issuer_wallet_address)?;
    let holder = parse_address("holderWalletAddress", &request.holder_wallet_address)?;
    Ok((issuer, holder))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> IssueRequest {
        IssueRequest {
            issuer_did: "did:ex:issuer".into(),
            holder_did: "did:ex:holder".into(),
            credential_type: "Diploma".into(),
            status_list_id: "L1".into(),
            issuer_wallet_address: Address::repeat_byte(1).to_string(),
            holder_wallet_address: Address::repeat_byte(2).to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_reports_all_missing_fields() {
        let mut req = request();
        req.issuer_did.clear();
        req.status_list_id = "  ".into();

        match validate_request(&req, 100) {
            Err(CustodyError::Validation(msg)) => {
                assert!(msg.contains("issuerDid"));
                assert!(msg.contains("statusListId"));
                assert!(!msg.contains("holderDid"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_past_expiry_and_bad_address() {
        let mut req = request();
        req.expires_at = Some(50);
        assert!(validate_request(&req, 100).is_err());

        let mut req = request();
        req.holder_wallet_address = "0x123".into();
        assert!(matches!(
            validate_request(&req, 100),
            Err(CustodyError::Validation(_))
        ));

        let (issuer, holder) = validate_request(&request(), 100).unwrap();
        assert_eq!(issuer, Address::repeat_byte(1));
        assert_eq!(holder, Address::repeat_byte(2));
    }
}
