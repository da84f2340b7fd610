//! Custodial wallets: key generation, import, and signer resolution.

use alloy::primitives::{Address, TxHash, U256};
use std::sync::Arc;

use crate::blockchain::capability::IssuerCapability;
use crate::blockchain::contracts::{issuer_role, ContractCall, ContractEncoder};
use crate::blockchain::transaction::TransactionManager;
use crate::blockchain::wallet::SigningCredentials;
use crate::custody::types::{WalletKind, WalletMetadata, WalletRecord};
use crate::error::{CustodyError, CustodyResult};
use crate::storage::{StorageError, WalletStore};
use crate::unix_now;
use crate::vault::{EncryptedBlob, KeyVault, PasswordContext};

/// Wallet custody service.
pub struct WalletCustody {
    store: Arc<dyn WalletStore>,
    vault: Arc<KeyVault>,
    transactions: Arc<TransactionManager>,
    encoder: Arc<dyn ContractEncoder>,
    capability: Arc<dyn IssuerCapability>,
    /// Externally supplied key for privileged chain operations.
    admin: Option<SigningCredentials>,
}

impl WalletCustody {
    pub fn new(
        store: Arc<dyn WalletStore>,
        vault: Arc<KeyVault>,
        transactions: Arc<TransactionManager>,
        encoder: Arc<dyn ContractEncoder>,
        capability: Arc<dyn IssuerCapability>,
        admin: Option<SigningCredentials>,
    ) -> Self {
        if let Some(admin) = &admin {
            tracing::info!(address = %admin.address(), "Admin signer configured");
        }
        Self {
            store,
            vault,
            transactions,
            encoder,
            capability,
            admin,
        }
    }

    fn chain_id(&self) -> u64 {
        self.transactions.params().chain_id
    }

    /// Generate a keypair and store its private key encrypted.
    pub fn create_wallet(
        &self,
        name: &str,
        description: &str,
        password: Option<&str>,
    ) -> CustodyResult<WalletMetadata> {
        require_name(name)?;
        if password.is_some_and(str::is_empty) {
            return Err(CustodyError::Validation("password must not be empty".to_string()));
        }

        let credentials = SigningCredentials::generate(self.chain_id());
        let ctx = PasswordContext::from_option(password);
        let record = self.seal(&credentials, name, description, ctx, WalletKind::Generated)?;
        let metadata = record.metadata();

        self.store.insert_wallet(record).map_err(|e| duplicate_as_conflict(e, "wallet"))?;

        tracing::info!(
            address = %metadata.address,
            custom_password = metadata.custom_password,
            "Wallet created"
        );
        Ok(metadata)
    }

    /// Take custody of an existing private key, encrypted with the master password.
    pub fn import_from_private_key(
        &self,
        private_key_hex: &str,
        name: &str,
        description: &str,
    ) -> CustodyResult<WalletMetadata> {
        require_name(name)?;
        let credentials = SigningCredentials::from_private_key(private_key_hex, self.chain_id())
            .map_err(|e| CustodyError::Validation(e.to_string()))?;

        if self.store.find_wallet(&credentials.address()).is_some() {
            return Err(CustodyError::conflict("wallet", credentials.address().to_string()));
        }

        let record = self.seal(
            &credentials,
            name,
            description,
            PasswordContext::Master,
            WalletKind::Imported,
        )?;
        let metadata = record.metadata();
        self.store.insert_wallet(record).map_err(|e| duplicate_as_conflict(e, "wallet"))?;

        tracing::info!(address = %metadata.address, "Wallet imported");
        Ok(metadata)
    }

    fn seal(
        &self,
        credentials: &SigningCredentials,
        name: &str,
        description: &str,
        ctx: PasswordContext<'_>,
        kind: WalletKind,
    ) -> CustodyResult<WalletRecord> {
        let key_hex = credentials.private_key_hex();
        let blob = self.vault.seal(key_hex.as_bytes(), ctx)?;
        let now = unix_now();

        Ok(WalletRecord {
            address: credentials.address(),
            name: name.trim().to_string(),
            description: description.to_string(),
            encrypted_key: blob.encode(),
            salt: blob.salt_b64(),
            custom_password: !ctx.is_master(),
            active: true,
            kind,
            created_at: now,
            updated_at: now,
        })
    }

    /// Decrypt the signing key of an active wallet for one operation.
    pub fn resolve_signer(
        &self,
        address: &Address,
        ctx: PasswordContext<'_>,
    ) -> CustodyResult<SigningCredentials> {
        let record = self
            .store
            .find_wallet(address)
            .filter(|w| w.active)
            .ok_or_else(|| CustodyError::not_found("wallet", address.to_string()))?;

        let blob = EncryptedBlob::decode(&record.encrypted_key)?;
        let plaintext = self.vault.open(&blob, ctx)?;
        let key_hex = std::str::from_utf8(&plaintext)
            .map_err(|_| CustodyError::Crypto("stored key is not valid UTF-8".to_string()))?;

        let credentials = SigningCredentials::from_private_key(key_hex, self.chain_id())
            .map_err(|e| CustodyError::Crypto(e.to_string()))?;
        if credentials.address() != record.address {
            return Err(CustodyError::Consistency(format!(
                "decrypted key does not match wallet {}",
                record.address
            )));
        }
        Ok(credentials)
    }

    /// The admin signer, if one was supplied.
    pub fn admin_signer(&self) -> CustodyResult<SigningCredentials> {
        self.admin
            .clone()
            .ok_or_else(|| CustodyError::not_found("admin signer", "not configured"))
    }

    /// Admin signer when configured, otherwise `fallback`.
    pub fn privileged_signer(&self, fallback: &SigningCredentials) -> SigningCredentials {
        self.admin.clone().unwrap_or_else(|| fallback.clone())
    }

    pub fn get_wallet(&self, address: &Address) -> CustodyResult<WalletMetadata> {
        self.store
            .find_wallet(address)
            .map(|w| w.metadata())
            .ok_or_else(|| CustodyError::not_found("wallet", address.to_string()))
    }

    pub fn list_wallets(&self, include_inactive: bool) -> Vec<WalletMetadata> {
        self.store
            .list_wallets()
            .into_iter()
            .filter(|w| include_inactive || w.active)
            .map(|w| w.metadata())
            .collect()
    }

    /// Rename or re-describe a wallet. Key material is untouched.
    pub fn update_wallet(
        &self,
        address: &Address,
        name: Option<&str>,
        description: Option<&str>,
    ) -> CustodyResult<WalletMetadata> {
        let mut record = self
            .store
            .find_wallet(address)
            .ok_or_else(|| CustodyError::not_found("wallet", address.to_string()))?;

        if let Some(name) = name {
            require_name(name)?;
            record.name = name.trim().to_string();
        }
        if let Some(description) = description {
            record.description = description.to_string();
        }
        record.updated_at = unix_now();

        let metadata = record.metadata();
        self.store.save_wallet(record)?;
        Ok(metadata)
    }

    /// Deactivate a wallet. Its key can no longer be resolved for signing.
    pub fn deactivate_wallet(&self, address: &Address) -> CustodyResult<WalletMetadata> {
        let mut record = self
            .store
            .find_wallet(address)
            .ok_or_else(|| CustodyError::not_found("wallet", address.to_string()))?;

        record.active = false;
        record.updated_at = unix_now();
        let metadata = record.metadata();
        self.store.save_wallet(record)?;

        tracing::info!(address = %address, "Wallet deactivated");
        Ok(metadata)
    }

    /// Native balance on chain.
    pub async fn balance(&self, address: &Address) -> CustodyResult<U256> {
        Ok(self.transactions.chain().get_balance(*address).await?)
    }

    /// Whether `address` holds the issuer role.
    pub async fn has_issuer_role(&self, address: &Address) -> CustodyResult<bool> {
        Ok(self.capability.is_issuer(*address).await?)
    }

    /// Grant the issuer role, signed by the admin.
    pub async fn grant_issuer_role(&self, address: &Address) -> CustodyResult<TxHash> {
        let admin = self.admin_signer()?;
        let call = self.encoder.encode(&ContractCall::GrantRole {
            role: issuer_role(),
            account: *address,
        })?;
        let record = self.transactions.execute(&admin, call).await?;
        let tx_hash = record
            .hash
            .ok_or_else(|| CustodyError::Consistency("confirmed transaction without hash".to_string()))?;

        tracing::info!(address = %address, tx_hash = %tx_hash, "Issuer role granted");
        Ok(tx_hash)
    }
}

fn require_name(name: &str) -> CustodyResult<()> {
    if name.trim().is_empty() {
        return Err(CustodyError::Validation("wallet name is required".to_string()));
    }
    Ok(())
}

fn duplicate_as_conflict(err: StorageError, kind: &'static str) -> CustodyError {
    match err {
        StorageError::Duplicate { key, .. } => CustodyError::conflict(kind, key),
        other => other.into(),
    }
}
