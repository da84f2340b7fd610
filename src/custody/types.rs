//! Wallet records and the metadata view handed to callers.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// How the key material entered custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletKind {
    /// Keypair generated by the service.
    Generated,
    /// Existing private key imported by an operator.
    Imported,
}

/// Persisted wallet row. The private key only exists here in encrypted form.
#[derive(Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub address: Address,
    pub name: String,
    pub description: String,
    /// Compact envelope: base64(salt || iv || ciphertext).
    pub encrypted_key: String,
    /// Base64 salt, duplicated from the envelope for inspection.
    pub salt: String,
    /// True when a per-wallet password (not the master password) protects the key.
    pub custom_password: bool,
    pub active: bool,
    pub kind: WalletKind,
    pub created_at: u64,
    pub updated_at: u64,
}

impl WalletRecord {
    /// Strip key material.
    pub fn metadata(&self) -> WalletMetadata {
        WalletMetadata {
            address: self.address,
            name: self.name.clone(),
            description: self.description.clone(),
            active: self.active,
            kind: self.kind,
            custom_password: self.custom_password,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl std::fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Wallet as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletMetadata {
    pub address: Address,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub kind: WalletKind,
    pub custom_password: bool,
    pub created_at: u64,
    pub updated_at: u64,
}
