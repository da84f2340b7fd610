//! Status list rows and the published list document.

use alloy::primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::blockchain::contracts::ContractCall;

pub const STATUS_LIST_CONTEXT: [&str; 2] = [
    "https://www.w3.org/2018/credentials/v1",
    "https://w3id.org/vc/status-list/2021/v1",
];

/// What a set bit means for the credential bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPurpose {
    Revocation,
    Suspension,
}

impl StatusPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusPurpose::Revocation => "revocation",
            StatusPurpose::Suspension => "suspension",
        }
    }
}

impl fmt::Display for StatusPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "revocation" => Ok(StatusPurpose::Revocation),
            "suspension" => Ok(StatusPurpose::Suspension),
            other => Err(format!("unknown status purpose '{}'", other)),
        }
    }
}

/// Subject of a status list document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListSubject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status_purpose: StatusPurpose,
    /// Base64 of the packed bitstring (MSB first).
    pub encoded_list: String,
    /// Number of meaningful bits in `encoded_list`.
    pub length: u64,
}

/// The document whose digest is published on chain.
///
/// Field order is fixed by the struct, so `serde_json::to_vec` is the
/// canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub issuer: String,
    pub valid_from: u64,
    pub valid_until: u64,
    pub credential_subject: StatusListSubject,
}

/// One immutable version of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListRecord {
    pub list_id: String,
    pub version: u64,
    pub uri: String,
    /// SHA-256 of the canonical document.
    pub hash: B256,
    pub purpose: StatusPurpose,
    /// Issuer identifier (DID) written into the document.
    pub issuer: String,
    /// Wallet that publishes updates for this list.
    pub issuer_wallet: Address,
    pub document: StatusListDocument,
    /// Transaction that published this version.
    pub tx_hash: Option<TxHash>,
    pub created_at: u64,
}

impl StatusListRecord {
    /// Bit length of this version.
    pub fn size(&self) -> u64 {
        self.document.credential_subject.length
    }
}

/// What an update does to the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListChange {
    SetBit(u64),
    ClearBit(u64),
    Relocate { uri: String },
}

/// Progress of one chain write inside an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteState {
    /// Not submitted, or must be submitted again.
    Pending,
    /// Submitted; outcome unknown.
    InFlight(TxHash),
    Confirmed(TxHash),
}

/// Second chain write bound to an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeWrite {
    pub call: ContractCall,
    /// Signer address, re-resolved on reconciliation.
    pub signer: Address,
    pub state: WriteState,
}

/// Candidate version waiting on chain confirmation.
///
/// Persisted alongside the versions so in-flight hashes survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub candidate: StatusListRecord,
    pub change: ListChange,
    pub credential_id: Option<String>,
    pub list_write: WriteState,
    pub attribute: Option<AttributeWrite>,
    pub last_error: Option<String>,
    pub created_at: u64,
}

/// Summary returned by metadata queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListMetadata {
    pub list_id: String,
    pub uri: String,
    pub hash: B256,
    pub version: u64,
    pub purpose: StatusPurpose,
    pub issuer: String,
    pub issuer_wallet: Address,
    pub size: u64,
    pub total_credentials: usize,
    pub valid_credentials: usize,
    pub revoked_credentials: usize,
    pub pending_update: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_parsing() {
        assert_eq!("Revocation".parse::<StatusPurpose>().unwrap(), StatusPurpose::Revocation);
        assert_eq!("suspension".parse::<StatusPurpose>().unwrap(), StatusPurpose::Suspension);
        assert!("refresh".parse::<StatusPurpose>().is_err());
        assert_eq!(serde_json::to_string(&StatusPurpose::Suspension).unwrap(), "\"suspension\"");
    }
}
