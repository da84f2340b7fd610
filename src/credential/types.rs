//! Credential rows, claim values and the issuance/verification DTOs.

use alloy::primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const STATUS_ENTRY_TYPE: &str = "StatusList2021Entry";

/// A single claim value.
///
/// Serialized untagged so the credential subject keeps plain JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    List(Vec<ClaimValue>),
    Map(BTreeMap<String, ClaimValue>),
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        ClaimValue::Text(s.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self {
        ClaimValue::Text(s)
    }
}

impl From<i64> for ClaimValue {
    fn from(n: i64) -> Self {
        ClaimValue::Integer(n)
    }
}

impl From<bool> for ClaimValue {
    fn from(b: bool) -> Self {
        ClaimValue::Bool(b)
    }
}

/// Ordered claim map.
pub type Claims = BTreeMap<String, ClaimValue>;

/// Local lifecycle status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    Valid,
    Revoked,
    Suspended,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Valid => "VALID",
            CredentialStatus::Revoked => "REVOKED",
            CredentialStatus::Suspended => "SUSPENDED",
        }
    }
}

/// `credentialStatus` block embedded in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status_purpose: String,
    pub status_list_index: String,
    pub status_list_credential: String,
}

/// The `vc` claim of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcBody {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub credential_subject: Claims,
    pub credential_status: StatusEntry,
}

/// Signed payload. Field order is the canonical encoding order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    pub vc: VcBody,
}

/// Persisted credential row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub credential_id: String,
    pub issuer_did: String,
    pub holder_did: String,
    pub credential_type: String,
    pub issuer_wallet: Address,
    pub holder_address: Address,
    pub payload: CredentialPayload,
    /// SHA-256 of the canonical payload, anchored on chain.
    pub content_hash: B256,
    pub status_list_id: String,
    pub status_list_index: u64,
    pub status: CredentialStatus,
    pub issued_at: u64,
    pub expires_at: Option<u64>,
    pub updated_at: u64,
    pub revoked_at: Option<u64>,
    /// Compact signed envelope.
    pub token: String,
    /// Existence anchor transaction.
    pub anchor_tx: Option<TxHash>,
}

/// Input to issuance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub issuer_did: String,
    pub holder_did: String,
    pub credential_type: String,
    pub status_list_id: String,
    pub issuer_wallet_address: String,
    pub holder_wallet_address: String,
    #[serde(default)]
    pub claims: Claims,
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Custom password protecting the issuer wallet, if any.
    #[serde(default)]
    pub issuer_password: Option<String>,
}

/// Outcome of the best-effort metadata anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorStatus {
    Pending,
    Anchored { tx_hash: TxHash },
    Failed { reason: String },
    Skipped,
}

/// Result of a revoke or restore request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub credential_id: String,
    /// Status after the call. Unchanged while the chain writes are pending.
    pub status: CredentialStatus,
    /// True when the chain writes have not confirmed yet.
    pub pending: bool,
    pub list_version: Option<u64>,
}

/// Complete diagnostic set from `verify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub valid: bool,
    pub credential_id: Option<String>,
    pub status: Option<CredentialStatus>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Verification {
    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_keep_plain_json_shape() {
        let json = r#"{"age":42,"degree":{"name":"BSc","honours":true},"score":9.5,"tags":["a","b"],"note":null}"#;
        let claims: Claims = serde_json::from_str(json).unwrap();

        assert_eq!(claims["age"], ClaimValue::Integer(42));
        assert_eq!(claims["score"], ClaimValue::Number(9.5));
        assert_eq!(claims["note"], ClaimValue::Null);
        assert!(matches!(claims["degree"], ClaimValue::Map(_)));

        // BTreeMap orders keys, so re-encoding is canonical
        let encoded = serde_json::to_string(&claims).unwrap();
        assert!(encoded.starts_with(r#"{"age":42,"degree":{"honours":true,"name":"BSc"}"#));
    }

    #[test]
    fn test_anchor_status_shape() {
        let s = serde_json::to_value(AnchorStatus::Failed { reason: "reverted".into() }).unwrap();
        assert_eq!(s["state"], "FAILED");
        assert_eq!(s["reason"], "reverted");
    }

    #[test]
    fn test_verification_finish() {
        let mut v = Verification::default();
        v.warn("chain unreachable");
        assert!(v.clone().finish().valid);
        v.error("expired");
        assert!(!v.finish().valid);
    }
}
