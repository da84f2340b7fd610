//! Packed status bitstring and the canonical list document.

use alloy::primitives::B256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{CustodyError, CustodyResult};
use crate::status_list::types::{
    StatusListDocument, StatusListSubject, StatusPurpose, STATUS_LIST_CONTEXT,
};

/// Index-addressed bits, most significant bit first within each byte.
/// A set bit means the slot is revoked (or suspended).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitstring {
    bytes: Vec<u8>,
    len: u64,
}

impl Bitstring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode from base64 with an explicit bit length.
    pub fn decode(encoded: &str, len: u64) -> CustodyResult<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CustodyError::Consistency(format!("corrupt status list encoding: {}", e)))?;
        if (bytes.len() as u64) < len.div_ceil(8) {
            return Err(CustodyError::Consistency(format!(
                "status list encoding holds {} bytes, length {} needs {}",
                bytes.len(),
                len,
                len.div_ceil(8)
            )));
        }
        Ok(Self { bytes, len })
    }

    pub fn encode(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit at `index`; indices past the end read as unset.
    pub fn get(&self, index: u64) -> bool {
        if index >= self.len {
            return false;
        }
        let byte = self.bytes[(index / 8) as usize];
        byte & (0x80 >> (index % 8)) != 0
    }

    /// Set or clear `index`, growing with zero bits when it is past the end.
    pub fn set(&mut self, index: u64, value: bool) {
        if index >= self.len {
            self.len = index + 1;
            self.bytes.resize(self.len.div_ceil(8) as usize, 0);
        }
        let mask = 0x80 >> (index % 8);
        let byte = &mut self.bytes[(index / 8) as usize];
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    pub fn count_set(&self) -> u64 {
        (0..self.len).filter(|i| self.get(*i)).count() as u64
    }
}

/// Assemble the list document for one version.
pub fn build_document(
    uri: &str,
    issuer: &str,
    purpose: StatusPurpose,
    bits: &Bitstring,
    valid_from: u64,
    validity_secs: u64,
) -> StatusListDocument {
    StatusListDocument {
        context: STATUS_LIST_CONTEXT.iter().map(|s| s.to_string()).collect(),
        id: uri.to_string(),
        types: vec![
            "VerifiableCredential".to_string(),
            "StatusList2021Credential".to_string(),
        ],
        issuer: issuer.to_string(),
        valid_from,
        valid_until: valid_from.saturating_add(validity_secs),
        credential_subject: StatusListSubject {
            id: format!("{}#list", uri),
            kind: "StatusList2021".to_string(),
            status_purpose: purpose,
            encoded_list: bits.encode(),
            length: bits.len(),
        },
    }
}

/// SHA-256 over the canonical JSON encoding.
pub fn content_hash(document: &StatusListDocument) -> CustodyResult<B256> {
    let canonical = serde_json::to_vec(document)
        .map_err(|e| CustodyError::Crypto(format!("cannot encode status list: {}", e)))?;
    Ok(B256::from_slice(&Sha256::digest(&canonical)))
}

/// Bits carried by a document.
pub fn document_bits(document: &StatusListDocument) -> CustodyResult<Bitstring> {
    Bitstring::decode(
        &document.credential_subject.encoded_list,
        document.credential_subject.length,
    )
}
