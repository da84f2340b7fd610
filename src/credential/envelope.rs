//! Compact signed credential envelope.
//!
//! `base64url(header).base64url(payload).base64url(signature)` where the
//! signature is a 65-byte recoverable secp256k1 signature over the EIP-191
//! prefixed signing input (`ES256K-R`). Verification recovers the signer
//! address and compares it with the issuing wallet.

use alloy::primitives::{Address, B256};
use alloy::signers::Signature;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::blockchain::wallet::SigningCredentials;
use crate::credential::types::CredentialPayload;
use crate::error::{CustodyError, CustodyResult};

pub const ALGORITHM: &str = "ES256K-R";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    pub typ: String,
}

/// A token split into its parts.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub header: Header,
    pub payload: CredentialPayload,
    pub signing_input: String,
    pub signature: Signature,
}

impl ParsedToken {
    /// Address whose key produced the signature.
    pub fn recover_signer(&self) -> CustodyResult<Address> {
        self.signature
            .recover_address_from_msg(self.signing_input.as_bytes())
            .map_err(|e| CustodyError::Crypto(format!("signature recovery failed: {}", e)))
    }
}

/// Canonical payload bytes. Struct field order and sorted claim maps make
/// `serde_json` output deterministic.
pub fn canonical_payload(payload: &CredentialPayload) -> CustodyResult<Vec<u8>> {
    serde_json::to_vec(payload)
        .map_err(|e| CustodyError::Crypto(format!("cannot encode payload: {}", e)))
}

/// SHA-256 of the canonical payload.
pub fn payload_hash(payload: &CredentialPayload) -> CustodyResult<B256> {
    Ok(B256::from_slice(&Sha256::digest(canonical_payload(payload)?)))
}

/// Sign a payload with the issuer's key.
pub fn sign(payload: &CredentialPayload, signer: &SigningCredentials) -> CustodyResult<String> {
    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: "JWT".to_string(),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| CustodyError::Crypto(format!("cannot encode header: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(canonical_payload(payload)?)
    );
    let signature = signer
        .sign_message(signing_input.as_bytes())
        .map_err(|e| CustodyError::Crypto(e.to_string()))?;

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.as_bytes())
    ))
}

/// Split and decode a token. Does not check the signature.
pub fn parse(token: &str) -> CustodyResult<ParsedToken> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    let [header_b64, payload_b64, signature_b64] = parts[..] else {
        return Err(CustodyError::Validation(format!(
            "token must have 3 parts, found {}",
            parts.len()
        )));
    };

    let header: Header = decode_json(header_b64, "header")?;
    if header.alg != ALGORITHM {
        return Err(CustodyError::Validation(format!(
            "unsupported algorithm '{}'",
            header.alg
        )));
    }
    let payload: CredentialPayload = decode_json(payload_b64, "payload")?;

    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| CustodyError::Validation(format!("invalid signature encoding: {}", e)))?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|e| CustodyError::Validation(format!("invalid signature: {}", e)))?;

    Ok(ParsedToken {
        header,
        payload,
        signing_input: format!("{}.{}", header_b64, payload_b64),
        signature,
    })
}

fn decode_json<T: serde::de::DeserializeOwned>(part: &str, what: &str) -> CustodyResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| CustodyError::Validation(format!("invalid {} encoding: {}", what, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| CustodyError::Validation(format!("invalid {}: {}", what, e)))
}
