//! Signing credentials for a single operation.
//!
//! # Security
//! - Built from keys decrypted by the vault or from the externally supplied admin key
//! - Keys are never logged or serialized
//! - Dropped as soon as the signing operation completes

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, SignerSync};
use zeroize::Zeroizing;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// A private key bound to the chain it signs for.
#[derive(Clone)]
pub struct SigningCredentials {
    signer: PrivateKeySigner,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl SigningCredentials {
    /// Parse a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        Ok(Self { signer, chain_id })
    }

    /// Fresh random secp256k1 key.
    pub fn generate(chain_id: u64) -> Self {
        Self {
            signer: PrivateKeySigner::random(),
            chain_id,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Hex private key, for handing to the vault.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(alloy::hex::encode_prefixed(self.signer.to_bytes()))
    }

    /// Sign arbitrary message bytes (with the Ethereum message prefix).
    pub fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message_sync(message)
            .map_err(|e| BlockchainError::Wallet(format!("Message signing failed: {}", e)))
    }

    /// Sign a legacy transaction and return its hash and EIP-2718 encoding.
    pub fn sign_transaction(&self, mut tx: TxLegacy) -> BlockchainResult<(TxHash, Bytes)> {
        if let Some(tx_chain) = tx.chain_id {
            if tx_chain != self.chain_id {
                return Err(BlockchainError::ChainMismatch {
                    expected: self.chain_id,
                    actual: tx_chain,
                });
            }
        }
        tx.chain_id = Some(self.chain_id);

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| BlockchainError::Wallet(format!("Transaction signing failed: {}", e)))?;

        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let raw = TxEnvelope::Legacy(signed).encoded_2718();
        Ok((hash, Bytes::from(raw)))
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::transaction::SignerRecoverable;
    use alloy::consensus::Transaction as _;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{TxKind, U256};

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_from_private_key() {
        let creds = SigningCredentials::from_private_key(TEST_PRIVATE_KEY, 1337).unwrap();
        assert_eq!(
            creds.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        let prefixed = SigningCredentials::from_private_key(&format!("0x{}", TEST_PRIVATE_KEY), 1337).unwrap();
        assert_eq!(prefixed.address(), creds.address());
    }

    #[test]
    fn test_invalid_private_key() {
        let result = SigningCredentials::from_private_key("invalid_key", 1);
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_generated_key_roundtrips_through_hex() {
        let creds = SigningCredentials::generate(1337);
        let again = SigningCredentials::from_private_key(&creds.private_key_hex(), 1337).unwrap();
        assert_eq!(creds.address(), again.address());
    }

    #[test]
    fn test_signed_transaction_recovers_sender() {
        let creds = SigningCredentials::from_private_key(TEST_PRIVATE_KEY, 1337).unwrap();
        let tx = TxLegacy {
            chain_id: None,
            nonce: 4,
            gas_price: 0,
            gas_limit: 4_700_000,
            to: TxKind::Call(Address::repeat_byte(0x22)),
            value: U256::ZERO,
            input: Bytes::from_static(&[1, 2, 3]),
        };

        let (hash, raw) = creds.sign_transaction(tx).unwrap();
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap();
        assert_eq!(*envelope.tx_hash(), hash);
        assert_eq!(envelope.recover_signer().unwrap(), creds.address());
        assert_eq!(envelope.chain_id(), Some(1337));
    }

    #[test]
    fn test_chain_mismatch_rejected() {
        let creds = SigningCredentials::generate(1337);
        let tx = TxLegacy {
            chain_id: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            creds.sign_transaction(tx),
            Err(BlockchainError::ChainMismatch { expected: 1337, actual: 1 })
        ));
    }

    #[test]
    fn test_sign_message_recovers() {
        let creds = SigningCredentials::generate(1337);
        let sig = creds.sign_message(b"hello").unwrap();
        assert_eq!(sig.as_bytes().len(), 65);
        assert_eq!(sig.recover_address_from_msg(b"hello").unwrap(), creds.address());
    }

    #[test]
    fn test_debug_redacts_key() {
        let creds = SigningCredentials::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        assert!(!format!("{:?}", creds).contains("ac0974"));
    }
}
