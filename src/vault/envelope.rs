use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::vault::VaultError;

// Password-based AES-256-GCM envelope.
//
// Every call draws a fresh salt, so every call derives a fresh key; the nonce
// is random per call as well. A (key, nonce) pair is therefore never reused.

pub const SALT_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12; // AES-GCM standard nonce size
const TAG_SIZE: usize = 16;

/// Encrypted secret: KDF work factor, salt, nonce and ciphertext (includes GCM tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// PBKDF2 iterations the key was derived with.
    pub iterations: u32,
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    /// Compact storage form: `iterations.base64(salt || iv || ciphertext)`.
    pub fn encode(&self) -> String {
        let mut combined = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + self.ciphertext.len());
        combined.extend_from_slice(&self.salt);
        combined.extend_from_slice(&self.iv);
        combined.extend_from_slice(&self.ciphertext);
        format!("{}.{}", self.iterations, BASE64.encode(combined))
    }

    /// Parse the compact storage form.
    pub fn decode(encoded: &str) -> Result<Self, VaultError> {
        let (iterations, encoded) = encoded
            .split_once('.')
            .ok_or_else(|| VaultError::Malformed("missing iteration count".to_string()))?;
        let iterations = match iterations.parse::<u32>() {
            Ok(0) | Err(_) => {
                return Err(VaultError::Malformed(format!(
                    "invalid iteration count '{}'",
                    iterations
                )))
            }
            Ok(n) => n,
        };

        let combined = BASE64
            .decode(encoded)
            .map_err(|e| VaultError::Malformed(format!("invalid base64: {}", e)))?;
        if combined.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::Malformed("blob too short".to_string()));
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&combined[..SALT_SIZE]);
        let mut iv = [0u8; NONCE_SIZE];
        iv.copy_from_slice(&combined[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);

        Ok(Self {
            iterations,
            salt,
            iv,
            ciphertext: combined[SALT_SIZE + NONCE_SIZE..].to_vec(),
        })
    }

    /// Base64 form of the salt, as stored alongside wallet records.
    pub fn salt_b64(&self) -> String {
        BASE64.encode(self.salt)
    }
}

/// Derive a 256-bit key with PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut *key);
    key
}

/// Encrypt `secret` under a key derived from `password` and a fresh salt.
pub fn encrypt(secret: &[u8], password: &[u8], iterations: u32) -> Result<EncryptedBlob, VaultError> {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt, iterations);
    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| VaultError::Encryption(format!("cipher init failed: {}", e)))?;

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&iv), secret)
        .map_err(|e| VaultError::Encryption(format!("encryption failed: {}", e)))?;

    Ok(EncryptedBlob {
        iterations,
        salt,
        iv,
        ciphertext,
    })
}

/// Re-derive the key from the embedded salt and iteration count, then decrypt.
///
/// A tag mismatch (wrong password or tampered blob) is reported as
/// [`VaultError::AuthenticationFailure`], never as garbage plaintext.
pub fn decrypt(blob: &EncryptedBlob, password: &[u8]) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let key = derive_key(password, &blob.salt, blob.iterations);
    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| VaultError::Encryption(format!("cipher init failed: {}", e)))?;

    cipher
        .decrypt(AesNonce::from_slice(&blob.iv), blob.ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| VaultError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERATIONS: u32 = 1_000;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let blob = encrypt(b"0xprivate", b"pw", ITERATIONS).unwrap();
        let plain = decrypt(&blob, b"pw").unwrap();
        assert_eq!(plain.as_slice(), b"0xprivate");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let k1 = derive_key(b"password", &salt, ITERATIONS);
        let k2 = derive_key(b"password", &salt, ITERATIONS);
        let k3 = derive_key(b"password", &[8u8; SALT_SIZE], ITERATIONS);
        assert_eq!(*k1, *k2);
        assert_ne!(*k1, *k3);
    }

    #[test]
    fn test_fresh_salt_and_nonce_per_call() {
        let b1 = encrypt(b"same", b"pw", ITERATIONS).unwrap();
        let b2 = encrypt(b"same", b"pw", ITERATIONS).unwrap();
        assert_ne!(b1.salt, b2.salt);
        assert_ne!(b1.iv, b2.iv);
        assert_ne!(b1.ciphertext, b2.ciphertext);
    }

    #[test]
    fn test_wrong_password_is_authentication_failure() {
        let blob = encrypt(b"secret", b"right", ITERATIONS).unwrap();
        let err = decrypt(&blob, b"wrong").unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailure));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut blob = encrypt(b"integrity", b"pw", ITERATIONS).unwrap();
        if let Some(byte) = blob.ciphertext.first_mut() {
            *byte ^= 0x01;
        }
        assert!(matches!(
            decrypt(&blob, b"pw"),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_compact_encoding() {
        let blob = encrypt(b"abc", b"pw", ITERATIONS).unwrap();
        let parsed = EncryptedBlob::decode(&blob.encode()).unwrap();
        assert_eq!(parsed, blob);

        assert!(blob.encode().starts_with("1000."));

        for bad in ["AAAA", "1000.AAAA", "0.AAAA", "x.AAAA"] {
            assert!(matches!(EncryptedBlob::decode(bad), Err(VaultError::Malformed(_))));
        }
    }

    #[test]
    fn test_decrypt_uses_stored_iterations() {
        let blob = encrypt(b"legacy", b"pw", ITERATIONS).unwrap();
        let parsed = EncryptedBlob::decode(&blob.encode()).unwrap();
        assert_eq!(parsed.iterations, ITERATIONS);
        assert_eq!(decrypt(&parsed, b"pw").unwrap().as_slice(), b"legacy");
    }
}
