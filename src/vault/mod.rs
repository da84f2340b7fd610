//! Key vault: envelope encryption of custodial private keys.
//!
//! # Data Flow
//! ```text
//! password (custom or master) + fresh random salt
//!     → PBKDF2-HMAC-SHA256 (configurable iterations, 256-bit key)
//!     → AES-256-GCM with fresh random nonce
//!     → EncryptedBlob { iterations, salt, iv, ciphertext }
//! ```
//!
//! # Security Constraints
//! - Plaintext keys only exist in `Zeroizing` buffers
//! - A failed tag check is an authentication failure, never silent corruption
//! - Passwords and keys are never logged

pub mod envelope;
pub mod key_vault;

use thiserror::Error;

use crate::error::CustodyError;

pub use envelope::EncryptedBlob;
pub use key_vault::{KeyVault, PasswordContext};

/// Errors from the vault layer.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Wrong password, or the blob was tampered with.
    #[error("authentication tag did not verify")]
    AuthenticationFailure,

    /// The stored blob could not be parsed.
    #[error("malformed key blob: {0}")]
    Malformed(String),

    #[error("encryption failed: {0}")]
    Encryption(String),
}

impl From<VaultError> for CustodyError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::AuthenticationFailure => CustodyError::AuthenticationFailure,
            other => CustodyError::Crypto(other.to_string()),
        }
    }
}
