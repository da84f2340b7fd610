//! Master-password aware front end over the envelope primitives.

use zeroize::Zeroizing;

use crate::vault::envelope::{self, EncryptedBlob};
use crate::vault::VaultError;

/// Which password protects a secret.
#[derive(Debug, Clone, Copy)]
pub enum PasswordContext<'a> {
    /// The system-wide master password.
    Master,
    /// A per-secret password supplied by the caller.
    Custom(&'a str),
}

impl<'a> PasswordContext<'a> {
    /// Custom when a password is supplied, master otherwise.
    pub fn from_option(password: Option<&'a str>) -> Self {
        match password {
            Some(p) => PasswordContext::Custom(p),
            None => PasswordContext::Master,
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, PasswordContext::Master)
    }
}

/// Envelope encryption of custodial key material.
pub struct KeyVault {
    iterations: u32,
    master_password: Zeroizing<String>,
}

impl KeyVault {
    pub fn new(master_password: Zeroizing<String>, iterations: u32) -> Self {
        Self {
            iterations,
            master_password,
        }
    }

    /// Encrypt with an explicit password.
    pub fn encrypt(&self, secret: &[u8], password: &str) -> Result<EncryptedBlob, VaultError> {
        envelope::encrypt(secret, password.as_bytes(), self.iterations)
    }

    /// Decrypt with an explicit password, at the blob's own iteration count.
    pub fn decrypt(&self, blob: &EncryptedBlob, password: &str) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        envelope::decrypt(blob, password.as_bytes())
    }

    /// Encrypt under the given password context.
    pub fn seal(&self, secret: &[u8], ctx: PasswordContext<'_>) -> Result<EncryptedBlob, VaultError> {
        self.encrypt(secret, self.password_for(ctx))
    }

    /// Decrypt under the given password context.
    pub fn open(&self, blob: &EncryptedBlob, ctx: PasswordContext<'_>) -> Result<Zeroizing<Vec<u8>>, VaultError> {
        self.decrypt(blob, self.password_for(ctx))
    }

    fn password_for<'a>(&'a self, ctx: PasswordContext<'a>) -> &'a str {
        match ctx {
            PasswordContext::Master => self.master_password.as_str(),
            PasswordContext::Custom(p) => p,
        }
    }
}

impl std::fmt::Debug for KeyVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVault")
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> KeyVault {
        KeyVault::new(Zeroizing::new("master-secret".to_string()), 1_000)
    }

    #[test]
    fn test_master_context_roundtrip() {
        let vault = vault();
        let blob = vault.seal(b"key", PasswordContext::Master).unwrap();
        assert_eq!(vault.open(&blob, PasswordContext::Master).unwrap().as_slice(), b"key");
        // Master-sealed blobs open with the master password given explicitly
        assert_eq!(vault.decrypt(&blob, "master-secret").unwrap().as_slice(), b"key");
    }

    #[test]
    fn test_custom_password_not_interchangeable_with_master() {
        let vault = vault();
        let blob = vault.seal(b"key", PasswordContext::Custom("alice-pw")).unwrap();
        assert!(matches!(
            vault.open(&blob, PasswordContext::Master),
            Err(VaultError::AuthenticationFailure)
        ));
        assert_eq!(
            vault.open(&blob, PasswordContext::Custom("alice-pw")).unwrap().as_slice(),
            b"key"
        );
    }

    #[test]
    fn test_blobs_survive_iteration_change() {
        let blob = vault().seal(b"key", PasswordContext::Master).unwrap();
        let stored = blob.encode();

        let retuned = KeyVault::new(Zeroizing::new("master-secret".to_string()), 5_000);
        let reloaded = EncryptedBlob::decode(&stored).unwrap();
        assert_eq!(
            retuned.open(&reloaded, PasswordContext::Master).unwrap().as_slice(),
            b"key"
        );
        assert_eq!(retuned.seal(b"key", PasswordContext::Master).unwrap().iterations, 5_000);
    }

    #[test]
    fn test_context_from_option() {
        assert!(PasswordContext::from_option(None).is_master());
        assert!(!PasswordContext::from_option(Some("x")).is_master());
    }

    #[test]
    fn test_debug_hides_master_password() {
        assert!(!format!("{:?}", vault()).contains("master-secret"));
    }
}
