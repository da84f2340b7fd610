//! Process secrets read from the environment.
//!
//! The master password and the admin key never live in the config file. They
//! are loaded once at startup and handed to the components that need them.

use zeroize::Zeroizing;

use crate::config::loader::ConfigError;
use crate::config::schema::VaultConfig;

/// Secrets required by the key vault and the admin signer.
#[derive(Clone)]
pub struct Secrets {
    /// System-wide password protecting vault-managed keys.
    pub master_password: Zeroizing<String>,
    /// Externally supplied key for privileged chain operations.
    pub admin_private_key: Option<Zeroizing<String>>,
}

impl Secrets {
    pub fn new(master_password: impl Into<String>, admin_private_key: Option<String>) -> Self {
        Self {
            master_password: Zeroizing::new(master_password.into()),
            admin_private_key: admin_private_key.map(Zeroizing::new),
        }
    }

    /// Read secrets from the variables named in the vault configuration.
    pub fn from_env(config: &VaultConfig) -> Result<Self, ConfigError> {
        let master_password = std::env::var(&config.master_password_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingSecret(config.master_password_env.clone()))?;

        let admin_private_key = std::env::var(&config.admin_key_env)
            .ok()
            .filter(|v| !v.is_empty());

        if admin_private_key.is_none() {
            tracing::warn!(
                variable = %config.admin_key_env,
                "Admin key not configured; privileged writes fall back to the issuer wallet"
            );
        }

        Ok(Self::new(master_password, admin_private_key))
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("master_password", &"<redacted>")
            .field("admin_private_key", &self.admin_private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_master_password() {
        let config = VaultConfig {
            master_password_env: "VC_CUSTODY_TEST_UNSET_MASTER".into(),
            ..VaultConfig::default()
        };
        let err = Secrets::from_env(&config).unwrap_err();
        assert!(err.to_string().contains("VC_CUSTODY_TEST_UNSET_MASTER"));
    }

    #[test]
    fn test_debug_redacts() {
        let secrets = Secrets::new("hunter2", Some("0xdeadbeef".into()));
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("deadbeef"));
    }
}
