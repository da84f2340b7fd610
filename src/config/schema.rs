//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the custody
//! service. All types derive Serde traits for deserialization from config files.
//! Secrets (master password, admin key) are never part of the file; see
//! [`crate::config::secrets`].

use serde::{Deserialize, Serialize};

/// Root configuration for the custody service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CustodyConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Chain connection and transaction parameters.
    pub blockchain: BlockchainConfig,

    /// Deployed contract addresses.
    pub contracts: ContractsConfig,

    /// Key vault settings.
    pub vault: VaultConfig,

    /// Status list document settings.
    pub status_lists: StatusListConfig,

    /// Credential issuance settings.
    pub credentials: CredentialConfig,

    /// Local persistence.
    pub storage: StorageConfig,

    /// Background reconciliation of unconfirmed status list updates.
    pub reconciler: ReconcilerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// REST API authentication.
    pub api: ApiConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds. Must exceed the confirmation ceiling.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 180,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs (reads only).
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Chain ID bound into every signed transaction (EIP-155).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Fixed gas price in wei. The permissioned network is zero-gas.
    pub gas_price_wei: u64,

    /// Fixed gas limit ceiling for every transaction.
    pub gas_limit: u64,

    /// Receipt polling attempts before reporting a timeout.
    pub confirmation_attempts: u32,

    /// Delay between receipt polls in milliseconds.
    pub confirmation_interval_ms: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1337,
            rpc_timeout_secs: 10,
            gas_price_wei: 0,
            gas_limit: 4_700_000,
            confirmation_attempts: 30,
            confirmation_interval_ms: 2000,
        }
    }
}

/// Addresses of the deployed registry contracts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContractsConfig {
    /// DID / credential registry.
    pub registry_address: String,

    /// Status list manager. Defaults to the registry when unset.
    pub status_list_address: Option<String>,
}

impl Default for ContractsConfig {
    fn default() -> Self {
        Self {
            registry_address: "0xc47a675198759Cf712a53Bb4a7EDbC33bb799285".to_string(),
            status_list_address: None,
        }
    }
}

/// Key vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub kdf_iterations: u32,

    /// Environment variable holding the system master password.
    pub master_password_env: String,

    /// Environment variable holding the admin signer's private key.
    pub admin_key_env: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: 65_536,
            master_password_env: "CUSTODY_MASTER_PASSWORD".to_string(),
            admin_key_env: "CUSTODY_ADMIN_PRIVATE_KEY".to_string(),
        }
    }
}

/// Status list document configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusListConfig {
    /// Base URL under which list documents are published (`{base}/{listId}.json`).
    pub base_url: String,

    /// Validity window written into each document, in seconds.
    pub validity_secs: u64,
}

impl Default for StatusListConfig {
    fn default() -> Self {
        Self {
            base_url: "https://idbra.example/status".to_string(),
            validity_secs: 10 * 365 * 24 * 3600,
        }
    }
}

/// Credential issuance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// Expiry applied when a request carries none, in seconds.
    pub default_validity_secs: u64,

    /// Dispatch the best-effort metadata anchor after issuance.
    pub anchor_metadata: bool,

    /// Attribute validity used for the metadata anchor when the credential has no expiry.
    pub metadata_validity_secs: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            default_validity_secs: 365 * 24 * 3600,
            anchor_metadata: true,
            metadata_validity_secs: 10 * 365 * 24 * 3600,
        }
    }
}

/// Local persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot file. In-memory only when unset.
    pub snapshot_path: Option<String>,
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Run the background reconciler.
    pub enabled: bool,

    /// Interval between passes in seconds.
    pub interval_secs: u64,

    /// Base delay for backoff after a failed pass, in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
