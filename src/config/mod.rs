//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → CustodyConfig (validated, immutable)
//!     → sections handed to each component at startup
//!
//! environment
//!     → secrets.rs (master password, admin key)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no process-wide signer state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod secrets;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApiConfig, BlockchainConfig, ContractsConfig, CredentialConfig, CustodyConfig,
    ObservabilityConfig, ReconcilerConfig, ServerConfig, StatusListConfig, StorageConfig,
    VaultConfig,
};
pub use secrets::Secrets;
