//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (iterations, polling bounds, chain id)
//! - Check that contract addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CustodyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::fmt;

use crate::config::schema::CustodyConfig;

/// Lowest PBKDF2 iteration count accepted.
pub const MIN_KDF_ITERATIONS: u32 = 1_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CustodyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let chain = &config.blockchain;
    if chain.rpc_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("blockchain.rpc_url", "not a valid URL"));
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::new("blockchain.chain_id", "must be non-zero"));
    }
    if chain.confirmation_attempts == 0 {
        errors.push(ValidationError::new(
            "blockchain.confirmation_attempts",
            "must be at least 1",
        ));
    }
    if chain.confirmation_interval_ms == 0 {
        errors.push(ValidationError::new(
            "blockchain.confirmation_interval_ms",
            "must be greater than 0",
        ));
    }
    if chain.gas_limit < 21_000 {
        errors.push(ValidationError::new(
            "blockchain.gas_limit",
            "must cover the intrinsic cost of 21000",
        ));
    }

    if config.contracts.registry_address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "contracts.registry_address",
            "not a valid address",
        ));
    }
    if let Some(addr) = &config.contracts.status_list_address {
        if addr.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                "contracts.status_list_address",
                "not a valid address",
            ));
        }
    }

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(ValidationError::new(
            "vault.kdf_iterations",
            format!("must be at least {}", MIN_KDF_ITERATIONS),
        ));
    }

    if config.status_lists.base_url.parse::<url::Url>().is_err() {
        errors.push(ValidationError::new("status_lists.base_url", "not a valid URL"));
    }

    let ceiling_secs = (chain.confirmation_attempts as u64)
        .saturating_mul(chain.confirmation_interval_ms)
        / 1000;
    if config.server.request_timeout_secs <= ceiling_secs {
        errors.push(ValidationError::new(
            "server.request_timeout_secs",
            format!("must exceed the confirmation ceiling of {}s", ceiling_secs),
        ));
    }

    if config.api.api_key.len() < 16 {
        errors.push(ValidationError::new("api.api_key", "must be at least 16 characters"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
