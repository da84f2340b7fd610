//! Wallet custody subsystem.
//!
//! # Data Flow
//! ```text
//! create / import
//!     → secp256k1 key (generated or supplied)
//!     → vault (envelope encryption under custom or master password)
//!     → WalletStore (metadata + encrypted blob only)
//!
//! resolve_signer(address, password context)
//!     → vault decrypt → SigningCredentials (dropped after one operation)
//! ```

pub mod types;
pub mod wallet_service;

use alloy::primitives::Address;

use crate::error::{CustodyError, CustodyResult};

pub use types::{WalletKind, WalletMetadata, WalletRecord};
pub use wallet_service::WalletCustody;

/// Parse a hex address from caller input.
pub fn parse_address(field: &str, value: &str) -> CustodyResult<Address> {
    value
        .trim()
        .parse()
        .map_err(|_| CustodyError::Validation(format!("{} is not a valid address: '{}'", field, value)))
}
