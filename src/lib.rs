//! Custody backend for verifiable credentials anchored on an EVM ledger.
//!
//! Holds issuer keys encrypted at rest, signs and submits registry
//! transactions, maintains versioned revocation status lists and drives the
//! issue / revoke / restore / verify lifecycle of credentials.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod credential;
pub mod custody;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod status_list;
pub mod storage;
pub mod vault;

use std::time::{SystemTime, UNIX_EPOCH};

pub use config::CustodyConfig;
pub use error::{CustodyError, CustodyResult};
pub use lifecycle::Shutdown;

/// Current time in unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
