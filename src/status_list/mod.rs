//! Status list subsystem.
//!
//! # Data Flow
//! ```text
//! create_list → empty bitstring document → hash → createList (chain) → version 1
//! allocate_index → max(bit length, cursor) → cursor + 1 persisted
//! revoke / restore / update_uri → candidate version N+1
//!     → publish (chain) [+ attribute write] → persist N+1
//! is_revoked → latest confirmed version's bitstring
//! ```
//!
//! # Invariants
//! - Only chain-confirmed versions are persisted; the highest is authoritative
//! - Every persisted version's hash is the SHA-256 of its own canonical document
//! - Versions per list increase by exactly one
//! - An index is handed out at most once per list

pub mod bitstring;
pub mod engine;
pub mod types;

pub use bitstring::Bitstring;
pub use engine::{ReconcileState, Reconciled, StatusListEngine, UpdateContext, UpdateOutcome};
pub use types::{
    AttributeWrite, ListChange, PendingUpdate, StatusListDocument, StatusListMetadata,
    StatusListRecord, StatusPurpose, WriteState,
};
