//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! chain write for signer S / update of list L:
//!     → keyed_lock.rs (one writer per key, in process)
//!
//! reconciler pass left updates pending:
//!     → backoff.rs (PassPacer: exponential delay with jitter before the next pass)
//! ```
//!
//! # Design Decisions
//! - Locks are per key; unrelated signers and lists never contend
//! - No cross-process locking; a single custody process owns its keys

pub mod backoff;
pub mod keyed_lock;

pub use backoff::PassPacer;
pub use keyed_lock::KeyedMutex;
