//! Credential subsystem.
//!
//! # Data Flow
//! ```text
//! IssueRequest
//!     → orchestrator.rs (validate, allocate index, sign, anchor, persist)
//!     → envelope.rs (ES256K-R compact token over the canonical payload)
//!
//! verify(token)
//!     → envelope parse + signer recovery
//!     → local row, status list bit, expiry, registry status
//! ```

pub mod envelope;
pub mod orchestrator;
pub mod types;

pub use orchestrator::{CredentialFilter, CredentialOrchestrator};
pub use types::{
    AnchorStatus, ClaimValue, Claims, Credential, CredentialPayload, CredentialStatus,
    IssueRequest, StatusChange, Verification,
};
