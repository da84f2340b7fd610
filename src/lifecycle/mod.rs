//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Read secrets → Connect chain → Verify chain id
//!     → Load snapshot → Build services → Start listeners
//!
//! Reconciler (reconciler.rs):
//!     every interval → finish pending status list updates
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → stop accepting → stop reconciler → save snapshot → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then chain, then services, listeners last
//! - Fail fast: any startup error is fatal
//! - A transaction already submitted is never cancelled; shutdown only stops polling

pub mod reconciler;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use reconciler::run_reconciler;
pub use shutdown::Shutdown;
pub use startup::{build_services, Services};
