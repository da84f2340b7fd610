//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`tx_hash`, `list_id`, `credential_id`) rather than formatted strings
//! - Secrets never reach a log line
//! - Metric updates are cheap no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
