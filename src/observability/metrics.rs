//! Metrics collection and exposition.
//!
//! # Metrics
//! - `custody_tx_total` (counter): terminal transaction states, by `state`
//! - `custody_credentials_total` (counter): issuance lifecycle events, by `event`
//! - `custody_status_list_version` (gauge): latest confirmed version, by `list_id`
//! - `custody_metadata_anchor_total` (counter): metadata anchor outcomes, by `outcome`
//! - `custody_pending_updates` (gauge): unreconciled status list updates
//! - `custody_rpc_health` (gauge): 1=reachable, 0=unreachable

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_transaction(state: &'static str) {
    metrics::counter!("custody_tx_total", "state" => state).increment(1);
}

pub fn record_credential_event(event: &'static str) {
    metrics::counter!("custody_credentials_total", "event" => event).increment(1);
}

pub fn record_status_list_version(list_id: &str, version: u64) {
    metrics::gauge!("custody_status_list_version", "list_id" => list_id.to_string())
        .set(version as f64);
}

pub fn record_metadata_anchor(outcome: &'static str) {
    metrics::counter!("custody_metadata_anchor_total", "outcome" => outcome).increment(1);
}

pub fn set_pending_updates(count: usize) {
    metrics::gauge!("custody_pending_updates").set(count as f64);
}

pub fn record_rpc_health(healthy: bool) {
    metrics::gauge!("custody_rpc_health").set(if healthy { 1.0 } else { 0.0 });
}
