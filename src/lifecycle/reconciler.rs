//! Background reconciliation of pending status list updates.

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::ReconcilerConfig;
use crate::credential::CredentialOrchestrator;
use crate::resilience::backoff::PassPacer;
use crate::status_list::ReconcileState;

/// Run reconciliation passes until shutdown.
///
/// After a pass that leaves updates pending, the next pass is paced by
/// exponential backoff instead of the fixed interval.
pub async fn run_reconciler(
    orchestrator: Arc<CredentialOrchestrator>,
    config: ReconcilerConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut pacer = PassPacer::from(&config);

    tracing::info!(interval_secs = config.interval_secs, "Reconciler started");

    loop {
        let delay = pacer.next_delay();
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let results = orchestrator.reconcile_all().await;
        if results.is_empty() {
            pacer.record(false);
            continue;
        }

        let mut pending = 0;
        for r in &results {
            match &r.state {
                ReconcileState::Applied => tracing::info!(
                    list_id = %r.list_id,
                    version = r.version,
                    "Pending update reconciled"
                ),
                ReconcileState::Pending(reason) => {
                    pending += 1;
                    tracing::debug!(list_id = %r.list_id, version = r.version, reason = %reason, "Update still pending");
                }
                ReconcileState::Discarded(reason) => tracing::warn!(
                    list_id = %r.list_id,
                    version = r.version,
                    reason = %reason,
                    "Pending update discarded"
                ),
            }
        }
        pacer.record(pending > 0);
    }

    tracing::info!("Reconciler stopped");
}
