use std::time::Duration;

use tracing::info;

use crate::services::reconcile::Reconciler;

/// Periodic reconciliation driver for device deployments. Each tick drains
/// whatever the queue accumulated while offline; errors never stop the loop.
pub struct ReconcileScheduler {
    reconciler: Reconciler,
    interval: Duration,
}

impl ReconcileScheduler {
    pub fn new(reconciler: Reconciler, interval_secs: u64) -> Self {
        Self {
            reconciler,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn start(self) {
        info!(
            "Starting reconcile scheduler (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;

            match self.reconciler.reconcile().await {
                Ok(stats) => {
                    info!(
                        "Scheduled reconcile - submitted: {}, failed: {}, invalidated: {}, pruned: {}",
                        stats.submitted, stats.failed, stats.invalidated, stats.pruned
                    );
                }
                Err(e) => {
                    tracing::warn!("Scheduled reconcile failed: {:?}", e);
                }
            }
        }
    }
}
