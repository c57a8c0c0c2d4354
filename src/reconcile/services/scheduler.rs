//! Periodic reconciliation.

use super::Reconciler;
use crate::health::ports::HealthProber;
use crate::registry::ports::RegistryPersistence;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs a cycle every `interval` until `cancel` fires.
///
/// The first cycle starts immediately. Ticks missed while a cycle overran
/// are skipped rather than replayed, and cancellation also interrupts the
/// cycle in progress.
pub fn spawn_periodic<P, H, C>(
    reconciler: Arc<Reconciler<P, H, C>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    P: RegistryPersistence + 'static,
    H: HealthProber + 'static,
    C: Clock + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?interval, "reconciliation scheduler started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _tick = ticker.tick() => {
                    let report = reconciler.run_cycle_with(&cancel).await;
                    debug!(cycle_id = %report.cycle_id, status = %report.status, "scheduled cycle done");
                }
            }
        }
        info!("reconciliation scheduler stopped");
    })
}
