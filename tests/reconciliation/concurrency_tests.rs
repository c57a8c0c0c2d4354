//! Single-flight cycles, cycle deadlines, and slow subscribers.

use super::helpers::{Harness, all_services, harness, prober};
use crate::test_helpers::{Endpoint, closed_port, silent_listener};
use async_trait::async_trait;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use vauban::discovery::domain::{CandidateSource, DiscoveryResult};
use vauban::discovery::ports::{Discovery, DiscoverySource};
use vauban::reconcile::domain::CycleStatus;
use vauban::reconcile::services::{ReconcileSettings, Reconciler};
use vauban::registry::domain::ServiceStatus;
use vauban::registry::services::StoreSettings;

struct SlowSource(Duration);

#[async_trait]
impl DiscoverySource for SlowSource {
    fn source(&self) -> CandidateSource {
        CandidateSource::External
    }

    async fn discover(&self) -> DiscoveryResult<Discovery> {
        tokio::time::sleep(self.0).await;
        Ok(Discovery::default())
    }
}

#[rstest]
#[tokio::test]
async fn overlapping_triggers_coalesce(harness: Harness) {
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = Reconciler::new(
        store,
        Arc::new(prober(&harness.clock)),
        Arc::clone(&harness.clock),
        ReconcileSettings::default(),
    )
    .with_source(Arc::new(SlowSource(Duration::from_millis(300))));

    let (first, second) = tokio::join!(reconciler.run_cycle(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        reconciler.trigger().await
    });

    assert_eq!(first.status, CycleStatus::Completed);
    assert_eq!(second.status, CycleStatus::Skipped);
    assert_ne!(first.cycle_id, second.cycle_id);
}

#[rstest]
#[tokio::test]
async fn overrun_cycle_is_partial_and_keeps_merged_results(harness: Harness) {
    let fast = Endpoint::healthy().await;
    let (_slow, slow_port) = silent_listener().await.expect("slow endpoint binds");
    harness
        .workspace
        .node_service("fast", "fast-service", "1.0", fast.port())
        .expect("manifest written");
    harness
        .workspace
        .node_service("slow", "slow-service", "1.0", slow_port)
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(
        Arc::clone(&store),
        ReconcileSettings {
            cycle_deadline: Duration::from_millis(300),
            ..ReconcileSettings::default()
        },
    );

    let report = reconciler.run_cycle().await;

    assert_eq!(report.status, CycleStatus::Partial);
    assert_eq!(report.marked_stale, 0);
    let services = all_services(&store).await;
    assert_eq!(services.len(), 1);
    let merged = services.first().expect("fast service merged");
    assert_eq!(merged.name(), "fast-service");
    assert_eq!(merged.status(), ServiceStatus::Healthy);
}

#[rstest]
#[tokio::test]
async fn lagging_subscriber_never_blocks_a_cycle(harness: Harness) {
    for index in 0..6 {
        let port = closed_port().await.expect("closed port");
        harness
            .workspace
            .node_service(&format!("svc-{index}"), &format!("svc-{index}"), "1.0", port)
            .expect("manifest written");
    }
    let store = harness
        .store(StoreSettings {
            channel_capacity: 2,
            ..StoreSettings::default()
        })
        .await;
    let mut idle = store.subscribe();
    let reconciler = harness.reconciler(Arc::clone(&store), ReconcileSettings::default());

    let report = tokio::time::timeout(Duration::from_secs(10), reconciler.run_cycle())
        .await
        .expect("cycle finishes while a subscriber is idle");

    assert_eq!(report.status, CycleStatus::Completed);
    assert_eq!(report.created, 6);
    let delivered = idle.drain();
    assert_eq!(delivered.len(), 2);
    assert_eq!(idle.missed(), 4);
}
