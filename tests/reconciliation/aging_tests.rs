//! Staleness and removal of services that stop being discovered.

use super::helpers::{Harness, all_services, harness, only_service};
use crate::test_helpers::{Endpoint, closed_port};
use chrono::TimeDelta;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vauban::discovery::adapters::ExternalRegistryAdapter;
use vauban::reconcile::services::ReconcileSettings;
use vauban::registry::domain::{ChangeAction, RegisteredService, ServiceStatus};
use vauban::registry::services::StoreSettings;

fn short_graces() -> ReconcileSettings {
    ReconcileSettings {
        stale_grace: Duration::from_secs(60),
        removal_grace: Duration::from_secs(600),
        ..ReconcileSettings::default()
    }
}

#[rstest]
#[tokio::test]
async fn vanished_service_goes_stale_then_is_removed(harness: Harness) {
    let port = closed_port().await.expect("closed port");
    let location = harness
        .workspace
        .node_service("billing", "billing-service", "1.0", port)
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(Arc::clone(&store), short_graces());
    reconciler.run_cycle().await;
    std::fs::remove_dir_all(&location).expect("service removed from disk");
    let mut events = store.subscribe();

    harness.clock.advance(TimeDelta::seconds(30));
    let within_grace = reconciler.run_cycle().await;
    harness.clock.advance(TimeDelta::seconds(31));
    let stale = reconciler.run_cycle().await;
    let stale_service = only_service(&store).await;
    harness.clock.advance(TimeDelta::seconds(540));
    let removed = reconciler.run_cycle().await;

    assert_eq!(within_grace.marked_stale, 0);
    assert_eq!(stale.marked_stale, 1);
    assert_eq!(stale_service.status(), ServiceStatus::Stale);
    assert!(stale_service.stale_since().is_some());
    assert_eq!(removed.removed, 1);
    assert!(all_services(&store).await.is_empty());
    let actions: Vec<_> = events.drain().into_iter().map(|event| event.action).collect();
    assert_eq!(
        actions,
        vec![ChangeAction::StatusChanged, ChangeAction::Removed]
    );
}

#[rstest]
#[tokio::test]
async fn reappearing_service_leaves_stale(harness: Harness) {
    let port = closed_port().await.expect("closed port");
    let location = harness
        .workspace
        .node_service("billing", "billing-service", "1.0", port)
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(Arc::clone(&store), short_graces());
    reconciler.run_cycle().await;
    std::fs::remove_dir_all(&location).expect("service removed from disk");
    harness.clock.advance(TimeDelta::seconds(120));
    reconciler.run_cycle().await;

    harness
        .workspace
        .node_service("billing", "billing-service", "1.0", port)
        .expect("manifest restored");
    let report = reconciler.run_cycle().await;

    assert_eq!(report.created, 0);
    let service = only_service(&store).await;
    assert_eq!(service.status(), ServiceStatus::Unhealthy);
    assert_eq!(service.stale_since(), None);
}

#[rstest]
#[tokio::test]
async fn services_of_a_source_that_stays_down_still_age_out(harness: Harness) {
    let listing = json!([{ "name": "ledger", "location": "/srv/ledger" }]);
    let mut registry = Endpoint::spawn("/services", 200, &listing.to_string()).await;
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness
        .reconciler(Arc::clone(&store), short_graces())
        .with_source(Arc::new(
            ExternalRegistryAdapter::new(registry.url(), Duration::from_secs(2))
                .expect("client builds"),
        ));
    let seeded = reconciler.run_cycle().await;
    registry.respond(503, "maintenance").await;

    let mut statuses = Vec::new();
    let mut removed = 0;
    for _day in 0..5 {
        harness.clock.advance(TimeDelta::days(1));
        let report = reconciler.run_cycle().await;
        assert_eq!(report.unavailable_sources(), 1);
        removed += report.removed;
        statuses.push(all_services(&store).await.first().map(RegisteredService::status));
    }

    assert_eq!(seeded.created, 1);
    assert_eq!(statuses.first(), Some(&Some(ServiceStatus::Stale)));
    assert_eq!(removed, 1);
    assert!(all_services(&store).await.is_empty());
}
