//! Stable identity and status transitions across cycles.

use super::helpers::{Harness, harness, only_service};
use crate::test_helpers::{Endpoint, closed_port};
use rstest::rstest;
use std::sync::Arc;
use vauban::reconcile::services::ReconcileSettings;
use vauban::registry::domain::{ServiceId, ServiceStatus};
use vauban::registry::services::StoreSettings;

#[rstest]
#[tokio::test]
async fn repeated_cycles_resolve_to_one_identity(harness: Harness) {
    let port = closed_port().await.expect("closed port");
    let location = harness
        .workspace
        .node_service("billing", "billing-service", "1.0", port)
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(Arc::clone(&store), ReconcileSettings::default());

    let first = reconciler.run_cycle().await;
    let second = reconciler.run_cycle().await;

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    let service = only_service(&store).await;
    assert_eq!(
        service.id(),
        &ServiceId::derive("billing-service", location.as_str())
    );
}

#[rstest]
#[tokio::test]
async fn degradation_is_gradual_and_recovery_immediate(harness: Harness) {
    let port = closed_port().await.expect("closed port");
    harness
        .workspace
        .node_service("billing", "billing-service", "1.0", port)
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(Arc::clone(&store), ReconcileSettings::default());

    let mut observed = Vec::new();
    for _cycle in 0..3 {
        reconciler.run_cycle().await;
        let service = only_service(&store).await;
        observed.push((service.status(), service.consecutive_failures()));
    }
    let _endpoint = Endpoint::bind(port, "/health", 200, "ok").await;
    reconciler.run_cycle().await;
    let recovered = only_service(&store).await;
    observed.push((recovered.status(), recovered.consecutive_failures()));

    assert_eq!(
        observed,
        vec![
            (ServiceStatus::Unhealthy, 1),
            (ServiceStatus::Unhealthy, 2),
            (ServiceStatus::Unreachable, 3),
            (ServiceStatus::Healthy, 0),
        ]
    );
    assert_eq!(recovered.last_probe_error(), None);
}

#[rstest]
#[tokio::test]
async fn one_failed_probe_after_healthy_keeps_the_service(harness: Harness) {
    let mut endpoint = Endpoint::healthy().await;
    harness
        .workspace
        .node_service("billing", "billing-service", "1.0", endpoint.port())
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(Arc::clone(&store), ReconcileSettings::default());
    reconciler.run_cycle().await;

    endpoint.respond(503, "draining").await;
    let report = reconciler.run_cycle().await;

    assert_eq!(report.removed, 0);
    let service = only_service(&store).await;
    assert_eq!(service.status(), ServiceStatus::Unhealthy);
    assert_eq!(service.consecutive_failures(), 1);
}
