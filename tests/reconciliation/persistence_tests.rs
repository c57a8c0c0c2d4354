//! Reloading persisted registrations and retrying failed writes.

use super::helpers::{Harness, harness, only_service, open_store};
use crate::test_helpers::Endpoint;
use camino::Utf8PathBuf;
use rstest::rstest;
use std::sync::Arc;
use vauban::reconcile::domain::CycleError;
use vauban::reconcile::services::ReconcileSettings;
use vauban::registry::adapters::JsonFilePersistence;
use vauban::registry::domain::ServiceStatus;
use vauban::registry::services::StoreSettings;

#[rstest]
#[tokio::test]
async fn reopened_store_starts_every_service_unknown(harness: Harness) {
    let endpoint = Endpoint::healthy().await;
    harness
        .workspace
        .node_service("billing", "billing-service", "1.0", endpoint.port())
        .expect("manifest written");
    let state = tempfile::tempdir().expect("state dir");
    let state_dir = Utf8PathBuf::from_path_buf(state.path().to_path_buf()).expect("utf-8 path");
    let persistence = Arc::new(JsonFilePersistence::open(&state_dir).expect("state opens"));
    let store = open_store(persistence, &harness.clock, StoreSettings::default()).await;
    harness
        .reconciler(Arc::clone(&store), ReconcileSettings::default())
        .run_cycle()
        .await;
    let before = only_service(&store).await;

    let reopened = open_store(
        Arc::new(JsonFilePersistence::open(&state_dir).expect("state reopens")),
        &harness.clock,
        StoreSettings::default(),
    )
    .await;
    let after = only_service(&reopened).await;

    assert_eq!(before.status(), ServiceStatus::Healthy);
    assert_eq!(after.id(), before.id());
    assert_eq!(after.status(), ServiceStatus::Unknown);
    assert_eq!(after.consecutive_failures(), 0);
    assert_eq!(after.metadata().get("version"), Some("1.0"));
}

#[rstest]
#[tokio::test]
async fn failed_writes_stay_readable_and_are_retried(harness: Harness) {
    let endpoint = Endpoint::healthy().await;
    harness
        .workspace
        .node_service("billing", "billing-service", "1.0", endpoint.port())
        .expect("manifest written");
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness.reconciler(Arc::clone(&store), ReconcileSettings::default());
    harness.persistence.fail_writes(true);

    let failing = reconciler.run_cycle().await;
    let readable = only_service(&store).await;
    harness.persistence.fail_writes(false);
    let recovered = reconciler.run_cycle().await;

    assert!(
        failing
            .errors
            .iter()
            .any(|error| matches!(error, CycleError::StoreWrite { .. }))
    );
    assert_eq!(readable.status(), ServiceStatus::Healthy);
    assert!(recovered.errors.is_empty());
    assert_eq!(store.pending_writes().await, 0);
    assert!(
        harness
            .persistence
            .stored(readable.id())
            .expect("persistence readable")
            .is_some()
    );
}

#[rstest]
#[tokio::test]
async fn corrupt_document_does_not_prevent_startup(harness: Harness) {
    let endpoint = Endpoint::healthy().await;
    harness
        .workspace
        .node_service("billing", "billing-service", "1.0", endpoint.port())
        .expect("manifest written");
    let state = tempfile::tempdir().expect("state dir");
    let state_dir = Utf8PathBuf::from_path_buf(state.path().to_path_buf()).expect("utf-8 path");
    let store = open_store(
        Arc::new(JsonFilePersistence::open(&state_dir).expect("state opens")),
        &harness.clock,
        StoreSettings::default(),
    )
    .await;
    harness
        .reconciler(Arc::clone(&store), ReconcileSettings::default())
        .run_cycle()
        .await;
    let saved = only_service(&store).await;
    std::fs::write(state.path().join("deadbeef.json"), "{ nope").expect("corrupt document");

    let reopened = open_store(
        Arc::new(JsonFilePersistence::open(&state_dir).expect("state reopens")),
        &harness.clock,
        StoreSettings::default(),
    )
    .await;

    assert_eq!(only_service(&reopened).await.id(), saved.id());
}
