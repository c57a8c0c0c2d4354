//! Provenance of services reported by more than one source.

use super::helpers::{Harness, harness, only_service};
use crate::test_helpers::{Endpoint, closed_port};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vauban::discovery::adapters::ExternalRegistryAdapter;
use vauban::discovery::domain::CandidateSource;
use vauban::reconcile::services::ReconcileSettings;
use vauban::registry::domain::{MetadataEntry, RegistrationSource};
use vauban::registry::services::StoreSettings;

#[rstest]
#[tokio::test]
async fn same_cycle_overlap_is_merged_and_keeps_key_sources(harness: Harness) {
    let port = closed_port().await.expect("closed port");
    let manifest = |description: &str| {
        json!({ "name": "billing-service", "version": "1.0", "description": description })
    };
    let location = harness
        .workspace
        .node_service_with("billing", &manifest("old"), port)
        .expect("manifest written");
    let listing = json!({
        "services": [{
            "name": "billing-service",
            "location": location.as_str(),
            "metadata": { "version": "1.2" },
        }]
    });
    let mut registry = Endpoint::spawn("/services", 200, &listing.to_string()).await;
    let store = harness.store(StoreSettings::default()).await;
    let reconciler = harness
        .reconciler(Arc::clone(&store), ReconcileSettings::default())
        .with_source(Arc::new(
            ExternalRegistryAdapter::new(registry.url(), Duration::from_secs(2))
                .expect("client builds"),
        ));

    let first = reconciler.run_cycle().await;
    let merged = only_service(&store).await;
    registry.respond(503, "maintenance").await;
    harness
        .workspace
        .node_service_with("billing", &manifest("new"), port)
        .expect("manifest rewritten");
    let second = reconciler.run_cycle().await;
    let updated = only_service(&store).await;

    assert_eq!(first.created, 1);
    assert_eq!(merged.source(), RegistrationSource::Merged);
    assert_eq!(merged.metadata().get("version"), Some("1.2"));
    assert_eq!(
        merged.metadata().entry("version").map(MetadataEntry::source),
        Some(CandidateSource::External)
    );
    assert_eq!(
        merged.metadata().entry("description").map(MetadataEntry::source),
        Some(CandidateSource::Manifest)
    );
    assert_eq!(second.unavailable_sources(), 1);
    assert_eq!(updated.metadata().get("description"), Some("new"));
    assert_eq!(updated.metadata().get("version"), Some("1.2"));
    assert_eq!(updated.source(), RegistrationSource::Merged);
}
