//! Shared harness for reconciliation integration tests.

use crate::test_helpers::Workspace;
use rstest::fixture;
use std::sync::Arc;
use std::time::Duration;
use vauban::clock::ManualClock;
use vauban::discovery::adapters::ManifestScanner;
use vauban::health::adapters::{HttpProbeSettings, HttpProber, NetworkProber, TcpProber};
use vauban::reconcile::services::{ReconcileSettings, Reconciler};
use vauban::registry::adapters::InMemoryPersistence;
use vauban::registry::domain::{RegisteredService, ServiceFilter};
use vauban::registry::ports::RegistryPersistence;
use vauban::registry::services::{RegistryStore, StoreSettings};

/// Reconciler over the real scanner and network prober.
pub type TestReconciler<P> = Reconciler<P, NetworkProber<ManualClock>, ManualClock>;

/// Probe settings that fail fast against closed ports.
pub fn fast_probe_settings() -> HttpProbeSettings {
    HttpProbeSettings {
        timeout: Duration::from_millis(500),
        retries: 0,
        ..HttpProbeSettings::default()
    }
}

/// Builds a network prober with no retries.
///
/// # Panics
///
/// Panics when the HTTP client cannot be built.
pub fn prober(clock: &Arc<ManualClock>) -> NetworkProber<ManualClock> {
    NetworkProber::new(
        HttpProber::new(fast_probe_settings()).expect("client builds"),
        TcpProber::new(Duration::from_millis(500)),
        Arc::clone(clock),
    )
}

/// Scan root, clock, and in-memory persistence shared by a test.
pub struct Harness {
    /// Scan root.
    pub workspace: Workspace,
    /// Clock driving staleness.
    pub clock: Arc<ManualClock>,
    /// Persistence behind the store.
    pub persistence: Arc<InMemoryPersistence>,
}

impl Harness {
    /// Opens a store over the harness persistence.
    ///
    /// # Panics
    ///
    /// Panics when the store cannot load persisted state.
    pub async fn store(
        &self,
        settings: StoreSettings,
    ) -> Arc<RegistryStore<InMemoryPersistence, ManualClock>> {
        open_store(Arc::clone(&self.persistence), &self.clock, settings).await
    }

    /// Builds a reconciler scanning the harness workspace.
    pub fn reconciler<P>(
        &self,
        store: Arc<RegistryStore<P, ManualClock>>,
        settings: ReconcileSettings,
    ) -> TestReconciler<P>
    where
        P: RegistryPersistence,
    {
        Reconciler::new(
            store,
            Arc::new(prober(&self.clock)),
            Arc::clone(&self.clock),
            settings,
        )
        .with_source(Arc::new(ManifestScanner::new([self.workspace.root().to_owned()])))
    }
}

/// Opens a store over `persistence`.
///
/// # Panics
///
/// Panics when the store cannot load persisted state.
pub async fn open_store<P>(
    persistence: Arc<P>,
    clock: &Arc<ManualClock>,
    settings: StoreSettings,
) -> Arc<RegistryStore<P, ManualClock>>
where
    P: RegistryPersistence,
{
    Arc::new(
        RegistryStore::open(persistence, Arc::clone(clock), settings)
            .await
            .expect("store opens"),
    )
}

/// Fresh harness with an empty workspace.
///
/// # Panics
///
/// Panics when the scratch directory cannot be created.
#[fixture]
pub fn harness() -> Harness {
    Harness {
        workspace: Workspace::new().expect("scratch workspace"),
        clock: Arc::new(ManualClock::starting_now()),
        persistence: Arc::new(InMemoryPersistence::new()),
    }
}

/// Returns every registration, ordered by id.
pub async fn all_services<P>(store: &RegistryStore<P, ManualClock>) -> Vec<RegisteredService>
where
    P: RegistryPersistence,
{
    store.list(&ServiceFilter::all()).await
}

/// Returns the only registration.
///
/// # Panics
///
/// Panics unless exactly one service is registered.
pub async fn only_service<P>(store: &RegistryStore<P, ManualClock>) -> RegisteredService
where
    P: RegistryPersistence,
{
    let mut services = all_services(store).await;
    assert_eq!(services.len(), 1, "expected exactly one service");
    services.pop().expect("one service")
}
