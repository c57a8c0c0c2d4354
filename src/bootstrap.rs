//! Wiring of a [`RegistryConfig`] into a running registry.

use crate::config::{ConfigError, RegistryConfig};
use crate::discovery::adapters::{ContainerDiscovery, DockerCli, ExternalRegistryAdapter};
use crate::discovery::domain::DiscoveryError;
use crate::discovery::ports::DiscoverySource;
use crate::health::adapters::{HttpProber, NetworkProber, TcpProber};
use crate::reconcile::services::{Reconciler, spawn_periodic};
use crate::registry::adapters::{InMemoryPersistence, JsonFilePersistence};
use crate::registry::domain::{RegisteredService, ServiceId};
use crate::registry::ports::{RegistryPersistence, RegistryPersistenceError, RegistryPersistenceResult};
use crate::registry::services::RegistryStore;
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Errors raised while assembling a registry.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persisted registrations could not be opened or loaded.
    #[error("failed to open registry persistence: {0}")]
    Persistence(#[from] RegistryPersistenceError),

    /// A discovery source could not be constructed.
    #[error("failed to build discovery source: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The HTTP client for probing could not be constructed.
    #[error("failed to build probe client: {0}")]
    ProbeClient(#[from] reqwest::Error),
}

/// Persistence selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredPersistence {
    /// Nothing survives a restart.
    Memory(InMemoryPersistence),
    /// One JSON document per service in a directory.
    JsonFile(JsonFilePersistence),
}

#[async_trait]
impl RegistryPersistence for ConfiguredPersistence {
    async fn load_all(&self) -> RegistryPersistenceResult<Vec<RegisteredService>> {
        match self {
            Self::Memory(inner) => inner.load_all().await,
            Self::JsonFile(inner) => inner.load_all().await,
        }
    }

    async fn save(&self, service: &RegisteredService) -> RegistryPersistenceResult<()> {
        match self {
            Self::Memory(inner) => inner.save(service).await,
            Self::JsonFile(inner) => inner.save(service).await,
        }
    }

    async fn delete(&self, service_id: &ServiceId) -> RegistryPersistenceResult<()> {
        match self {
            Self::Memory(inner) => inner.delete(service_id).await,
            Self::JsonFile(inner) => inner.delete(service_id).await,
        }
    }
}

/// Store type produced by [`build`].
pub type ConfiguredStore<C> = RegistryStore<ConfiguredPersistence, C>;

/// Reconciler type produced by [`build`].
pub type ConfiguredReconciler<C> = Reconciler<ConfiguredPersistence, NetworkProber<C>, C>;

/// An assembled registry: the store API consumers read from and the
/// reconciler that keeps it current.
#[derive(Debug)]
pub struct RegistryRuntime<C>
where
    C: Clock + Send + Sync + 'static,
{
    store: Arc<ConfiguredStore<C>>,
    reconciler: Arc<ConfiguredReconciler<C>>,
    interval: Duration,
}

impl<C> RegistryRuntime<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &Arc<ConfiguredStore<C>> {
        &self.store
    }

    /// Returns the reconciler, for operator triggers.
    #[must_use]
    pub const fn reconciler(&self) -> &Arc<ConfiguredReconciler<C>> {
        &self.reconciler
    }

    /// Starts periodic reconciliation at the configured interval.
    #[must_use]
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        spawn_periodic(Arc::clone(&self.reconciler), self.interval, cancel)
    }
}

/// Validates `config` and assembles a registry from it.
///
/// Sources whose section is absent (or, for manifests, with no roots) are
/// left out. Persisted registrations are loaded with unknown status.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the configuration is invalid or a
/// component cannot be constructed.
pub async fn build<C>(
    config: &RegistryConfig,
    clock: Arc<C>,
) -> Result<RegistryRuntime<C>, BootstrapError>
where
    C: Clock + Send + Sync + 'static,
{
    config.validate()?;

    let persistence = match &config.registry.persistence_dir {
        Some(dir) => ConfiguredPersistence::JsonFile(JsonFilePersistence::open(dir)?),
        None => ConfiguredPersistence::Memory(InMemoryPersistence::new()),
    };
    let store = Arc::new(
        RegistryStore::open(
            Arc::new(persistence),
            Arc::clone(&clock),
            config.registry.settings(),
        )
        .await?,
    );

    let prober = NetworkProber::new(
        HttpProber::new(config.probe.http_settings())?,
        TcpProber::new(config.probe.timeout()),
        Arc::clone(&clock),
    )
    .with_template(config.probe.template()?)
    .with_deadline(config.probe.deadline());

    let reconciler = sources(config)?.into_iter().fold(
        Reconciler::new(
            Arc::clone(&store),
            Arc::new(prober),
            clock,
            config.reconcile_settings(),
        ),
        Reconciler::with_source,
    );
    info!(
        sources = ?reconciler.sources(),
        persistent = config.registry.persistence_dir.is_some(),
        "registry assembled"
    );

    Ok(RegistryRuntime {
        store,
        reconciler: Arc::new(reconciler),
        interval: config.reconcile.interval(),
    })
}

fn sources(config: &RegistryConfig) -> Result<Vec<Arc<dyn DiscoverySource>>, BootstrapError> {
    let mut sources: Vec<Arc<dyn DiscoverySource>> = Vec::new();
    if let Some(scanner) = config.scan.scanner() {
        sources.push(Arc::new(scanner));
    }
    if let Some(container) = &config.container {
        let cli = container
            .endpoint
            .iter()
            .fold(DockerCli::new(&container.binary), |cli, endpoint| {
                cli.with_endpoint(endpoint)
            });
        sources.push(Arc::new(
            ContainerDiscovery::new(cli).with_health_path(&container.health_path),
        ));
    }
    if let Some(external) = &config.external {
        sources.push(Arc::new(ExternalRegistryAdapter::new(
            &external.url,
            external.timeout(),
        )?));
    }
    Ok(sources)
}
