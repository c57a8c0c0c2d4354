//! Shared world state for reconciliation BDD scenarios.

use crate::test_helpers::{Endpoint, Workspace};
use camino::Utf8PathBuf;
use eyre::WrapErr;
use rstest::fixture;
use std::sync::Arc;
use tokio::net::TcpListener;
use vauban::bootstrap::{self, RegistryRuntime};
use vauban::clock::ManualClock;
use vauban::config::{ExternalConfig, RegistryConfig};
use vauban::reconcile::domain::CycleReport;
use vauban::registry::domain::{RegisteredService, ServiceFilter};

/// Scenario world for reconciliation behaviour tests.
pub struct ReconcileWorld {
    /// Scan root holding the scenario's manifests.
    pub workspace: Workspace,
    /// Configuration used when the registry is first built.
    pub config: RegistryConfig,
    /// Clock shared by the store and reconciler.
    pub clock: Arc<ManualClock>,
    /// External registry endpoint.
    pub external: Option<Endpoint>,
    /// External registry that accepts connections but never answers.
    pub silent_external: Option<TcpListener>,
    /// Health endpoint of the scenario's service, once it answers.
    pub health: Option<Endpoint>,
    /// Port the scenario's service is configured to listen on.
    pub service_port: Option<u16>,
    /// Directory of the scenario's service.
    pub service_location: Option<Utf8PathBuf>,
    /// Registry assembled on the first cycle.
    pub runtime: Option<RegistryRuntime<ManualClock>>,
    /// Report of the most recent cycle.
    pub last_report: Option<CycleReport>,
}

impl ReconcileWorld {
    /// Creates a world scanning a fresh temporary directory.
    ///
    /// # Panics
    ///
    /// Panics when the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let workspace = Workspace::new().expect("scratch workspace");
        let mut config = RegistryConfig::default();
        config.scan.roots = vec![workspace.root().to_owned()];
        config.probe.retries = 0;
        config.probe.timeout_ms = 500;
        Self {
            workspace,
            config,
            clock: Arc::new(ManualClock::starting_now()),
            external: None,
            silent_external: None,
            health: None,
            service_port: None,
            service_location: None,
            runtime: None,
            last_report: None,
        }
    }

    /// Points the external source at `url`.
    pub fn use_external_url(&mut self, url: String) {
        self.config.external = Some(ExternalConfig {
            url,
            ..ExternalConfig::default()
        });
    }

    /// Returns the external registry endpoint, starting it with an empty
    /// service list when no external source is configured yet.
    pub fn external_endpoint(&mut self) -> Result<&mut Endpoint, eyre::Report> {
        if self.config.external.is_none() {
            let endpoint = run_async(Endpoint::spawn(
                "/services",
                200,
                r#"{"services": []}"#,
            ));
            self.use_external_url(endpoint.url());
            self.external = Some(endpoint);
        }
        self.external
            .as_mut()
            .ok_or_else(|| eyre::eyre!("external registry is not a mock endpoint"))
    }

    /// Runs one cycle, assembling the registry first when needed.
    pub fn run_cycle(&mut self) -> Result<(), eyre::Report> {
        if self.config.external.is_none() {
            self.external_endpoint()?;
        }
        if self.runtime.is_none() {
            let runtime = run_async(bootstrap::build(&self.config, Arc::clone(&self.clock)))
                .wrap_err("assemble registry")?;
            self.runtime = Some(runtime);
        }
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| eyre::eyre!("registry not assembled"))?;
        self.last_report = Some(run_async(runtime.reconciler().run_cycle()));
        Ok(())
    }

    /// Returns the report of the latest cycle.
    pub fn report(&self) -> Result<&CycleReport, eyre::Report> {
        self.last_report
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no cycle has run"))
    }

    /// Looks a registered service up by exact name.
    pub fn service_named(&self, name: &str) -> Result<RegisteredService, eyre::Report> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| eyre::eyre!("registry not assembled"))?;
        run_async(runtime.store().list(&ServiceFilter::all()))
            .into_iter()
            .find(|service| service.name() == name)
            .ok_or_else(|| eyre::eyre!("no service named '{name}' is registered"))
    }
}

impl Default for ReconcileWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ReconcileWorld {
    ReconcileWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
