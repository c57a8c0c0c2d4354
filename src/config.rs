//! Typed configuration for a registry instance.
//!
//! Every section deserializes with `#[serde(default)]`, so a partial
//! document only overrides what it names. Durations are plain
//! millisecond counts. Reading the document from a file or the
//! environment is left to the host.

use crate::discovery::adapters::{DEFAULT_EXCLUDED_DIRS, DEFAULT_MAX_DEPTH, ManifestScanner};
use crate::health::adapters::{DEFAULT_PROBE_DEADLINE, HttpProbeSettings};
use crate::health::domain::{DEFAULT_HEALTH_URL_TEMPLATE, HealthUrlTemplate};
use crate::reconcile::services::{DEFAULT_MAX_CONCURRENT_PROBES, ReconcileSettings};
use crate::registry::domain::DEFAULT_FAILURE_THRESHOLD;
use crate::registry::services::{DEFAULT_CHANNEL_CAPACITY, StoreSettings};
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// A configuration value that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration for {field}: {reason}")]
pub struct ConfigError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::new(field, "must be greater than zero"));
    }
    Ok(())
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Manifest scanning.
    pub scan: ScanConfig,
    /// Container runtime discovery; absent disables it.
    pub container: Option<ContainerConfig>,
    /// External registry sync; absent disables it.
    pub external: Option<ExternalConfig>,
    /// Health probing.
    pub probe: ProbeConfig,
    /// Cycle timing.
    pub reconcile: ReconcileConfig,
    /// Registry storage.
    pub registry: StoreConfig,
}

impl RegistryConfig {
    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan.validate()?;
        if let Some(container) = &self.container {
            container.validate()?;
        }
        if let Some(external) = &self.external {
            external.validate()?;
        }
        self.probe.validate()?;
        self.reconcile.validate()?;
        self.registry.validate()
    }

    /// Returns reconciler limits drawn from the probe and reconcile
    /// sections.
    #[must_use]
    pub const fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            source_timeout: Duration::from_millis(self.reconcile.source_timeout_ms),
            cycle_deadline: Duration::from_millis(self.reconcile.cycle_deadline_ms),
            probe_deadline: Duration::from_millis(self.probe.deadline_ms),
            max_concurrent_probes: self.probe.max_concurrent,
            stale_grace: Duration::from_millis(self.reconcile.stale_grace_ms),
            removal_grace: Duration::from_millis(self.reconcile.removal_grace_ms),
        }
    }
}

/// Filesystem scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Directories to walk; empty disables manifest scanning.
    pub roots: Vec<Utf8PathBuf>,
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
    /// Maximum depth below each root.
    pub max_depth: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            exclude_dirs: DEFAULT_EXCLUDED_DIRS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::new("scan.max_depth", "must be at least 1"));
        }
        if self.exclude_dirs.iter().any(|name| name.contains('/')) {
            return Err(ConfigError::new(
                "scan.exclude_dirs",
                "entries are directory names, not paths",
            ));
        }
        Ok(())
    }

    /// Builds the scanner, or `None` when no roots are configured.
    #[must_use]
    pub fn scanner(&self) -> Option<ManifestScanner> {
        if self.roots.is_empty() {
            return None;
        }
        Some(
            ManifestScanner::new(self.roots.iter().cloned())
                .with_exclude_dirs(self.exclude_dirs.iter().cloned())
                .with_max_depth(self.max_depth),
        )
    }
}

/// Container runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    /// Runtime CLI binary.
    pub binary: String,
    /// Daemon endpoint passed as `--host`; the CLI default when absent.
    pub endpoint: Option<String>,
    /// Health path guessed for containers without a path label.
    pub health_path: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_owned(),
            endpoint: None,
            health_path: "/health".to_owned(),
        }
    }
}

impl ContainerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.trim().is_empty() {
            return Err(ConfigError::new("container.binary", "must not be empty"));
        }
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::new(
                "container.health_path",
                "must start with '/'",
            ));
        }
        Ok(())
    }
}

/// External registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExternalConfig {
    /// Endpoint returning service descriptors.
    pub url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: 5_000,
        }
    }
}

impl ExternalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::new(
                "external.url",
                format!("expected an http(s) URL, got {:?}", self.url),
            ));
        }
        require_positive("external.timeout_ms", self.timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Health probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Template for guessed health URLs; sees `host`, `port`, `path`.
    pub health_url_template: String,
    /// Host used for guessed URLs and TCP probes.
    pub host: String,
    /// Path used for guessed URLs.
    pub path: String,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Additional attempts after a failed request.
    pub retries: u32,
    /// First retry delay.
    pub backoff_initial_ms: u64,
    /// Ceiling on the doubled retry delay.
    pub backoff_max_ms: u64,
    /// Hard ceiling on one probe, retries included.
    pub deadline_ms: u64,
    /// Probes in flight at once.
    pub max_concurrent: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        let http = HttpProbeSettings::default();
        Self {
            health_url_template: DEFAULT_HEALTH_URL_TEMPLATE.to_owned(),
            host: "127.0.0.1".to_owned(),
            path: "/health".to_owned(),
            timeout_ms: duration_ms(http.timeout),
            retries: http.retries,
            backoff_initial_ms: duration_ms(http.backoff_initial),
            backoff_max_ms: duration_ms(http.backoff_max),
            deadline_ms: duration_ms(DEFAULT_PROBE_DEADLINE),
            max_concurrent: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl ProbeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("probe.timeout_ms", self.timeout_ms)?;
        require_positive("probe.deadline_ms", self.deadline_ms)?;
        if self.max_concurrent == 0 {
            return Err(ConfigError::new(
                "probe.max_concurrent",
                "must be at least 1",
            ));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(ConfigError::new(
                "probe.backoff_max_ms",
                "must not be below probe.backoff_initial_ms",
            ));
        }
        self.template().map(|_template| ())
    }

    /// Builds the health URL template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the template does not render to an
    /// HTTP URL.
    pub fn template(&self) -> Result<HealthUrlTemplate, ConfigError> {
        HealthUrlTemplate::new(&self.health_url_template, &self.host, &self.path)
            .map_err(|err| ConfigError::new("probe.health_url_template", err.to_string()))
    }

    /// Returns the HTTP retry policy.
    #[must_use]
    pub const fn http_settings(&self) -> HttpProbeSettings {
        HttpProbeSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            retries: self.retries,
            backoff_initial: Duration::from_millis(self.backoff_initial_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    /// Returns the per-request timeout, also used for TCP connects.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the per-probe deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Reconciliation timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Time between scheduled cycles.
    pub interval_ms: u64,
    /// Upper bound on one discovery source.
    pub source_timeout_ms: u64,
    /// Upper bound on a whole cycle.
    pub cycle_deadline_ms: u64,
    /// Time unobserved before a service turns stale.
    pub stale_grace_ms: u64,
    /// Time unobserved before a stale service is removed.
    pub removal_grace_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let settings = ReconcileSettings::default();
        Self {
            interval_ms: 30_000,
            source_timeout_ms: duration_ms(settings.source_timeout),
            cycle_deadline_ms: duration_ms(settings.cycle_deadline),
            stale_grace_ms: duration_ms(settings.stale_grace),
            removal_grace_ms: duration_ms(settings.removal_grace),
        }
    }
}

impl ReconcileConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("reconcile.interval_ms", self.interval_ms)?;
        require_positive("reconcile.source_timeout_ms", self.source_timeout_ms)?;
        require_positive("reconcile.cycle_deadline_ms", self.cycle_deadline_ms)?;
        require_positive("reconcile.stale_grace_ms", self.stale_grace_ms)?;
        if self.removal_grace_ms <= self.stale_grace_ms {
            return Err(ConfigError::new(
                "reconcile.removal_grace_ms",
                "must be longer than reconcile.stale_grace_ms",
            ));
        }
        Ok(())
    }

    /// Returns the scheduling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Registry storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding one JSON document per service; in-memory only
    /// when absent.
    pub persistence_dir: Option<Utf8PathBuf>,
    /// Consecutive failures before a service is unreachable.
    pub failure_threshold: u32,
    /// Events buffered per change subscriber.
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persistence_dir: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::new(
                "registry.failure_threshold",
                "must be at least 1",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::new(
                "registry.channel_capacity",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the store tunables.
    #[must_use]
    pub const fn settings(&self) -> StoreSettings {
        StoreSettings {
            failure_threshold: self.failure_threshold,
            channel_capacity: self.channel_capacity,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
