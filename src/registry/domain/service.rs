//! Registered service aggregate root.

use super::{RegistrationSource, ServiceId, ServiceMetadata, ServiceStatus};
use crate::discovery::domain::{CandidateSource, ServiceCandidate, ServiceKind};
use crate::health::domain::{HealthProbeResult, ProbeOutcome};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// What an observation changed on an existing registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Any material field changed.
    pub changed: bool,
    /// Status before the observation.
    pub previous_status: ServiceStatus,
}

impl Observation {
    /// Returns whether the status moved.
    #[must_use]
    pub fn status_changed(&self, service: &RegisteredService) -> bool {
        self.previous_status != service.status()
    }
}

/// Canonical, persisted record of a discovered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredService {
    id: ServiceId,
    name: String,
    kind: ServiceKind,
    location: String,
    status: ServiceStatus,
    consecutive_failures: u32,
    health_endpoint: Option<String>,
    port: Option<u16>,
    entrypoint: Option<String>,
    metadata: ServiceMetadata,
    first_seen_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    last_probed_at: Option<DateTime<Utc>>,
    last_probe_error: Option<String>,
    stale_since: Option<DateTime<Utc>>,
    source: RegistrationSource,
}

/// Material fields compared to decide whether an observation changed
/// anything worth publishing.
#[derive(PartialEq, Eq)]
struct Fingerprint {
    status: ServiceStatus,
    consecutive_failures: u32,
    kind: ServiceKind,
    health_endpoint: Option<String>,
    port: Option<u16>,
    entrypoint: Option<String>,
    source: RegistrationSource,
}

impl RegisteredService {
    /// Registers a candidate seen for the first time.
    #[must_use]
    pub fn register(
        candidate: &ServiceCandidate,
        probe: &HealthProbeResult,
        failure_threshold: u32,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.utc();
        let mut service = Self {
            id: ServiceId::derive(candidate.name(), candidate.location()),
            name: candidate.name().to_owned(),
            kind: candidate.kind().clone(),
            location: candidate.location().to_owned(),
            status: ServiceStatus::Unknown,
            consecutive_failures: 0,
            health_endpoint: None,
            port: None,
            entrypoint: None,
            metadata: ServiceMetadata::new(),
            first_seen_at: now,
            last_seen_at: now,
            last_probed_at: None,
            last_probe_error: None,
            stale_since: None,
            source: RegistrationSource::from(candidate.source()),
        };
        service.record_contributors(candidate);
        service.absorb(candidate, now);
        service.apply_probe(probe, failure_threshold);
        service
    }

    /// Applies a fresh observation and probe result.
    pub fn observe(
        &mut self,
        candidate: &ServiceCandidate,
        probe: &HealthProbeResult,
        failure_threshold: u32,
        clock: &impl Clock,
    ) -> Observation {
        let now = clock.utc();
        let previous_status = self.status;
        let before = self.fingerprint();

        let metadata_changed = self.absorb(candidate, now);
        self.record_contributors(candidate);
        self.last_seen_at = now;
        self.stale_since = None;
        self.apply_probe(probe, failure_threshold);

        Observation {
            changed: metadata_changed || before != self.fingerprint(),
            previous_status,
        }
    }

    /// Marks the service stale; returns `false` when it already was.
    pub fn mark_stale(&mut self, clock: &impl Clock) -> bool {
        if self.status == ServiceStatus::Stale {
            return false;
        }
        self.status = ServiceStatus::Stale;
        self.stale_since = Some(clock.utc());
        true
    }

    /// Resets probe-derived state after loading from persistence.
    ///
    /// Nothing is known about liveness until the next probe.
    pub const fn reset_for_restart(&mut self) {
        self.status = ServiceStatus::Unknown;
        self.consecutive_failures = 0;
    }

    fn absorb(&mut self, candidate: &ServiceCandidate, now: DateTime<Utc>) -> bool {
        if *candidate.kind() != ServiceKind::Unknown {
            self.kind = candidate.kind().clone();
        }
        if let Some(url) = candidate.health_endpoint() {
            self.health_endpoint = Some(url.to_owned());
        }
        if let Some(port) = candidate.port() {
            self.port = Some(port);
        }
        if let Some(entrypoint) = candidate.entrypoint() {
            self.entrypoint = Some(entrypoint.to_owned());
        }
        self.metadata
            .merge_sourced(candidate.metadata_with_sources(), now)
    }

    fn record_contributors(&mut self, candidate: &ServiceCandidate) {
        self.source = candidate
            .contributors()
            .fold(self.source, RegistrationSource::observed_by);
    }

    fn apply_probe(&mut self, probe: &HealthProbeResult, failure_threshold: u32) {
        let outcome = probe.outcome();
        match outcome {
            ProbeOutcome::Healthy => {
                self.consecutive_failures = 0;
                self.last_probe_error = None;
            }
            ProbeOutcome::Unhealthy | ProbeOutcome::Unreachable => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_probe_error = probe.error().map(str::to_owned);
            }
            ProbeOutcome::Skipped => {}
        }
        if outcome != ProbeOutcome::Skipped {
            self.last_probed_at = Some(probe.probed_at());
        }
        self.status = self
            .status
            .after_probe(outcome, self.consecutive_failures, failure_threshold);
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            status: self.status,
            consecutive_failures: self.consecutive_failures,
            kind: self.kind.clone(),
            health_endpoint: self.health_endpoint.clone(),
            port: self.port,
            entrypoint: self.entrypoint.clone(),
            source: self.source,
        }
    }

    /// Returns whether `source` has observed this service.
    #[must_use]
    pub const fn observed_by(&self, source: CandidateSource) -> bool {
        self.source.includes(source)
    }

    /// Returns the identifier.
    #[must_use]
    pub const fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service type.
    #[must_use]
    pub const fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    /// Returns the location.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Returns the number of failed probes in a row.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Returns the health endpoint when known.
    #[must_use]
    pub fn health_endpoint(&self) -> Option<&str> {
        self.health_endpoint.as_deref()
    }

    /// Returns the port when known.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the entrypoint when known.
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Returns the merged metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ServiceMetadata {
        &self.metadata
    }

    /// Returns when the service was first registered.
    #[must_use]
    pub const fn first_seen_at(&self) -> DateTime<Utc> {
        self.first_seen_at
    }

    /// Returns when a source last observed the service.
    #[must_use]
    pub const fn last_seen_at(&self) -> DateTime<Utc> {
        self.last_seen_at
    }

    /// Returns when the service was last actually probed.
    #[must_use]
    pub const fn last_probed_at(&self) -> Option<DateTime<Utc>> {
        self.last_probed_at
    }

    /// Returns the error of the last failed probe.
    #[must_use]
    pub fn last_probe_error(&self) -> Option<&str> {
        self.last_probe_error.as_deref()
    }

    /// Returns when the service became stale.
    #[must_use]
    pub const fn stale_since(&self) -> Option<DateTime<Utc>> {
        self.stale_since
    }

    /// Returns which sources have observed the service.
    #[must_use]
    pub const fn source(&self) -> RegistrationSource {
        self.source
    }
}
