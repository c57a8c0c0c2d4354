//! Reconciliation cycles: gather, de-duplicate, probe, merge, age.

use crate::discovery::domain::{CandidateSource, DiscoveryError, ServiceCandidate};
use crate::discovery::ports::DiscoverySource;
use crate::health::adapters::DEFAULT_PROBE_DEADLINE;
use crate::health::domain::HealthProbeResult;
use crate::health::ports::HealthProber;
use crate::reconcile::domain::{CycleError, CycleId, CycleReport, CycleStatus, deduplicate};
use crate::registry::domain::{RegisteredService, ServiceFilter, ServiceId, ServiceStatus};
use crate::registry::ports::RegistryPersistence;
use crate::registry::services::RegistryStore;
use chrono::TimeDelta;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default size of the probe pool.
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 8;

/// Longest budget a single cycle may be given.
const MAX_CYCLE_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing and concurrency limits for reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Upper bound on one discovery source.
    pub source_timeout: Duration,
    /// Upper bound on the whole cycle.
    pub cycle_deadline: Duration,
    /// Upper bound on one probe, retries included.
    pub probe_deadline: Duration,
    /// Probes in flight at once.
    pub max_concurrent_probes: usize,
    /// Time unobserved before a service turns stale.
    pub stale_grace: Duration,
    /// Time unobserved before a stale service is removed.
    pub removal_grace: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(10),
            cycle_deadline: Duration::from_secs(60),
            probe_deadline: DEFAULT_PROBE_DEADLINE,
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
            stale_grace: Duration::from_secs(5 * 60),
            removal_grace: Duration::from_secs(30 * 60),
        }
    }
}

struct Gathered {
    candidates: Vec<ServiceCandidate>,
    failed_sources: Vec<CandidateSource>,
    errors: Vec<CycleError>,
}

/// Drives reconciliation cycles against one [`RegistryStore`].
///
/// At most one cycle runs at a time; overlapping triggers return a
/// skipped report instead of queueing.
pub struct Reconciler<P, H, C>
where
    P: RegistryPersistence,
    H: HealthProber,
    C: Clock + Send + Sync,
{
    store: Arc<RegistryStore<P, C>>,
    sources: Vec<Arc<dyn DiscoverySource>>,
    prober: Arc<H>,
    clock: Arc<C>,
    settings: ReconcileSettings,
    guard: Mutex<()>,
}

impl<P, H, C> Reconciler<P, H, C>
where
    P: RegistryPersistence,
    H: HealthProber,
    C: Clock + Send + Sync,
{
    /// Creates a reconciler with no discovery sources.
    #[must_use]
    pub fn new(
        store: Arc<RegistryStore<P, C>>,
        prober: Arc<H>,
        clock: Arc<C>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            sources: Vec::new(),
            prober,
            clock,
            settings,
            guard: Mutex::new(()),
        }
    }

    /// Adds a discovery source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DiscoverySource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Returns the store being reconciled.
    #[must_use]
    pub const fn store(&self) -> &Arc<RegistryStore<P, C>> {
        &self.store
    }

    /// Returns the configured limits.
    #[must_use]
    pub const fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Returns the enabled sources in registration order.
    #[must_use]
    pub fn sources(&self) -> Vec<CandidateSource> {
        self.sources.iter().map(|source| source.source()).collect()
    }

    /// Runs one cycle with no external cancellation.
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_with(&CancellationToken::new()).await
    }

    /// Operator entry point; identical to [`Self::run_cycle`].
    pub async fn trigger(&self) -> CycleReport {
        self.run_cycle().await
    }

    /// Runs one cycle, stopping early when `cancel` fires.
    ///
    /// Always returns a report. A cancelled or overrun cycle is `partial`
    /// and keeps whatever it merged; a cycle started while another runs is
    /// `skipped`.
    pub async fn run_cycle_with(&self, cancel: &CancellationToken) -> CycleReport {
        let cycle_id = CycleId::new();
        let Ok(_running) = self.guard.try_lock() else {
            info!(%cycle_id, "reconciliation already running, trigger coalesced");
            return CycleReport::skipped(cycle_id, self.clock.utc());
        };
        self.execute(cycle_id, cancel).await
    }

    #[instrument(name = "reconcile_cycle", skip_all, fields(cycle_id = %cycle_id))]
    async fn execute(&self, cycle_id: CycleId, cancel: &CancellationToken) -> CycleReport {
        let deadline = Instant::now() + self.settings.cycle_deadline.min(MAX_CYCLE_BUDGET);
        let mut report = CycleReport::new(cycle_id, self.clock.utc());

        for failure in self.store.retry_pending_writes().await {
            report.record_write_failure(failure.service_id, failure.error);
        }

        let gathered = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            gathered = self.gather(deadline) => Some(gathered),
        };
        let Some(gathered) = gathered else {
            warn!("cycle cancelled while gathering candidates");
            return self.finish(report, CycleStatus::Partial);
        };
        report.errors.extend(gathered.errors);

        let candidates = deduplicate(gathered.candidates);
        debug!(candidates = candidates.len(), "candidates de-duplicated");

        let mut observed = BTreeSet::new();
        let status = self
            .probe_and_merge(candidates, deadline, cancel, &mut report, &mut observed)
            .await;
        if status == CycleStatus::Completed {
            self.age_unobserved(&observed, &gathered.failed_sources, &mut report)
                .await;
        }
        self.finish(report, status)
    }

    async fn gather(&self, deadline: Instant) -> Gathered {
        let budget = self.settings.source_timeout.min(remaining(deadline));
        let runs = self.sources.iter().map(|source| async move {
            let origin = source.source();
            (origin, tokio::time::timeout(budget, source.discover()).await)
        });

        let mut gathered = Gathered {
            candidates: Vec::new(),
            failed_sources: Vec::new(),
            errors: Vec::new(),
        };
        for (origin, result) in join_all(runs).await {
            let reason = match result {
                Ok(Ok(discovery)) => {
                    debug!(
                        source = %origin,
                        candidates = discovery.candidates.len(),
                        issues = discovery.issues.len(),
                        "source gathered"
                    );
                    gathered.candidates.extend(discovery.candidates);
                    gathered.errors.extend(
                        discovery
                            .issues
                            .into_iter()
                            .map(|issue| CycleError::Scan { origin, issue }),
                    );
                    continue;
                }
                Ok(Err(err)) => err.to_string(),
                Err(_elapsed) => DiscoveryError::Timeout(budget).to_string(),
            };
            warn!(source = %origin, %reason, "discovery source unavailable");
            gathered.failed_sources.push(origin);
            gathered
                .errors
                .push(CycleError::SourceUnavailable { origin, reason });
        }
        gathered
    }

    async fn probe_and_merge(
        &self,
        candidates: Vec<ServiceCandidate>,
        deadline: Instant,
        cancel: &CancellationToken,
        report: &mut CycleReport,
        observed: &mut BTreeSet<ServiceId>,
    ) -> CycleStatus {
        let probe_deadline = self.settings.probe_deadline;
        let prober = &self.prober;
        let clock = &self.clock;
        let mut probes = stream::iter(candidates)
            .map(|candidate| async move {
                let budget = probe_deadline.min(remaining(deadline));
                let result = tokio::time::timeout(budget, prober.probe(&candidate))
                    .await
                    .unwrap_or_else(|_elapsed| {
                        HealthProbeResult::deadline_exceeded(candidate.location(), clock.utc())
                    });
                (candidate, result)
            })
            .buffer_unordered(self.settings.max_concurrent_probes.max(1));

        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(merged = report.probed, "cycle cancelled, dropping in-flight probes");
                    return CycleStatus::Partial;
                }
                () = &mut expiry => {
                    warn!(merged = report.probed, "cycle deadline elapsed, dropping in-flight probes");
                    return CycleStatus::Partial;
                }
                next = probes.next() => {
                    let Some((candidate, result)) = next else {
                        return CycleStatus::Completed;
                    };
                    let outcome = self
                        .store
                        .upsert(&candidate, &result, Some(report.cycle_id))
                        .await;
                    observed.insert(outcome.service.id().clone());
                    report.record_upsert(&outcome);
                }
            }
        }
    }

    /// Ages every service not observed this cycle by its `last_seen_at`.
    ///
    /// A service whose contributing source failed this cycle gets one extra
    /// `stale_grace` of tolerance, so a brief outage does not stale it but a
    /// source that stays down still lets it age out.
    async fn age_unobserved(
        &self,
        observed: &BTreeSet<ServiceId>,
        failed_sources: &[CandidateSource],
        report: &mut CycleReport,
    ) {
        let now = self.clock.utc();
        for service in self.store.list(&ServiceFilter::all()).await {
            if observed.contains(service.id()) {
                continue;
            }
            let unseen = now.signed_duration_since(service.last_seen_at());
            let tolerance = if failed_sources
                .iter()
                .any(|source| service.observed_by(*source))
            {
                to_delta(self.settings.stale_grace)
            } else {
                TimeDelta::zero()
            };
            let unseen = unseen.checked_sub(&tolerance).unwrap_or(TimeDelta::MIN);
            self.age(&service, unseen, report).await;
        }
    }

    async fn age(&self, service: &RegisteredService, unseen: TimeDelta, report: &mut CycleReport) {
        let cycle_id = Some(report.cycle_id);

        if service.status() == ServiceStatus::Stale {
            if unseen < to_delta(self.settings.removal_grace) {
                return;
            }
            if let Some(outcome) = self.store.remove(service.id(), cycle_id).await {
                report.removed += 1;
                if let Some(error) = outcome.write_error {
                    report.record_write_failure(service.id().clone(), error);
                }
            }
        } else if unseen >= to_delta(self.settings.stale_grace) {
            if let Some(outcome) = self.store.mark_stale(service.id(), cycle_id).await {
                if outcome.changed {
                    report.marked_stale += 1;
                }
                if let Some(error) = outcome.write_error {
                    report.record_write_failure(service.id().clone(), error);
                }
            }
        }
    }

    fn finish(&self, mut report: CycleReport, status: CycleStatus) -> CycleReport {
        report.status = status;
        report.finished_at = self.clock.utc();
        info!(
            status = %report.status,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            marked_stale = report.marked_stale,
            removed = report.removed,
            probed = report.probed,
            unavailable_sources = report.unavailable_sources(),
            errors = report.errors.len(),
            "reconciliation cycle finished"
        );
        report
    }
}

impl<P, H, C> std::fmt::Debug for Reconciler<P, H, C>
where
    P: RegistryPersistence,
    H: HealthProber,
    C: Clock + Send + Sync,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Reconciler")
            .field("sources", &self.sources())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
