//! Composite prober selecting HTTP or TCP from the candidate's shape.

use super::{HttpProber, ProbeVerdict, TcpProber};
use crate::discovery::domain::ServiceCandidate;
use crate::health::{
    domain::{
        HealthProbeResult, HealthUrlTemplate, PROBE_DEADLINE_EXCEEDED, ProbeOutcome, ProbeTarget,
    },
    ports::HealthProber,
};
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Hard ceiling on one probe, all retries included.
pub const DEFAULT_PROBE_DEADLINE: Duration = Duration::from_secs(5);

/// [`HealthProber`] over real sockets.
#[derive(Debug, Clone)]
pub struct NetworkProber<C>
where
    C: Clock + Send + Sync,
{
    http: HttpProber,
    tcp: TcpProber,
    template: HealthUrlTemplate,
    deadline: Duration,
    clock: Arc<C>,
}

impl<C> NetworkProber<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a prober with the default URL template and deadline.
    #[must_use]
    pub fn new(http: HttpProber, tcp: TcpProber, clock: Arc<C>) -> Self {
        Self {
            http,
            tcp,
            template: HealthUrlTemplate::default(),
            deadline: DEFAULT_PROBE_DEADLINE,
            clock,
        }
    }

    /// Sets the template used to guess HTTP endpoints.
    #[must_use]
    pub fn with_template(mut self, template: HealthUrlTemplate) -> Self {
        self.template = template;
        self
    }

    /// Sets the per-probe deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    async fn run(&self, target: &ProbeTarget) -> ProbeVerdict {
        match target {
            ProbeTarget::Http { url } => self.http.check(url).await,
            ProbeTarget::Tcp { host, port } => self.tcp.check(host, *port).await,
            ProbeTarget::Skip => ProbeVerdict {
                outcome: ProbeOutcome::Skipped,
                error: None,
            },
        }
    }
}

#[async_trait]
impl<C> HealthProber for NetworkProber<C>
where
    C: Clock + Send + Sync,
{
    async fn probe(&self, candidate: &ServiceCandidate) -> HealthProbeResult {
        let probed_at = self.clock.utc();
        let target = ProbeTarget::for_candidate(candidate, &self.template);
        let Some(method) = target.method() else {
            debug!(service = candidate.name(), "no probe strategy, skipping");
            return HealthProbeResult::skipped(candidate.location(), probed_at);
        };

        let started = Instant::now();
        let verdict = tokio::time::timeout(self.deadline, self.run(&target))
            .await
            .unwrap_or_else(|_elapsed| {
                ProbeVerdict::failed(ProbeOutcome::Unreachable, PROBE_DEADLINE_EXCEEDED)
            });
        let elapsed = started.elapsed();
        debug!(
            service = candidate.name(),
            target = %target.describe(),
            %method,
            outcome = %verdict.outcome,
            latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "probe finished"
        );

        let result = HealthProbeResult::new(target.describe(), method, verdict.outcome, probed_at)
            .with_latency(elapsed);
        match verdict.error {
            Some(error) => result.with_error(error),
            None => result,
        }
    }
}
