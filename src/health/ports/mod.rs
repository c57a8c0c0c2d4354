//! Port contract for health probing.

use crate::discovery::domain::ServiceCandidate;
use crate::health::domain::HealthProbeResult;
use async_trait::async_trait;

/// Liveness check for one candidate.
///
/// Implementations never return an error: timeouts, refused connections,
/// and bad answers are all encoded in the result's outcome.
#[async_trait]
pub trait HealthProber: Send + Sync {
    /// Probes `candidate` and reports what happened.
    async fn probe(&self, candidate: &ServiceCandidate) -> HealthProbeResult;
}
