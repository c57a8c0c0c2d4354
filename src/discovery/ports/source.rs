//! Discovery source port consumed by the reconciler.

use crate::discovery::domain::{CandidateSource, DiscoveryResult, ScanError, ServiceCandidate};
use async_trait::async_trait;

/// Candidates and recoverable issues produced by one source in one cycle.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Candidates found.
    pub candidates: Vec<ServiceCandidate>,
    /// Problems that were skipped over.
    pub issues: Vec<ScanError>,
}

impl Discovery {
    /// Creates a result holding only candidates.
    #[must_use]
    pub const fn from_candidates(candidates: Vec<ServiceCandidate>) -> Self {
        Self {
            candidates,
            issues: Vec::new(),
        }
    }
}

/// A producer of service candidates.
///
/// Implementations must not panic: any failure that prevents producing a
/// candidate list is returned as an error and the reconciler carries on
/// with the other sources.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Identifies the source in reports and aging decisions.
    fn source(&self) -> CandidateSource;

    /// Produces this cycle's candidates.
    async fn discover(&self) -> DiscoveryResult<Discovery>;
}
