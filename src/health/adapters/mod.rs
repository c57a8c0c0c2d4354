//! Network probe adapters.

mod http;
mod network;
mod tcp;

pub use http::{HttpProbeSettings, HttpProber};
pub use network::{DEFAULT_PROBE_DEADLINE, NetworkProber};
pub use tcp::TcpProber;

use crate::health::domain::ProbeOutcome;

/// Outcome of one strategy before it is timestamped into a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeVerdict {
    /// Verdict.
    pub outcome: ProbeOutcome,
    /// Explanation for non-healthy outcomes.
    pub error: Option<String>,
}

impl ProbeVerdict {
    /// A healthy verdict.
    #[must_use]
    pub const fn healthy() -> Self {
        Self {
            outcome: ProbeOutcome::Healthy,
            error: None,
        }
    }

    /// A failed verdict with an explanation.
    #[must_use]
    pub fn failed(outcome: ProbeOutcome, error: impl Into<String>) -> Self {
        Self {
            outcome,
            error: Some(error.into()),
        }
    }
}
