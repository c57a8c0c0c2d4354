//! Result of one health probe.

use super::{ProbeMethod, ProbeOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error recorded when a probe runs past its deadline.
pub const PROBE_DEADLINE_EXCEEDED: &str = "probe deadline exceeded";

/// Outcome of probing one candidate, consumed immediately by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbeResult {
    target: String,
    method: Option<ProbeMethod>,
    outcome: ProbeOutcome,
    latency_ms: u64,
    error: Option<String>,
    probed_at: DateTime<Utc>,
}

impl HealthProbeResult {
    /// Creates a result for a probe that was attempted.
    #[must_use]
    pub fn new(
        target: impl Into<String>,
        method: ProbeMethod,
        outcome: ProbeOutcome,
        probed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target: target.into(),
            method: Some(method),
            outcome,
            latency_ms: 0,
            error: None,
            probed_at,
        }
    }

    /// Creates a result for a candidate with no probe strategy.
    #[must_use]
    pub fn skipped(target: impl Into<String>, probed_at: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            method: None,
            outcome: ProbeOutcome::Skipped,
            latency_ms: 0,
            error: None,
            probed_at,
        }
    }

    /// Creates an unreachable result for a probe cut off by a deadline
    /// before it could report.
    #[must_use]
    pub fn deadline_exceeded(target: impl Into<String>, probed_at: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            method: None,
            outcome: ProbeOutcome::Unreachable,
            latency_ms: 0,
            error: Some(PROBE_DEADLINE_EXCEEDED.to_owned()),
            probed_at,
        }
    }

    /// Records the elapsed probe time.
    #[must_use]
    pub fn with_latency(mut self, elapsed: Duration) -> Self {
        self.latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Records an error description.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let normalized = error.into().trim().to_owned();
        if !normalized.is_empty() {
            self.error = Some(normalized);
        }
        self
    }

    /// Returns the probed target (URL or `host:port`).
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the probe method, absent for skipped probes.
    #[must_use]
    pub const fn method(&self) -> Option<ProbeMethod> {
        self.method
    }

    /// Returns the verdict.
    #[must_use]
    pub const fn outcome(&self) -> ProbeOutcome {
        self.outcome
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub const fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Returns the error description, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns when the probe started.
    #[must_use]
    pub const fn probed_at(&self) -> DateTime<Utc> {
        self.probed_at
    }
}
