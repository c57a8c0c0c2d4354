//! Probe methods and outcomes.

use super::ParseProbeOutcomeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport used for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    /// HTTP GET against a health endpoint.
    Http,
    /// Plain TCP connect.
    Tcp,
}

impl ProbeMethod {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Verdict of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The service answered and looks healthy.
    Healthy,
    /// The service answered but reported a problem.
    Unhealthy,
    /// The service could not be reached in time.
    Unreachable,
    /// No probe strategy applies to the candidate.
    Skipped,
}

impl ProbeOutcome {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unreachable => "unreachable",
            Self::Skipped => "skipped",
        }
    }

    /// Returns whether the outcome counts as a failed probe.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Unhealthy | Self::Unreachable)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProbeOutcome {
    type Error = ParseProbeOutcomeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "healthy" => Ok(Self::Healthy),
            "unhealthy" => Ok(Self::Unhealthy),
            "unreachable" => Ok(Self::Unreachable),
            "skipped" => Ok(Self::Skipped),
            _ => Err(ParseProbeOutcomeError(value.to_owned())),
        }
    }
}
