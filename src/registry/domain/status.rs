//! Service status state machine and registration provenance.

use super::{ParseRegistrationSourceError, ParseServiceStatusError};
use crate::discovery::domain::CandidateSource;
use crate::health::domain::ProbeOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of consecutive failures before a service is unreachable.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Health status of a registered service.
///
/// Recovery is fast (one healthy probe) and degradation slow (several
/// failures before `unreachable`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Not probed since registration or restart.
    Unknown,
    /// Last probe succeeded.
    Healthy,
    /// Recent probes failed.
    Unhealthy,
    /// Probes failed at least the threshold number of times in a row.
    Unreachable,
    /// No source has observed the service for the stale grace period.
    Stale,
}

impl ServiceStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unreachable => "unreachable",
            Self::Stale => "stale",
        }
    }

    /// Returns the status following a probe.
    ///
    /// `failures` is the consecutive failure count including this probe.
    #[must_use]
    pub const fn after_probe(self, outcome: ProbeOutcome, failures: u32, threshold: u32) -> Self {
        match outcome {
            ProbeOutcome::Healthy => Self::Healthy,
            ProbeOutcome::Skipped => match self {
                Self::Stale => Self::Unknown,
                other => other,
            },
            ProbeOutcome::Unhealthy | ProbeOutcome::Unreachable => match self {
                Self::Unknown | Self::Healthy => Self::Unhealthy,
                Self::Unhealthy | Self::Unreachable | Self::Stale => {
                    if failures >= threshold {
                        Self::Unreachable
                    } else {
                        Self::Unhealthy
                    }
                }
            },
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceStatus {
    type Error = ParseServiceStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unknown" => Ok(Self::Unknown),
            "healthy" => Ok(Self::Healthy),
            "unhealthy" => Ok(Self::Unhealthy),
            "unreachable" => Ok(Self::Unreachable),
            "stale" => Ok(Self::Stale),
            _ => Err(ParseServiceStatusError(value.to_owned())),
        }
    }
}

/// Which sources have observed a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationSource {
    /// Project manifests only.
    Manifest,
    /// Container runtime only.
    Container,
    /// External registry only.
    External,
    /// More than one source.
    Merged,
}

impl RegistrationSource {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Container => "container",
            Self::External => "external",
            Self::Merged => "merged",
        }
    }

    /// Returns whether `source` contributed to this registration.
    ///
    /// Merged registrations count every source as a contributor.
    #[must_use]
    pub const fn includes(self, source: CandidateSource) -> bool {
        matches!(
            (self, source),
            (Self::Merged, _)
                | (Self::Manifest, CandidateSource::Manifest)
                | (Self::Container, CandidateSource::Container)
                | (Self::External, CandidateSource::External)
        )
    }

    /// Returns the provenance after `source` observes the registration.
    #[must_use]
    pub fn observed_by(self, source: CandidateSource) -> Self {
        let incoming = Self::from(source);
        if self == incoming { self } else { Self::Merged }
    }
}

impl From<CandidateSource> for RegistrationSource {
    fn from(value: CandidateSource) -> Self {
        match value {
            CandidateSource::Manifest => Self::Manifest,
            CandidateSource::Container => Self::Container,
            CandidateSource::External => Self::External,
        }
    }
}

impl fmt::Display for RegistrationSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for RegistrationSource {
    type Error = ParseRegistrationSourceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "manifest" => Ok(Self::Manifest),
            "container" => Ok(Self::Container),
            "external" => Ok(Self::External),
            "merged" => Ok(Self::Merged),
            _ => Err(ParseRegistrationSourceError(value.to_owned())),
        }
    }
}
