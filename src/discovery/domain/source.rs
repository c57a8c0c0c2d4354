//! Origin of a service candidate.

use super::ParseCandidateSourceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discovery source that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Inferred from project manifests on disk.
    Manifest,
    /// Reported by the container runtime.
    Container,
    /// Pulled from the external registry.
    External,
}

impl CandidateSource {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Container => "container",
            Self::External => "external",
        }
    }

    /// Tie-break rank when two sources report the same service with equal
    /// confidence. Higher wins.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Manifest => 0,
            Self::Container => 1,
            Self::External => 2,
        }
    }

    /// Returns whether values from this source override locally inferred
    /// values on conflict.
    #[must_use]
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::External)
    }
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for CandidateSource {
    type Error = ParseCandidateSourceError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "manifest" => Ok(Self::Manifest),
            "container" => Ok(Self::Container),
            "external" => Ok(Self::External),
            _ => Err(ParseCandidateSourceError(value.to_owned())),
        }
    }
}
