//! Cycle reports.

use crate::discovery::domain::{CandidateSource, ScanError};
use crate::registry::domain::{CycleId, ServiceId, UpsertAction, UpsertOutcome};
use crate::registry::ports::RegistryPersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Every step ran, including the aging sweep.
    Completed,
    /// The deadline elapsed or cancellation was requested; results merged
    /// before that point are kept and no aging happened.
    Partial,
    /// Another cycle was already running; nothing was done.
    Skipped,
}

impl CycleStatus {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A problem recorded during a cycle. None of these abort the cycle.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    /// A whole discovery source failed or timed out.
    #[error("{origin} source unavailable: {reason}")]
    SourceUnavailable {
        /// Failed source.
        origin: CandidateSource,
        /// Failure description.
        reason: String,
    },

    /// A source skipped over a bad directory or entry.
    #[error("{origin} source issue: {issue}")]
    Scan {
        /// Reporting source.
        origin: CandidateSource,
        /// The recoverable issue.
        #[source]
        issue: ScanError,
    },

    /// A registry write did not reach persistence; it will be retried.
    #[error("registry write failed for {service_id}: {error}")]
    StoreWrite {
        /// Affected service.
        service_id: ServiceId,
        /// Persistence error.
        #[source]
        error: RegistryPersistenceError,
    },
}

/// Summary of one reconciliation cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Cycle identifier, also carried by the cycle's change events.
    pub cycle_id: CycleId,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished.
    pub finished_at: DateTime<Utc>,
    /// How the cycle ended.
    pub status: CycleStatus,
    /// Services registered for the first time.
    pub created: usize,
    /// Services whose registration changed.
    pub updated: usize,
    /// Services re-observed with nothing new.
    pub unchanged: usize,
    /// Services newly marked stale.
    pub marked_stale: usize,
    /// Services deleted after the removal grace period.
    pub removed: usize,
    /// Probe results merged.
    pub probed: usize,
    /// Problems met along the way.
    pub errors: Vec<CycleError>,
}

impl CycleReport {
    /// Starts an empty report.
    #[must_use]
    pub const fn new(cycle_id: CycleId, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            finished_at: started_at,
            status: CycleStatus::Completed,
            created: 0,
            updated: 0,
            unchanged: 0,
            marked_stale: 0,
            removed: 0,
            probed: 0,
            errors: Vec::new(),
        }
    }

    /// Report for a trigger that coalesced into a running cycle.
    #[must_use]
    pub const fn skipped(cycle_id: CycleId, at: DateTime<Utc>) -> Self {
        let mut report = Self::new(cycle_id, at);
        report.status = CycleStatus::Skipped;
        report
    }

    /// Counts one merged probe result.
    pub fn record_upsert(&mut self, outcome: &UpsertOutcome) {
        self.probed += 1;
        match outcome.action {
            UpsertAction::Created => self.created += 1,
            UpsertAction::Updated => self.updated += 1,
            UpsertAction::Unchanged => self.unchanged += 1,
        }
        if let Some(error) = &outcome.write_error {
            self.record_write_failure(outcome.service.id().clone(), error.clone());
        }
    }

    /// Records a persistence failure.
    pub fn record_write_failure(&mut self, service_id: ServiceId, error: RegistryPersistenceError) {
        self.errors.push(CycleError::StoreWrite { service_id, error });
    }

    /// Returns the number of source-level failures.
    #[must_use]
    pub fn unavailable_sources(&self) -> usize {
        self.errors
            .iter()
            .filter(|error| matches!(error, CycleError::SourceUnavailable { .. }))
            .count()
    }

    /// Returns the number of services the cycle touched in any way.
    #[must_use]
    pub const fn touched(&self) -> usize {
        self.created + self.updated + self.unchanged + self.marked_stale + self.removed
    }
}
