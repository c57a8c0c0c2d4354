//! Change events and mutation outcomes.

use super::{CycleId, RegisteredService, ServiceId, ServiceStatus};
use crate::registry::ports::RegistryPersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of registry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// A service was registered.
    Created,
    /// Fields other than status changed.
    Updated,
    /// The status moved.
    StatusChanged,
    /// A service was deleted.
    Removed,
}

impl ChangeAction {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusChanged => "status_changed",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Notification of one registry mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Affected service.
    pub service_id: ServiceId,
    /// What happened.
    pub action: ChangeAction,
    /// Status after the mutation (last known status for removals).
    pub status: ServiceStatus,
    /// When the mutation happened.
    pub timestamp: DateTime<Utc>,
    /// Cycle that caused the mutation, when driven by reconciliation.
    pub cycle_id: Option<CycleId>,
}

/// Result classification of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertAction {
    /// New registration.
    Created,
    /// Existing registration changed materially.
    Updated,
    /// Existing registration re-observed with nothing new.
    Unchanged,
}

impl UpsertAction {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for UpsertAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Outcome of [`RegistryStore::upsert`](crate::registry::services::RegistryStore::upsert).
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// Classification.
    pub action: UpsertAction,
    /// Registration after the upsert.
    pub service: RegisteredService,
    /// Status before the upsert; absent for new registrations.
    pub previous_status: Option<ServiceStatus>,
    /// Persistence failure; the in-memory view was still updated.
    pub write_error: Option<RegistryPersistenceError>,
}

impl UpsertOutcome {
    /// Returns whether the status moved.
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.previous_status
            .is_some_and(|previous| previous != self.service.status())
    }
}

/// Outcome of marking a service stale.
#[derive(Debug, Clone)]
pub struct MarkStaleOutcome {
    /// Registration after the call.
    pub service: RegisteredService,
    /// Whether the status actually moved to stale.
    pub changed: bool,
    /// Persistence failure; the in-memory view was still updated.
    pub write_error: Option<RegistryPersistenceError>,
}

/// Outcome of removing a service.
#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    /// The removed registration.
    pub service: RegisteredService,
    /// Persistence failure; the entry is gone from memory regardless.
    pub write_error: Option<RegistryPersistenceError>,
}
