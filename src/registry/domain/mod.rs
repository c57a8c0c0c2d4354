//! Domain model for the service registry.

mod error;
mod events;
mod filter;
mod ids;
mod metadata;
mod service;
mod status;

pub use error::{ParseRegistrationSourceError, ParseServiceIdError, ParseServiceStatusError};
pub use events::{
    ChangeAction, ChangeEvent, MarkStaleOutcome, RemoveOutcome, UpsertAction, UpsertOutcome,
};
pub use filter::ServiceFilter;
pub use ids::{CycleId, ServiceId};
pub use metadata::{MetadataEntry, ServiceMetadata};
pub use service::{Observation, RegisteredService};
pub use status::{DEFAULT_FAILURE_THRESHOLD, RegistrationSource, ServiceStatus};
