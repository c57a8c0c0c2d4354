//! Domain model for health probing.

mod error;
mod outcome;
mod result;
mod target;

pub use error::{HealthDomainError, ParseProbeOutcomeError};
pub use outcome::{ProbeMethod, ProbeOutcome};
pub use result::{HealthProbeResult, PROBE_DEADLINE_EXCEEDED};
pub use target::{DEFAULT_HEALTH_URL_TEMPLATE, HealthUrlTemplate, ProbeTarget};
