//! Domain model for reconciliation cycles.

mod dedup;
mod report;

pub use crate::registry::domain::CycleId;
pub use dedup::deduplicate;
pub use report::{CycleError, CycleReport, CycleStatus};
