//! Reconciliation services: the cycle driver and its scheduler.

mod reconciler;
mod scheduler;

pub use reconciler::{DEFAULT_MAX_CONCURRENT_PROBES, ReconcileSettings, Reconciler};
pub use scheduler::spawn_periodic;
