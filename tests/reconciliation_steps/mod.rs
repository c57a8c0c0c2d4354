//! Step definitions for reconciliation scenarios.

mod given;
mod then;
mod when;
pub mod world;
