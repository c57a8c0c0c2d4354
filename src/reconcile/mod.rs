//! Reconciliation of discovered candidates into the registry.
//!
//! - Cycle reports and candidate de-duplication in [`domain`]
//! - The [`services::Reconciler`] and its periodic scheduler in [`services`]

pub mod domain;
pub mod services;
