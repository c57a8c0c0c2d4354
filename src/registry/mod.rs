//! Service registry bounded context.
//!
//! Holds the canonical set of registered services, their status state
//! machine, metadata merge rules, persistence, and change notification.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
