//! Port contracts for the service registry.

mod persistence;

pub use persistence::{RegistryPersistence, RegistryPersistenceError, RegistryPersistenceResult};
