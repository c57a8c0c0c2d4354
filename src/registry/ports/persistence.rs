//! Durable storage port for registered services.

use crate::registry::domain::{RegisteredService, ServiceId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for registry persistence operations.
pub type RegistryPersistenceResult<T> = Result<T, RegistryPersistenceError>;

/// Durable backing store keyed by service identifier.
#[async_trait]
pub trait RegistryPersistence: Send + Sync {
    /// Loads every stored registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryPersistenceError`] when the store cannot be read or
    /// holds undecodable entries.
    async fn load_all(&self) -> RegistryPersistenceResult<Vec<RegisteredService>>;

    /// Inserts or replaces one registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryPersistenceError::Persistence`] when the write fails.
    async fn save(&self, service: &RegisteredService) -> RegistryPersistenceResult<()>;

    /// Deletes one registration; deleting an absent id succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryPersistenceError::Persistence`] when the delete fails.
    async fn delete(&self, service_id: &ServiceId) -> RegistryPersistenceResult<()>;
}

/// Errors returned by registry persistence adapters.
#[derive(Debug, Clone, Error)]
pub enum RegistryPersistenceError {
    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted service data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RegistryPersistenceError {
    /// Wraps persisted-data decoding failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
