//! In-memory registry persistence.

use crate::registry::{
    domain::{RegisteredService, ServiceId},
    ports::{RegistryPersistence, RegistryPersistenceError, RegistryPersistenceResult},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory persistence.
///
/// Clones share state, so a test can keep a handle, reopen a store over it,
/// or make writes fail on demand.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    services: Arc<RwLock<BTreeMap<ServiceId, RegisteredService>>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryPersistence {
    /// Creates empty persistence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the stored copy of one registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryPersistenceError::Persistence`] when the lock is
    /// poisoned.
    pub fn stored(
        &self,
        service_id: &ServiceId,
    ) -> RegistryPersistenceResult<Option<RegisteredService>> {
        let services = self.services.read().map_err(|err| poisoned(&err))?;
        Ok(services.get(service_id).cloned())
    }

    fn check_writable(&self) -> RegistryPersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryPersistenceError::persistence(std::io::Error::other(
                "in-memory persistence is failing writes",
            )));
        }
        Ok(())
    }
}

fn poisoned<T>(err: &std::sync::PoisonError<T>) -> RegistryPersistenceError {
    RegistryPersistenceError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl RegistryPersistence for InMemoryPersistence {
    async fn load_all(&self) -> RegistryPersistenceResult<Vec<RegisteredService>> {
        let services = self.services.read().map_err(|err| poisoned(&err))?;
        Ok(services.values().cloned().collect())
    }

    async fn save(&self, service: &RegisteredService) -> RegistryPersistenceResult<()> {
        self.check_writable()?;
        let mut services = self.services.write().map_err(|err| poisoned(&err))?;
        services.insert(service.id().clone(), service.clone());
        Ok(())
    }

    async fn delete(&self, service_id: &ServiceId) -> RegistryPersistenceResult<()> {
        self.check_writable()?;
        let mut services = self.services.write().map_err(|err| poisoned(&err))?;
        services.remove(service_id);
        Ok(())
    }
}
