//! Canonical registry of services with write-through persistence.

use super::{ChangeNotifier, ChangeSubscription, DEFAULT_CHANNEL_CAPACITY};
use crate::discovery::domain::ServiceCandidate;
use crate::health::domain::HealthProbeResult;
use crate::registry::{
    domain::{
        ChangeAction, ChangeEvent, CycleId, DEFAULT_FAILURE_THRESHOLD, MarkStaleOutcome,
        RegisteredService, RemoveOutcome, ServiceFilter, ServiceId, UpsertAction, UpsertOutcome,
    },
    ports::{RegistryPersistence, RegistryPersistenceError, RegistryPersistenceResult},
};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Tunables for [`RegistryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Consecutive failures before a service is unreachable.
    pub failure_threshold: u32,
    /// Events buffered per change subscriber.
    pub channel_capacity: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// A persistence write that failed again on retry.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    /// Affected service.
    pub service_id: ServiceId,
    /// Persistence error.
    pub error: RegistryPersistenceError,
}

#[derive(Debug, Default)]
struct StoreState {
    services: BTreeMap<ServiceId, RegisteredService>,
    pending: BTreeSet<ServiceId>,
}

/// The canonical set of known services.
///
/// Reads share a lock; every mutation holds the single writer lock for the
/// in-memory update, the persistence write, and the change event, so
/// subscribers see mutations in the order they were applied.
pub struct RegistryStore<P, C>
where
    P: RegistryPersistence,
    C: Clock + Send + Sync,
{
    state: RwLock<StoreState>,
    persistence: Arc<P>,
    clock: Arc<C>,
    notifier: ChangeNotifier,
    failure_threshold: u32,
}

impl<P, C> RegistryStore<P, C>
where
    P: RegistryPersistence,
    C: Clock + Send + Sync,
{
    /// Opens the store, loading every persisted registration.
    ///
    /// Loaded services start `unknown` with no failures until re-probed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryPersistenceError`] when persisted state cannot be
    /// loaded.
    pub async fn open(
        persistence: Arc<P>,
        clock: Arc<C>,
        settings: StoreSettings,
    ) -> RegistryPersistenceResult<Self> {
        let loaded = persistence.load_all().await?;
        let services: BTreeMap<_, _> = loaded
            .into_iter()
            .map(|mut service| {
                service.reset_for_restart();
                (service.id().clone(), service)
            })
            .collect();
        info!(services = services.len(), "registry store opened");

        Ok(Self {
            state: RwLock::new(StoreState {
                services,
                pending: BTreeSet::new(),
            }),
            persistence,
            clock,
            notifier: ChangeNotifier::new(settings.channel_capacity),
            failure_threshold: settings.failure_threshold,
        })
    }

    /// Returns the change notifier.
    #[must_use]
    pub const fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Subscribes to change events.
    #[must_use]
    pub fn subscribe(&self) -> ChangeSubscription {
        self.notifier.subscribe()
    }

    /// Returns one registration.
    pub async fn get(&self, service_id: &ServiceId) -> Option<RegisteredService> {
        self.state.read().await.services.get(service_id).cloned()
    }

    /// Returns registrations matching `filter`, ordered by identifier.
    pub async fn list(&self, filter: &ServiceFilter) -> Vec<RegisteredService> {
        self.state
            .read()
            .await
            .services
            .values()
            .filter(|service| filter.matches(service))
            .cloned()
            .collect()
    }

    /// Returns the number of ids whose last write has not reached
    /// persistence.
    pub async fn pending_writes(&self) -> usize {
        self.state.read().await.pending.len()
    }

    /// Registers or refreshes the service a candidate describes.
    ///
    /// A failed persistence write is reported in the outcome; the in-memory
    /// view is updated regardless and the write is retried by
    /// [`Self::retry_pending_writes`].
    pub async fn upsert(
        &self,
        candidate: &ServiceCandidate,
        probe: &HealthProbeResult,
        cycle_id: Option<CycleId>,
    ) -> UpsertOutcome {
        let service_id = ServiceId::derive(candidate.name(), candidate.location());
        let mut state = self.state.write().await;

        let (action, previous_status, service) = match state.services.get_mut(&service_id) {
            Some(existing) => {
                let observation =
                    existing.observe(candidate, probe, self.failure_threshold, &*self.clock);
                let action = if observation.changed {
                    UpsertAction::Updated
                } else {
                    UpsertAction::Unchanged
                };
                (action, Some(observation.previous_status), existing.clone())
            }
            None => {
                let service = RegisteredService::register(
                    candidate,
                    probe,
                    self.failure_threshold,
                    &*self.clock,
                );
                state.services.insert(service_id, service.clone());
                (UpsertAction::Created, None, service)
            }
        };

        let write_error = self.write_through(&mut state, &service).await;
        let outcome = UpsertOutcome {
            action,
            service,
            previous_status,
            write_error,
        };
        let change = match outcome.action {
            UpsertAction::Created => Some(ChangeAction::Created),
            UpsertAction::Updated if outcome.status_changed() => Some(ChangeAction::StatusChanged),
            UpsertAction::Updated => Some(ChangeAction::Updated),
            UpsertAction::Unchanged => None,
        };
        if let Some(action) = change {
            self.publish(&outcome.service, action, cycle_id);
        }
        debug!(
            service_id = %outcome.service.id(),
            action = %outcome.action,
            status = %outcome.service.status(),
            "upserted service"
        );
        outcome
    }

    /// Marks a service stale; `None` when it is not registered.
    pub async fn mark_stale(
        &self,
        service_id: &ServiceId,
        cycle_id: Option<CycleId>,
    ) -> Option<MarkStaleOutcome> {
        let mut state = self.state.write().await;
        let service = state.services.get_mut(service_id)?;
        if !service.mark_stale(&*self.clock) {
            return Some(MarkStaleOutcome {
                service: service.clone(),
                changed: false,
                write_error: None,
            });
        }
        let snapshot = service.clone();
        let write_error = self.write_through(&mut state, &snapshot).await;
        self.publish(&snapshot, ChangeAction::StatusChanged, cycle_id);
        info!(service_id = %snapshot.id(), name = snapshot.name(), "service marked stale");
        Some(MarkStaleOutcome {
            service: snapshot,
            changed: true,
            write_error,
        })
    }

    /// Deletes a service; `None` when it is not registered.
    ///
    /// This is the only operation that removes registrations.
    pub async fn remove(
        &self,
        service_id: &ServiceId,
        cycle_id: Option<CycleId>,
    ) -> Option<RemoveOutcome> {
        let mut state = self.state.write().await;
        let service = state.services.remove(service_id)?;
        let write_error = match self.persistence.delete(service_id).await {
            Ok(()) => {
                state.pending.remove(service_id);
                None
            }
            Err(err) => {
                warn!(service_id = %service_id, error = %err, "registry delete failed, will retry");
                state.pending.insert(service_id.clone());
                Some(err)
            }
        };
        self.publish(&service, ChangeAction::Removed, cycle_id);
        info!(service_id = %service_id, name = service.name(), "service removed");
        Some(RemoveOutcome {
            service,
            write_error,
        })
    }

    /// Retries every write that previously failed.
    ///
    /// Returns the writes that failed again; they stay queued.
    pub async fn retry_pending_writes(&self) -> Vec<WriteFailure> {
        let mut state = self.state.write().await;
        if state.pending.is_empty() {
            return Vec::new();
        }
        let pending = std::mem::take(&mut state.pending);
        let mut failures = Vec::new();
        for service_id in pending {
            let result = match state.services.get(&service_id) {
                Some(service) => self.persistence.save(service).await,
                None => self.persistence.delete(&service_id).await,
            };
            if let Err(error) = result {
                state.pending.insert(service_id.clone());
                failures.push(WriteFailure { service_id, error });
            }
        }
        if failures.is_empty() {
            info!("pending registry writes flushed");
        } else {
            warn!(failed = failures.len(), "pending registry writes still failing");
        }
        failures
    }

    async fn write_through(
        &self,
        state: &mut StoreState,
        service: &RegisteredService,
    ) -> Option<RegistryPersistenceError> {
        match self.persistence.save(service).await {
            Ok(()) => {
                state.pending.remove(service.id());
                None
            }
            Err(err) => {
                warn!(service_id = %service.id(), error = %err, "registry write failed, will retry");
                state.pending.insert(service.id().clone());
                Some(err)
            }
        }
    }

    fn publish(&self, service: &RegisteredService, action: ChangeAction, cycle_id: Option<CycleId>) {
        self.notifier.publish(ChangeEvent {
            service_id: service.id().clone(),
            action,
            status: service.status(),
            timestamp: self.clock.utc(),
            cycle_id,
        });
    }
}

impl<P, C> std::fmt::Debug for RegistryStore<P, C>
where
    P: RegistryPersistence,
    C: Clock + Send + Sync,
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RegistryStore")
            .field("failure_threshold", &self.failure_threshold)
            .finish_non_exhaustive()
    }
}
