//! Read-side filtering of registered services.

use super::{RegisteredService, RegistrationSource, ServiceStatus};
use crate::discovery::domain::ServiceKind;

/// Criteria for [`RegistryStore::list`](crate::registry::services::RegistryStore::list).
///
/// Every criterion that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFilter {
    status: Option<ServiceStatus>,
    source: Option<RegistrationSource>,
    kind: Option<ServiceKind>,
    name_contains: Option<String>,
}

impl ServiceFilter {
    /// Matches every service.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one status.
    #[must_use]
    pub const fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to one registration source.
    #[must_use]
    pub const fn with_source(mut self, source: RegistrationSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Restricts to one service type.
    #[must_use]
    pub fn with_kind(mut self, kind: ServiceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts to names containing `fragment`, ignoring ASCII case.
    #[must_use]
    pub fn with_name_containing(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into().to_ascii_lowercase());
        self
    }

    /// Returns whether `service` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, service: &RegisteredService) -> bool {
        self.status.is_none_or(|status| service.status() == status)
            && self.source.is_none_or(|source| service.source() == source)
            && self.kind.as_ref().is_none_or(|kind| service.kind() == kind)
            && self.name_contains.as_deref().is_none_or(|fragment| {
                service.name().to_ascii_lowercase().contains(fragment)
            })
    }
}
