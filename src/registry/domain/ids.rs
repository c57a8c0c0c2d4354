//! Identifier types for registered services and reconciliation cycles.

use super::ParseServiceIdError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};
use uuid::Uuid;

/// Number of digest bytes kept in a service identifier.
const SERVICE_ID_BYTES: usize = 16;

/// Stable identifier of a registered service.
///
/// Derived from the SHA-256 digest of name and location, so the same
/// service observed by different sources, or across restarts, maps to the
/// same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    /// Derives the identifier for `name` at `location`.
    #[must_use]
    pub fn derive(name: &str, location: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0_u8]);
        hasher.update(location.as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(SERVICE_ID_BYTES * 2);
        for byte in digest.iter().take(SERVICE_ID_BYTES) {
            // Writing into a String cannot fail.
            write!(hex, "{byte:02x}").ok();
        }
        Self(hex)
    }

    /// Returns the hexadecimal form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl TryFrom<&str> for ServiceId {
    type Error = ParseServiceIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        let well_formed = normalized.len() == SERVICE_ID_BYTES * 2
            && normalized.chars().all(|digit| digit.is_ascii_hexdigit());
        if well_formed {
            Ok(Self(normalized))
        } else {
            Err(ParseServiceIdError(value.to_owned()))
        }
    }
}

impl TryFrom<String> for ServiceId {
    type Error = ParseServiceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<ServiceId> for String {
    fn from(value: ServiceId) -> Self {
        value.0
    }
}

/// Identifier of one reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Uuid);

impl CycleId {
    /// Creates a new random cycle identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}
