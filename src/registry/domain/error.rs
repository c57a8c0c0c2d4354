//! Parse errors for registry domain values.

use thiserror::Error;

/// Error returned while parsing a service status from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown service status: {0}")]
pub struct ParseServiceStatusError(pub String);

/// Error returned while parsing a registration source from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown registration source: {0}")]
pub struct ParseRegistrationSourceError(pub String);

/// Error returned when a stored service identifier is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed service identifier: {0}")]
pub struct ParseServiceIdError(pub String);
