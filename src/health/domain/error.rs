//! Error types for the health domain.

use thiserror::Error;

/// Errors returned while building health domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HealthDomainError {
    /// The health URL template failed to render.
    #[error("health URL template cannot be rendered: {0}")]
    Template(String),

    /// The rendered health URL is not an HTTP URL.
    #[error("health URL template produced a non-HTTP URL: {0}")]
    NotHttp(String),
}

/// Error returned while parsing a probe outcome from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown probe outcome: {0}")]
pub struct ParseProbeOutcomeError(pub String);
