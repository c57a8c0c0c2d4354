//! Error types for candidate construction, scanning, and discovery sources.

use camino::Utf8PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while constructing discovery domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryDomainError {
    /// The candidate name is empty after trimming.
    #[error("candidate name must not be empty")]
    EmptyName,

    /// The candidate location is empty after trimming.
    #[error("candidate location must not be empty")]
    EmptyLocation,
}

/// Error returned while parsing a candidate source from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown candidate source: {0}")]
pub struct ParseCandidateSourceError(pub String);

/// A recoverable problem met while producing candidates.
///
/// One bad directory or one bad registry entry never stops the source; the
/// problem is recorded and discovery carries on.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// A configured scan root does not exist or is not a directory.
    #[error("scan root {path} is missing or not a directory")]
    MissingRoot {
        /// Configured root path.
        path: Utf8PathBuf,
    },

    /// A directory or manifest could not be read.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        /// Offending path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        source: Arc<std::io::Error>,
    },

    /// A manifest exists but could not be decoded.
    #[error("malformed manifest {path}: {reason}")]
    MalformedManifest {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// A path outside UTF-8 was met and skipped.
    #[error("skipping non UTF-8 path {0}")]
    NonUtf8Path(String),

    /// An entry returned by a remote source is unusable.
    #[error("invalid entry from {origin}: {reason}")]
    InvalidEntry {
        /// Source that produced the entry.
        origin: String,
        /// Why the entry was rejected.
        reason: String,
    },
}

impl ScanError {
    /// Wraps an I/O failure for `path`.
    pub fn unreadable(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Records a manifest decoding failure for `path`.
    pub fn malformed(path: impl Into<Utf8PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedManifest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for discovery source operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// A whole discovery source failed to produce candidates.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The source did not answer within its deadline.
    #[error("discovery source timed out after {0:?}")]
    Timeout(Duration),

    /// The source responded with something it should not have.
    #[error("discovery source returned an invalid response: {0}")]
    InvalidResponse(String),

    /// The source could not be reached or run.
    #[error("discovery source unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl DiscoveryError {
    /// Wraps an infrastructure failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
