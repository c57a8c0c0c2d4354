//! Domain model for service discovery.
//!
//! Candidates are plain data: detection code builds them from manifests,
//! container listings, or registry payloads without touching the network.

mod candidate;
mod error;
mod kind;
mod source;

pub use candidate::{CandidateKey, Confidence, ServiceCandidate};
pub use error::{
    DiscoveryDomainError, DiscoveryError, DiscoveryResult, ParseCandidateSourceError, ScanError,
};
pub use kind::ServiceKind;
pub use source::CandidateSource;
