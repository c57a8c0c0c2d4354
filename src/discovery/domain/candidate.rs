//! Service candidates produced by discovery sources.

use super::{CandidateSource, DiscoveryDomainError, ServiceKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Degree of belief that a candidate is a real, reachable service.
///
/// Always within `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// Full confidence, used for externally registered services.
    pub const CERTAIN: Self = Self(1.0);

    /// Lowest confidence.
    pub const NONE: Self = Self(0.0);

    /// Creates a confidence value, clamping into `0.0..=1.0`.
    ///
    /// `NaN` is treated as no confidence.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NONE;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Eq for Confidence {}

impl PartialOrd for Confidence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Confidence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.2}", self.0)
    }
}

/// Identity key shared by candidates that describe the same service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateKey {
    /// Service name.
    pub name: String,
    /// Path, container id, or external location.
    pub location: String,
}

/// A possibly-a-service observation from one discovery source.
///
/// Candidates are rebuilt every cycle and never persisted. Detection code
/// only constructs them; probing and registration happen elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCandidate {
    source: CandidateSource,
    name: String,
    kind: ServiceKind,
    location: String,
    entrypoint: Option<String>,
    port: Option<u16>,
    health_endpoint: Option<String>,
    confidence: Confidence,
    metadata: BTreeMap<String, String>,
    /// Sources of metadata keys folded in from other candidates.
    #[serde(skip)]
    absorbed: BTreeMap<String, CandidateSource>,
    /// Other sources that reported this same service.
    #[serde(skip)]
    corroborated_by: BTreeSet<CandidateSource>,
}

impl ServiceCandidate {
    /// Creates a candidate with unknown type and no signals beyond identity.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryDomainError`] when the name or location is blank.
    pub fn new(
        source: CandidateSource,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self, DiscoveryDomainError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(DiscoveryDomainError::EmptyName);
        }
        let location = location.into().trim().to_owned();
        if location.is_empty() {
            return Err(DiscoveryDomainError::EmptyLocation);
        }

        Ok(Self {
            source,
            name,
            kind: ServiceKind::Unknown,
            location,
            entrypoint: None,
            port: None,
            health_endpoint: None,
            confidence: Confidence::NONE,
            metadata: BTreeMap::new(),
            absorbed: BTreeMap::new(),
            corroborated_by: BTreeSet::new(),
        })
    }

    /// Sets the inferred service type.
    #[must_use]
    pub fn with_kind(mut self, kind: ServiceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the entrypoint (command, module, or file).
    #[must_use]
    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        let normalized = entrypoint.into().trim().to_owned();
        if !normalized.is_empty() {
            self.entrypoint = Some(normalized);
        }
        self
    }

    /// Sets the inferred listening port. Port `0` is ignored.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        if port != 0 {
            self.port = Some(port);
        }
        self
    }

    /// Sets the guessed health endpoint URL.
    #[must_use]
    pub fn with_health_endpoint(mut self, url: impl Into<String>) -> Self {
        let normalized = url.into().trim().to_owned();
        if !normalized.is_empty() {
            self.health_endpoint = Some(normalized);
        }
        self
    }

    /// Sets the confidence score.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Adds one metadata entry. Blank keys or values are dropped.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_metadata(key, value);
        self
    }

    /// Adds several metadata entries.
    #[must_use]
    pub fn with_metadata_entries<K, V>(mut self, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.insert_metadata(key, value);
        }
        self
    }

    fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().trim().to_owned();
        let value = value.into().trim().to_owned();
        if !key.is_empty() && !value.is_empty() {
            self.absorbed.remove(&key);
            self.metadata.insert(key, value);
        }
    }

    /// Folds a lower-ranked observation of the same service into this one.
    ///
    /// This candidate keeps its own values. It gains the metadata keys and
    /// signals (type, port, endpoint, entrypoint) only `other` knew, each
    /// key remembering the source that supplied it, and records `other`'s
    /// sources as corroborating.
    pub fn absorb(&mut self, other: &Self) {
        for (key, value, source) in other.metadata_with_sources() {
            if !self.metadata.contains_key(key) {
                self.metadata.insert(key.to_owned(), value.to_owned());
                self.absorbed.insert(key.to_owned(), source);
            }
        }
        if self.kind == ServiceKind::Unknown {
            self.kind = other.kind.clone();
        }
        self.port = self.port.or(other.port);
        if self.health_endpoint.is_none() {
            self.health_endpoint.clone_from(&other.health_endpoint);
        }
        if self.entrypoint.is_none() {
            self.entrypoint.clone_from(&other.entrypoint);
        }
        self.corroborated_by.extend(other.contributors());
        self.corroborated_by.remove(&self.source);
    }

    /// Returns the discovery source.
    #[must_use]
    pub const fn source(&self) -> CandidateSource {
        self.source
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the inferred type.
    #[must_use]
    pub const fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    /// Returns the location (path, container id, or external location).
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the entrypoint when known.
    #[must_use]
    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Returns the inferred port when known.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the guessed health endpoint when known.
    #[must_use]
    pub fn health_endpoint(&self) -> Option<&str> {
        self.health_endpoint.as_deref()
    }

    /// Returns the confidence score.
    #[must_use]
    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Returns the raw metadata bag.
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Returns the source that supplied the value stored for `key`.
    #[must_use]
    pub fn metadata_source(&self, key: &str) -> Option<CandidateSource> {
        self.metadata
            .contains_key(key)
            .then(|| self.absorbed.get(key).copied().unwrap_or(self.source))
    }

    /// Iterates over metadata keys and values with the source of each.
    pub fn metadata_with_sources(&self) -> impl Iterator<Item = (&str, &str, CandidateSource)> {
        self.metadata.iter().map(|(key, value)| {
            let source = self.absorbed.get(key).copied().unwrap_or(self.source);
            (key.as_str(), value.as_str(), source)
        })
    }

    /// Returns every source that reported this service, own source first.
    pub fn contributors(&self) -> impl Iterator<Item = CandidateSource> + '_ {
        std::iter::once(self.source).chain(self.corroborated_by.iter().copied())
    }

    /// Returns the identity key used for de-duplication.
    #[must_use]
    pub fn key(&self) -> CandidateKey {
        CandidateKey {
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }

    /// Returns whether this candidate should win over `other` when both
    /// describe the same service.
    #[must_use]
    pub fn outranks(&self, other: &Self) -> bool {
        match self.confidence.cmp(&other.confidence) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.source.precedence() > other.source.precedence(),
        }
    }
}
