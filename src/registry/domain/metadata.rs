//! Merged metadata with per-key provenance.

use crate::discovery::domain::CandidateSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One metadata value and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    value: String,
    source: CandidateSource,
    observed_at: DateTime<Utc>,
}

impl MetadataEntry {
    /// Returns the value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the source that supplied the value.
    #[must_use]
    pub const fn source(&self) -> CandidateSource {
        self.source
    }

    /// Returns when the value was last written.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// Metadata bag accumulated across observations.
///
/// Values from the external registry are authoritative: a locally inferred
/// value never replaces one the external registry supplied. Otherwise the
/// most recent observation wins. Keys are never dropped by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceMetadata {
    entries: BTreeMap<String, MetadataEntry>,
}

impl ServiceMetadata {
    /// Creates an empty bag.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Merges `incoming` observed from `source`; returns whether any value
    /// or provenance changed.
    pub fn merge(
        &mut self,
        incoming: &BTreeMap<String, String>,
        source: CandidateSource,
        observed_at: DateTime<Utc>,
    ) -> bool {
        self.merge_sourced(
            incoming
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str(), source)),
            observed_at,
        )
    }

    /// Merges entries that each carry their own source; returns whether any
    /// value or provenance changed.
    pub fn merge_sourced<'a>(
        &mut self,
        incoming: impl IntoIterator<Item = (&'a str, &'a str, CandidateSource)>,
        observed_at: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        for (key, value, source) in incoming {
            let replacement = MetadataEntry {
                value: value.to_owned(),
                source,
                observed_at,
            };
            match self.entries.get_mut(key) {
                None => {
                    self.entries.insert(key.to_owned(), replacement);
                    changed = true;
                }
                Some(stored) if stored.source.is_authoritative() && !source.is_authoritative() => {}
                Some(stored) => {
                    changed |= stored.value != replacement.value || stored.source != source;
                    *stored = replacement;
                }
            }
        }
        changed
    }

    /// Returns the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(MetadataEntry::value)
    }

    /// Returns the entry, with provenance, stored for `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&MetadataEntry> {
        self.entries.get(key)
    }

    /// Iterates over keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry.value()))
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
