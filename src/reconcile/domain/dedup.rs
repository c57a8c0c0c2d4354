//! Candidate de-duplication.

use crate::discovery::domain::{CandidateKey, ServiceCandidate};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Collapses candidates describing the same `(name, location)`.
///
/// The highest-confidence candidate wins, with ties going to the more
/// authoritative source (external, then container, then manifest). The
/// winner picks up metadata keys and signals only the losers knew about,
/// without its own values being overridden, and remembers every source
/// that reported the service. Output is ordered by key.
#[must_use]
pub fn deduplicate(candidates: Vec<ServiceCandidate>) -> Vec<ServiceCandidate> {
    let mut by_key: BTreeMap<CandidateKey, ServiceCandidate> = BTreeMap::new();
    for mut candidate in candidates {
        match by_key.entry(candidate.key()) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if candidate.outranks(current) {
                    candidate.absorb(current);
                    *current = candidate;
                } else {
                    current.absorb(&candidate);
                }
            }
        }
    }
    by_key.into_values().collect()
}
