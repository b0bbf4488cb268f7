//! Witness list construction.

use shared_types::Iri;

/// Deduplicate witness IRIs preserving first-seen order.
///
/// The Offer's recipient order is observable by peers, so the list keeps
/// the order in which operations introduced each witness.
#[must_use]
pub fn dedupe_witnesses(witnesses: Vec<Iri>) -> Vec<Iri> {
    let mut seen = std::collections::HashSet::new();
    witnesses
        .into_iter()
        .filter(|w| seen.insert(w.clone()))
        .collect()
}
