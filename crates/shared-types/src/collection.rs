//! # Reference Collections
//!
//! Append-only sets keyed by `(collection-type, service-IRI)` whose members
//! are activity IRIs. `(collection, service, activity)` is unique.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The reference collection types a service maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceType {
    /// Activities accepted from peers.
    Inbox,
    /// Activities this service has broadcast.
    Outbox,
    /// Peers following this service.
    Follower,
    /// Peers this service follows.
    Following,
    /// Peers acting as witnesses for this service.
    Witness,
    /// Liked activities.
    Like,
    /// Shared (announced) activities.
    Share,
}

impl ReferenceType {
    /// Storage tag for this collection.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Outbox => "outbox",
            Self::Follower => "follower",
            Self::Following => "following",
            Self::Witness => "witness",
            Self::Like => "like",
            Self::Share => "share",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_distinct() {
        let all = [
            ReferenceType::Inbox,
            ReferenceType::Outbox,
            ReferenceType::Follower,
            ReferenceType::Following,
            ReferenceType::Witness,
            ReferenceType::Like,
            ReferenceType::Share,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.tag(), b.tag());
            }
        }
    }
}
