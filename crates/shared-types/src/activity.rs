//! # Activity Vocabulary
//!
//! The federation unit exchanged over the overlay. Activities are JSON
//! documents with a discriminator `type`, a common head (`id`, `actor`,
//! `published`, `to`), and a vocabulary-specific tail. Unknown types
//! round-trip opaquely through [`ActivityKind::Other`] and the flattened
//! `extra` map.

use crate::iri::Iri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The ActivityStreams public collection.
///
/// Activities addressed here are deliverable to anyone.
pub const PUBLIC_IRI: &str = "https://www.w3.org/ns/activitystreams#Public";

/// The anchor witness target IRI carried by Offer activities.
pub const ANCHOR_WITNESS_IRI: &str = "https://w3id.org/activityanchors#AnchorWitness";

/// Discriminator for the activity vocabulary.
///
/// The known verbs are modeled explicitly; anything else is preserved
/// verbatim in [`ActivityKind::Other`] so re-serialization is lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Create,
    Announce,
    Offer,
    Accept,
    Reject,
    Follow,
    Undo,
    Like,
    /// Vocabulary this node does not interpret.
    Other(String),
}

impl From<String> for ActivityKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Create" => Self::Create,
            "Announce" => Self::Announce,
            "Offer" => Self::Offer,
            "Accept" => Self::Accept,
            "Reject" => Self::Reject,
            "Follow" => Self::Follow,
            "Undo" => Self::Undo,
            "Like" => Self::Like,
            _ => Self::Other(s),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(k: ActivityKind) -> Self {
        k.as_str().to_string()
    }
}

impl ActivityKind {
    /// The wire name of this verb.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "Create",
            Self::Announce => "Announce",
            Self::Offer => "Offer",
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::Follow => "Follow",
            Self::Undo => "Undo",
            Self::Like => "Like",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An activity document.
///
/// Identity (`id`) is globally unique and immutable. The `actor` is required
/// by the pipeline but optional in the type so that malformed inbound
/// documents can still be deserialized and rejected with a classified error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Globally unique, immutable identity.
    pub id: Iri,

    /// The verb.
    #[serde(rename = "type")]
    pub kind: ActivityKind,

    /// The actor that produced the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Iri>,

    /// Publication timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    /// Primary addressees.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<Iri>,

    /// The inlined object (vocabulary-specific).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,

    /// Optional target (vocabulary-specific).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,

    /// Witnessing window start (Offer).
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    /// Witnessing window end (Offer).
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Unrecognized fields, preserved for lossless round-trips.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Activity {
    /// Create an activity with the minimal head.
    #[must_use]
    pub fn new(id: Iri, kind: ActivityKind, actor: Iri) -> Self {
        Self {
            id,
            kind,
            actor: Some(actor),
            published: None,
            to: Vec::new(),
            object: None,
            target: None,
            start_time: None,
            end_time: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the publication timestamp.
    #[must_use]
    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published = Some(at);
        self
    }

    /// Set the addressees.
    #[must_use]
    pub fn to(mut self, to: Vec<Iri>) -> Self {
        self.to = to;
        self
    }

    /// Set the inlined object.
    #[must_use]
    pub fn object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Set the target.
    #[must_use]
    pub fn target(mut self, target: Value) -> Self {
        self.target = Some(target);
        self
    }

    /// The IRI of the inlined object, when the object is an IRI reference or
    /// carries an `id` field.
    #[must_use]
    pub fn object_iri(&self) -> Option<Iri> {
        match self.object.as_ref()? {
            Value::String(s) => Iri::parse(s.clone()).ok(),
            Value::Object(map) => map
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| Iri::parse(s).ok()),
            _ => None,
        }
    }
}
