//! JSON Resource Descriptor types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// WebFinger property naming a domain's ledger type.
pub const LEDGER_TYPE_PROPERTY: &str = "https://trustbloc.dev/ns/ledger-type";

/// WebFinger property carrying the minimum resolver count.
pub const MIN_RESOLVERS_PROPERTY: &str = "https://trustbloc.dev/ns/min-resolvers";

/// A link inside a JRD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JrdLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// A JSON Resource Descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Jrd {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<JrdLink>,
}

impl Jrd {
    /// String property lookup.
    #[must_use]
    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    /// First link matching `rel` and, when given, the media type.
    #[must_use]
    pub fn link(&self, rel: &str, media_type: Option<&str>) -> Option<&JrdLink> {
        self.links.iter().find(|l| {
            l.rel.as_deref() == Some(rel)
                && media_type.map_or(true, |mt| l.media_type.as_deref() == Some(mt))
        })
    }
}
