// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot definitions for node inputs/outputs.

use crate::link::LinkId;
use crate::serde_util::sparse_links;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Slot direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotDirection {
    /// Input slot
    Input,
    /// Output slot
    Output,
}

/// Data type tag carried by slots and links, e.g. `IMAGE` or `LATENT`.
///
/// `*` (and the empty tag) accept anything. A comma separated tag such as
/// `INT,FLOAT` accepts any of its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotType(String);

impl SlotType {
    /// Wildcard tag
    pub const ANY: &'static str = "*";

    /// Create a slot type from a tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The wildcard type
    pub fn any() -> Self {
        Self(Self::ANY.to_string())
    }

    /// Get the raw tag
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the wildcard type
    pub fn is_any(&self) -> bool {
        self.0.is_empty() || self.0 == Self::ANY
    }

    /// Check if a value of this type can flow into a slot of `other`
    pub fn can_connect_to(&self, other: &SlotType) -> bool {
        if self.is_any() || other.is_any() {
            return true;
        }

        if self.0.eq_ignore_ascii_case(&other.0) {
            return true;
        }

        // Union tags
        self.members()
            .any(|a| other.members().any(|b| a.eq_ignore_ascii_case(b)))
    }

    fn members(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').map(str::trim).filter(|m| !m.is_empty())
    }
}

impl Default for SlotType {
    fn default() -> Self {
        Self::any()
    }
}

impl From<&str> for SlotType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl std::fmt::Display for SlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SlotType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Older documents use numeric tags (e.g. -1 for events) or null.
        Ok(match Value::deserialize(deserializer)? {
            Value::String(tag) => Self(tag),
            Value::Null => Self::any(),
            other => Self(other.to_string()),
        })
    }
}

/// An input slot. Holds at most one link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    /// Slot name (not unique across a node)
    pub name: String,
    /// Accepted data type
    #[serde(rename = "type", default)]
    pub slot_type: SlotType,
    /// Connected link, if any
    #[serde(default)]
    pub link: Option<LinkId>,
    /// Fields this crate does not interpret (labels, widget bindings, ...)
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl InputSlot {
    /// Create a new unconnected input slot
    pub fn new(name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        Self {
            name: name.into(),
            slot_type: slot_type.into(),
            link: None,
            extra: IndexMap::new(),
        }
    }

    /// Check if a link occupies this slot
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

/// An output slot. May feed any number of links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    /// Slot name (not unique across a node)
    pub name: String,
    /// Produced data type
    #[serde(rename = "type", default)]
    pub slot_type: SlotType,
    /// Departing links, in connection order
    #[serde(default, deserialize_with = "sparse_links")]
    pub links: Vec<LinkId>,
    /// Fields this crate does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl OutputSlot {
    /// Create a new output slot without links
    pub fn new(name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        Self {
            name: name.into(),
            slot_type: slot_type.into(),
            links: Vec::new(),
            extra: IndexMap::new(),
        }
    }
}
