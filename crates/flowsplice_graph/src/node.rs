// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph model.

use crate::serde_util::{null_as_default, vec2};
use crate::slot::{InputSlot, OutputSlot, SlotType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for a node, unique within one graph instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Provenance tags and free-form node properties.
///
/// `originalId` links a cloned node back to the template node it was copied
/// from, `parentId` names the node that owns the import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeProperties {
    /// Owner of the import that created this node
    #[serde(rename = "parentId", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Template node this node was cloned from
    #[serde(rename = "originalId", default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<NodeId>,
    /// Set once an import has claimed this node
    #[serde(rename = "isConnected", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_connected: bool,
    /// Everything else
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

impl Rect {
    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Bottom edge
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Check for overlap. Touching edges count as overlapping.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && self.right() >= other.x
            && self.y <= other.bottom()
            && self.bottom() >= other.y
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Instance ID
    pub id: NodeId,
    /// Class tag
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Position in the canvas
    #[serde(default, deserialize_with = "vec2")]
    pub pos: [f32; 2],
    /// Size in the canvas
    #[serde(default, deserialize_with = "vec2")]
    pub size: [f32; 2],
    /// Input slots, position is the slot index
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<InputSlot>,
    /// Output slots, position is the slot index
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<OutputSlot>,
    /// Provenance and free-form properties
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: NodeProperties,
    /// Widget values, positional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets_values: Option<Value>,
    /// Fields this crate does not interpret (flags, colors, mode, ...)
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Node {
    /// Create a new node without slots
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            title: None,
            pos: [0.0, 0.0],
            size: [0.0, 0.0],
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: NodeProperties::default(),
            widgets_values: None,
            extra: IndexMap::new(),
        }
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.pos = [x, y];
        self
    }

    /// Set the size
    pub fn with_size(mut self, w: f32, h: f32) -> Self {
        self.size = [w, h];
        self
    }

    /// Append an input slot
    pub fn with_input(mut self, name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        self.inputs.push(InputSlot::new(name, slot_type));
        self
    }

    /// Append an output slot
    pub fn with_output(mut self, name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        self.outputs.push(OutputSlot::new(name, slot_type));
        self
    }

    /// Get an input slot by index
    pub fn input(&self, index: usize) -> Option<&InputSlot> {
        self.inputs.get(index)
    }

    /// Get an output slot by index
    pub fn output(&self, index: usize) -> Option<&OutputSlot> {
        self.outputs.get(index)
    }

    /// Index of the first input slot with this exact name
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    /// Index of the first output slot with this exact name
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// Index of the first input slot whose name matches ignoring case
    pub fn input_index_ignore_case(&self, name: &str) -> Option<usize> {
        self.inputs
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Forget every slot's link references
    pub fn clear_links(&mut self) {
        for input in &mut self.inputs {
            input.link = None;
        }
        for output in &mut self.outputs {
            output.links.clear();
        }
    }

    /// Bounding box in canvas space
    pub fn bounds(&self) -> Rect {
        Rect {
            x: self.pos[0],
            y: self.pos[1],
            w: self.size[0],
            h: self.size[1],
        }
    }
}
