// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.
//!
//! On the wire a link is the compact 6-tuple
//! `[id, origin_id, origin_slot, target_id, target_slot, type]`.
//! The object form some exporters emit is accepted as well.

use crate::node::NodeId;
use crate::slot::SlotType;
use serde::{Deserialize, Serialize};

/// Identifier for a link, unique within one graph instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(pub i64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link {}", self.0)
    }
}

/// Compact wire encoding of a link
pub type CompactLink = (LinkId, NodeId, usize, NodeId, usize, SlotType);

/// A directed link from an output slot to an input slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LinkRecord", into = "CompactLink")]
pub struct Link {
    /// Link ID
    pub id: LinkId,
    /// Data type, matching both endpoint slots
    pub link_type: SlotType,
    /// Source node
    pub origin_id: NodeId,
    /// Index into the source node's outputs
    pub origin_slot: usize,
    /// Target node
    pub target_id: NodeId,
    /// Index into the target node's inputs
    pub target_slot: usize,
}

impl Link {
    /// Create a new link
    pub fn new(
        id: LinkId,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
        link_type: impl Into<SlotType>,
    ) -> Self {
        Self {
            id,
            link_type: link_type.into(),
            origin_id,
            origin_slot,
            target_id,
            target_slot,
        }
    }

    /// Check if this link touches a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.origin_id == node_id || self.target_id == node_id
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkRecord {
    Compact(CompactLink),
    Object {
        id: LinkId,
        #[serde(rename = "type", default)]
        link_type: SlotType,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    },
}

impl From<LinkRecord> for Link {
    fn from(record: LinkRecord) -> Self {
        match record {
            LinkRecord::Compact((id, origin_id, origin_slot, target_id, target_slot, link_type)) => {
                Self::new(id, origin_id, origin_slot, target_id, target_slot, link_type)
            }
            LinkRecord::Object {
                id,
                link_type,
                origin_id,
                origin_slot,
                target_id,
                target_slot,
            } => Self::new(id, origin_id, origin_slot, target_id, target_slot, link_type),
        }
    }
}

impl From<Link> for CompactLink {
    fn from(link: Link) -> Self {
        (
            link.id,
            link.origin_id,
            link.origin_slot,
            link.target_id,
            link.target_slot,
            link.link_type,
        )
    }
}
