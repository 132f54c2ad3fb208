// SPDX-License-Identifier: MIT OR Apache-2.0
//! Live graph: the mutable model imports are spliced into.

use crate::document::GraphDocument;
use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId};
use crate::slot::{SlotDirection, SlotType};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashMap;

/// A mutable node graph.
///
/// Slot link references are kept coherent with the link table: every link
/// is listed on its origin output and occupies its target input.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in insertion order
    nodes: IndexMap<NodeId, Node>,
    /// Links in creation order
    links: IndexMap<LinkId, Link>,
    /// Highest node id handed out
    last_node_id: i64,
    /// Highest link id handed out
    last_link_id: i64,
    /// Nodes by `originalId` tag
    origins: HashMap<NodeId, IndexSet<NodeId>>,
    /// Document fields carried through untouched
    extra: IndexMap<String, Value>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a live graph from a document.
    ///
    /// Links whose endpoints do not resolve, and links competing for an
    /// input that is already taken, are dropped.
    pub fn from_document(document: &GraphDocument) -> Self {
        let mut graph = Self {
            last_node_id: document.last_node_id,
            last_link_id: document.last_link_id,
            extra: document.extra.clone(),
            ..Self::default()
        };

        for node in &document.nodes {
            if graph.nodes.contains_key(&node.id) {
                tracing::warn!(node = %node.id, "duplicate node id in document, keeping the first");
                continue;
            }
            let mut node = node.clone();
            node.clear_links();
            graph.insert(node);
        }

        for link in document.links() {
            if graph.links.contains_key(&link.id) {
                tracing::warn!(link = %link.id, "duplicate link id in document, keeping the first");
                continue;
            }
            if let Err(err) = graph.validate_endpoints(link) {
                tracing::warn!(link = %link.id, "dropping link: {err}");
                continue;
            }
            let occupied = graph.nodes[&link.target_id].inputs[link.target_slot].link;
            if let Some(existing) = occupied {
                tracing::warn!(link = %link.id, %existing, "dropping link into an occupied input");
                continue;
            }
            graph.attach(link.clone());
        }

        graph.last_link_id = graph
            .links
            .keys()
            .map(|id| id.0)
            .fold(graph.last_link_id, i64::max);
        graph
    }

    /// Export as a standalone document
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            last_node_id: self.last_node_id,
            last_link_id: self.last_link_id,
            nodes: self.nodes.values().cloned().collect(),
            links: self.links.values().cloned().map(Some).collect(),
            extra: self.extra.clone(),
        }
    }

    /// Highest node id handed out so far
    pub fn last_node_id(&self) -> i64 {
        self.last_node_id
    }

    /// Highest link id handed out so far
    pub fn last_link_id(&self) -> i64 {
        self.last_link_id
    }

    /// Reserve a fresh node id
    pub fn next_node_id(&mut self) -> NodeId {
        self.last_node_id += 1;
        NodeId(self.last_node_id)
    }

    fn next_link_id(&mut self) -> LinkId {
        self.last_link_id += 1;
        LinkId(self.last_link_id)
    }

    /// Add a node to the graph.
    ///
    /// The node arrives unlinked. If its id is already taken a fresh one is
    /// assigned. Returns the id the node was stored under.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        if self.nodes.contains_key(&node.id) {
            node.id = self.next_node_id();
        }
        node.clear_links();
        self.insert(node)
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.last_node_id = self.last_node_id.max(id.0);
        if let Some(original) = node.properties.original_id {
            self.origins.entry(original).or_default().insert(id);
        }
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let touching: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.involves_node(node_id))
            .map(|l| l.id)
            .collect();
        for link_id in touching {
            self.disconnect(link_id);
        }

        let node = self.nodes.shift_remove(&node_id)?;
        if let Some(original) = node.properties.original_id {
            if let Some(ids) = self.origins.get_mut(&original) {
                ids.shift_remove(&node_id);
                if ids.is_empty() {
                    self.origins.remove(&original);
                }
            }
        }
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    ///
    /// Slot link references and the `originalId` tag are managed by the
    /// graph; edit position, size, title and widget values through this.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Check if a node exists
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes cloned from template node `original`, oldest first
    pub fn nodes_with_origin(&self, original: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.origins
            .get(&original)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |id| {
                self.nodes
                    .get(id)
                    .is_some_and(|n| n.properties.original_id == Some(original))
            })
    }

    /// Nodes imported on behalf of `parent`
    pub fn nodes_with_parent(&self, parent: NodeId) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.properties.parent_id == Some(parent))
            .map(|n| n.id)
            .collect()
    }

    /// Remove every node imported on behalf of `parent`. Returns how many.
    pub fn remove_nodes_with_parent(&mut self, parent: NodeId) -> usize {
        let ids = self.nodes_with_parent(parent);
        for id in &ids {
            self.remove_node(*id);
        }
        ids.len()
    }

    /// Connect an output slot to an input slot.
    ///
    /// A link already occupying the input is replaced.
    pub fn connect(
        &mut self,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    ) -> Result<LinkId, ConnectionError> {
        let origin = self
            .nodes
            .get(&origin_id)
            .ok_or(ConnectionError::NodeNotFound(origin_id))?;
        let target = self
            .nodes
            .get(&target_id)
            .ok_or(ConnectionError::NodeNotFound(target_id))?;

        let output = origin.output(origin_slot).ok_or(ConnectionError::SlotNotFound {
            node: origin_id,
            direction: SlotDirection::Output,
            index: origin_slot,
        })?;
        let input = target.input(target_slot).ok_or(ConnectionError::SlotNotFound {
            node: target_id,
            direction: SlotDirection::Input,
            index: target_slot,
        })?;

        if !output.slot_type.can_connect_to(&input.slot_type) {
            return Err(ConnectionError::IncompatibleTypes {
                output: output.slot_type.clone(),
                input: input.slot_type.clone(),
            });
        }

        if origin_id == target_id {
            return Err(ConnectionError::SelfLoop(origin_id));
        }

        let link_type = output.slot_type.clone();
        let occupied = input.link;
        if let Some(existing) = occupied {
            self.disconnect(existing);
        }

        let id = self.next_link_id();
        self.attach(Link::new(id, origin_id, origin_slot, target_id, target_slot, link_type));
        Ok(id)
    }

    fn attach(&mut self, link: Link) {
        if let Some(output) = self
            .nodes
            .get_mut(&link.origin_id)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            output.links.push(link.id);
        }
        if let Some(input) = self
            .nodes
            .get_mut(&link.target_id)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            input.link = Some(link.id);
        }
        self.links.insert(link.id, link);
    }

    fn validate_endpoints(&self, link: &Link) -> Result<(), ConnectionError> {
        let origin = self
            .nodes
            .get(&link.origin_id)
            .ok_or(ConnectionError::NodeNotFound(link.origin_id))?;
        let target = self
            .nodes
            .get(&link.target_id)
            .ok_or(ConnectionError::NodeNotFound(link.target_id))?;
        if origin.output(link.origin_slot).is_none() {
            return Err(ConnectionError::SlotNotFound {
                node: link.origin_id,
                direction: SlotDirection::Output,
                index: link.origin_slot,
            });
        }
        if target.input(link.target_slot).is_none() {
            return Err(ConnectionError::SlotNotFound {
                node: link.target_id,
                direction: SlotDirection::Input,
                index: link.target_slot,
            });
        }
        Ok(())
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        let link = self.links.shift_remove(&link_id)?;
        if let Some(output) = self
            .nodes
            .get_mut(&link.origin_id)
            .and_then(|n| n.outputs.get_mut(link.origin_slot))
        {
            output.links.retain(|id| *id != link_id);
        }
        if let Some(input) = self
            .nodes
            .get_mut(&link.target_id)
            .and_then(|n| n.inputs.get_mut(link.target_slot))
        {
            if input.link == Some(link_id) {
                input.link = None;
            }
        }
        Some(link)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Links touching a node
    pub fn links_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.involves_node(node_id))
    }

    /// Links arriving at a node
    pub fn links_into(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.target_id == node_id)
    }

    /// Links departing from a node
    pub fn links_from(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.origin_id == node_id)
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

/// Error when creating a link in a live graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Slot index out of range
    #[error("{direction:?} slot {index} not found on node {node}")]
    SlotNotFound {
        /// Node the slot was looked up on
        node: NodeId,
        /// Input or output
        direction: SlotDirection,
        /// Requested index
        index: usize,
    },

    /// Incompatible slot types
    #[error("Incompatible slot types: {output} -> {input}")]
    IncompatibleTypes {
        /// Output slot type
        output: SlotType,
        /// Input slot type
        input: SlotType,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed on node {0}")]
    SelfLoop(NodeId),
}
