// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link resolution.
//!
//! Turns a compact document into a read-only graph where each input slot
//! holds its link, each output slot holds its departing links in order, and
//! each link knows which of its endpoint nodes actually exist.

use crate::document::GraphDocument;
use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

/// A link with its endpoints checked against the node set
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    /// The link as encoded
    pub link: Link,
    /// Origin node, if it exists
    pub origin: Option<NodeId>,
    /// Target node, if it exists
    pub target: Option<NodeId>,
}

/// A node with resolved slot references
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    /// The node as encoded
    pub node: Node,
    /// Link held by each input slot
    pub inputs: Vec<Option<LinkId>>,
    /// Links departing from each output slot
    pub outputs: Vec<Vec<LinkId>>,
}

impl ResolvedNode {
    /// Node ID
    pub fn id(&self) -> NodeId {
        self.node.id
    }
}

/// A graph whose slot references have been resolved
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    nodes: IndexMap<NodeId, ResolvedNode>,
    links: IndexMap<LinkId, ResolvedLink>,
    last_node_id: i64,
    last_link_id: i64,
    extra: IndexMap<String, Value>,
    diagnostics: Vec<ResolveError>,
}

/// Resolve a compact document. The input is not modified.
///
/// Empty link entries are dropped. Links pointing at missing nodes are kept
/// with the missing endpoint absent and reported in
/// [`ResolvedGraph::diagnostics`].
pub fn resolve(document: &GraphDocument) -> ResolvedGraph {
    let mut graph = ResolvedGraph {
        last_node_id: document.last_node_id,
        last_link_id: document.last_link_id,
        extra: document.extra.clone(),
        ..ResolvedGraph::default()
    };

    let known: HashSet<NodeId> = document.nodes.iter().map(|n| n.id).collect();

    for link in document.links() {
        if graph.links.contains_key(&link.id) {
            continue;
        }
        let origin = known.contains(&link.origin_id).then_some(link.origin_id);
        let target = known.contains(&link.target_id).then_some(link.target_id);
        for (endpoint, present) in [(link.origin_id, origin), (link.target_id, target)] {
            if present.is_none() {
                let err = ResolveError::MalformedLink {
                    link: link.id,
                    node: endpoint,
                };
                tracing::warn!("{err}");
                graph.diagnostics.push(err);
            }
        }
        graph.links.insert(
            link.id,
            ResolvedLink {
                link: link.clone(),
                origin,
                target,
            },
        );
    }

    for node in &document.nodes {
        if graph.nodes.contains_key(&node.id) {
            continue;
        }
        let inputs = node
            .inputs
            .iter()
            .map(|slot| slot.link.filter(|id| graph.links.contains_key(id)))
            .collect();
        let outputs = node
            .outputs
            .iter()
            .map(|slot| {
                slot.links
                    .iter()
                    .copied()
                    .filter(|id| graph.links.contains_key(id))
                    .collect()
            })
            .collect();
        graph.nodes.insert(
            node.id,
            ResolvedNode {
                node: node.clone(),
                inputs,
                outputs,
            },
        );
    }

    graph
}

impl ResolvedGraph {
    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&ResolvedNode> {
        self.nodes.get(&node_id)
    }

    /// Get all nodes in document order
    pub fn nodes(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.values()
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&ResolvedLink> {
        self.links.get(&link_id)
    }

    /// Get all links in document order
    pub fn links(&self) -> impl Iterator<Item = &ResolvedLink> {
        self.links.values()
    }

    /// Malformed references found while resolving
    pub fn diagnostics(&self) -> &[ResolveError] {
        &self.diagnostics
    }

    /// Link held by an input slot
    pub fn input_link(&self, node_id: NodeId, slot: usize) -> Option<&ResolvedLink> {
        let id = (*self.node(node_id)?.inputs.get(slot)?)?;
        self.link(id)
    }

    /// Nodes feeding a node, in input slot order
    pub fn origin_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(node_id) else {
            return Vec::new();
        };
        node.inputs
            .iter()
            .flatten()
            .filter_map(|id| self.link(*id)?.origin)
            .collect()
    }

    /// Nodes consuming a node's outputs, in output slot then link order
    pub fn target_nodes(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.node(node_id) else {
            return Vec::new();
        };
        node.outputs
            .iter()
            .flatten()
            .filter_map(|id| self.link(*id)?.target)
            .collect()
    }

    /// Nodes whose type is in `types`, ascending by id
    pub fn nodes_of_types(&self, types: &[String]) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| types.iter().any(|t| *t == n.node.node_type))
            .map(ResolvedNode::id)
            .collect();
        ids.sort();
        ids
    }

    /// Flatten back into a compact document
    pub fn flatten(&self) -> GraphDocument {
        let nodes = self
            .nodes
            .values()
            .map(|resolved| {
                let mut node = resolved.node.clone();
                for (slot, link) in node.inputs.iter_mut().zip(&resolved.inputs) {
                    slot.link = *link;
                }
                for (slot, links) in node.outputs.iter_mut().zip(&resolved.outputs) {
                    slot.links.clone_from(links);
                }
                node
            })
            .collect();

        GraphDocument {
            last_node_id: self.last_node_id,
            last_link_id: self.last_link_id,
            nodes,
            links: self.links.values().map(|l| Some(l.link.clone())).collect(),
            extra: self.extra.clone(),
        }
    }
}

/// Problems found while resolving links
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// A link endpoint names a node that does not exist
    #[error("Malformed {link}: endpoint node {node} does not exist")]
    MalformedLink {
        /// Offending link
        link: LinkId,
        /// Missing node
        node: NodeId,
    },
}
