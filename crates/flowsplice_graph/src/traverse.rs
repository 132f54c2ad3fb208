// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered traversal around a pivot node.

use crate::node::NodeId;
use crate::resolve::ResolvedGraph;
use std::collections::{HashMap, HashSet, VecDeque};

/// Layered record of a pivot's ancestors and descendants.
///
/// Ancestor layers come first, farthest first, then the pivot's own layer,
/// then descendant layers nearest first. A node reachable along several
/// paths appears once per path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMap {
    layers: Vec<Vec<NodeId>>,
    pivot_layer: usize,
}

impl NodeMap {
    /// All layers
    pub fn layers(&self) -> &[Vec<NodeId>] {
        &self.layers
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the map is empty (the pivot was not found)
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Index of the layer holding the pivot
    pub fn pivot_layer(&self) -> usize {
        self.pivot_layer
    }

    /// Every entry, layer by layer
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.layers.iter().flatten().copied()
    }

    /// Check if a node appears anywhere in the map
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.iter().any(|id| id == node_id)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Backward,
    Forward,
}

/// Build the node map around `pivot`.
///
/// Walks every resolved input link backward and every resolved output link
/// forward. A node already on the current path ends that branch, so cyclic
/// graphs terminate. An unknown pivot yields an empty map.
pub fn build_node_map(graph: &ResolvedGraph, pivot: NodeId) -> NodeMap {
    if graph.node(pivot).is_none() {
        tracing::debug!(%pivot, "pivot not in graph");
        return NodeMap::default();
    }

    let backward = walk(graph, pivot, Direction::Backward);
    let forward = walk(graph, pivot, Direction::Forward);

    let pivot_layer = backward.len().saturating_sub(1);
    let mut layers: Vec<Vec<NodeId>> = backward.into_iter().skip(1).rev().collect();
    layers.extend(forward);
    NodeMap {
        layers,
        pivot_layer,
    }
}

enum Visit {
    Enter(NodeId, usize),
    Leave(NodeId),
}

/// Depth-first layering from `start`. `path` holds the nodes of the branch
/// being walked.
fn walk(graph: &ResolvedGraph, start: NodeId, direction: Direction) -> Vec<Vec<NodeId>> {
    let mut layers: Vec<Vec<NodeId>> = Vec::new();
    let mut path = HashSet::new();
    let mut stack = vec![Visit::Enter(start, 0)];

    while let Some(visit) = stack.pop() {
        let (node_id, depth) = match visit {
            Visit::Enter(node_id, depth) => (node_id, depth),
            Visit::Leave(node_id) => {
                path.remove(&node_id);
                continue;
            }
        };
        if !path.insert(node_id) {
            tracing::debug!(node = %node_id, "cycle detected, ending branch");
            continue;
        }

        if layers.len() <= depth {
            layers.push(Vec::new());
        }
        layers[depth].push(node_id);

        let next = match direction {
            Direction::Backward => graph.origin_nodes(node_id),
            Direction::Forward => graph.target_nodes(node_id),
        };
        stack.push(Visit::Leave(node_id));
        stack.extend(next.into_iter().rev().map(|id| Visit::Enter(id, depth + 1)));
    }

    layers
}

/// Every transitive origin of `node_id`, breadth first in discovery order.
///
/// Each node is listed once and `node_id` itself is never listed.
pub fn upstream_nodes(graph: &ResolvedGraph, node_id: NodeId) -> Vec<NodeId> {
    let mut origins: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for link in graph.links() {
        if let Some(origin) = link.origin {
            origins.entry(link.link.target_id).or_default().push(origin);
        }
    }

    let mut found = Vec::new();
    let mut seen = HashSet::from([node_id]);
    let mut queue = VecDeque::from([node_id]);

    while let Some(current) = queue.pop_front() {
        for &origin in origins.get(&current).into_iter().flatten() {
            if seen.insert(origin) {
                found.push(origin);
                queue.push_back(origin);
            }
        }
    }

    found
}
