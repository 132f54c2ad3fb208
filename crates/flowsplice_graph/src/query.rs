// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node lookup by id or by name.

use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::resolve::ResolvedGraph;
use crate::traverse::NodeMap;

/// A node query.
///
/// A name matches when it equals the node's title ignoring case, or the
/// node's type with whitespace removed ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeQuery {
    /// Exact node id
    Id(NodeId),
    /// Title or type name
    Name(String),
}

impl NodeQuery {
    /// Check if a node matches this query
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::Id(id) => node.id == *id,
            Self::Name(name) => {
                let name = name.to_lowercase();
                node.title.as_ref().is_some_and(|t| t.to_lowercase() == name)
                    || compact_lowercase(&node.node_type) == name
            }
        }
    }
}

fn compact_lowercase(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl From<NodeId> for NodeQuery {
    fn from(id: NodeId) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for NodeQuery {
    fn from(id: i64) -> Self {
        Self::Id(NodeId(id))
    }
}

impl From<&str> for NodeQuery {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for NodeQuery {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl NodeMap {
    /// First matching node scanning from the farthest ancestor layer
    pub fn find(&self, graph: &ResolvedGraph, query: &NodeQuery) -> Option<NodeId> {
        self.iter().find(|id| matches_in(graph, *id, query))
    }

    /// First matching node scanning from the farthest descendant layer
    pub fn find_last(&self, graph: &ResolvedGraph, query: &NodeQuery) -> Option<NodeId> {
        self.iter().rev().find(|id| matches_in(graph, *id, query))
    }
}

fn matches_in(graph: &ResolvedGraph, id: NodeId, query: &NodeQuery) -> bool {
    graph.node(id).is_some_and(|n| query.matches(&n.node))
}

impl Graph {
    /// First live node matching the query, in insertion order
    pub fn find(&self, query: &NodeQuery) -> Option<NodeId> {
        match query {
            NodeQuery::Id(id) => self.contains_node(*id).then_some(*id),
            NodeQuery::Name(_) => self.nodes().find(|n| query.matches(n)).map(|n| n.id),
        }
    }

    /// Last live node matching the query, in insertion order
    pub fn find_last(&self, query: &NodeQuery) -> Option<NodeId> {
        match query {
            NodeQuery::Id(_) => self.find(query),
            NodeQuery::Name(_) => self.nodes().filter(|n| query.matches(n)).last().map(|n| n.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineSelector;
    use crate::resolve::resolve;
    use crate::GraphDocument;
    use serde_json::json;

    #[test]
    fn test_name_matching() {
        let node = Node::new(4, "CLIP Text Encode").with_title("Positive Prompt");
        assert!(NodeQuery::from("positive prompt").matches(&node));
        assert!(NodeQuery::from("cliptextencode").matches(&node));
        assert!(NodeQuery::from("ClipTextEncode").matches(&node));
        assert!(!NodeQuery::from("clip text encode").matches(&node));
        assert!(NodeQuery::from(4).matches(&node));
    }

    #[test]
    fn test_find_and_find_last_in_node_map() {
        let doc = GraphDocument::from_value(json!({
            "nodes": [
                {"id": 1, "type": "KSampler",
                 "outputs": [{"name": "LATENT", "type": "LATENT", "links": [1]}]},
                {"id": 2, "type": "KSampler",
                 "inputs": [{"name": "latent_image", "type": "LATENT", "link": 1}],
                 "outputs": [{"name": "LATENT", "type": "LATENT", "links": [2]}]},
                {"id": 3, "type": "VAEDecode",
                 "inputs": [{"name": "samples", "type": "LATENT", "link": 2}]}
            ],
            "links": [[1, 1, 0, 2, 0, "LATENT"], [2, 2, 0, 3, 0, "LATENT"]]
        }))
        .unwrap();
        let graph = resolve(&doc);
        let pipeline = PipelineSelector::default().select_primary(&graph).unwrap();

        let sampler = NodeQuery::from("ksampler");
        assert_eq!(pipeline.node_map.find(&graph, &sampler), Some(NodeId(1)));
        assert_eq!(pipeline.node_map.find_last(&graph, &sampler), Some(NodeId(2)));
        assert_eq!(pipeline.node_map.find(&graph, &NodeQuery::from("SaveImage")), None);
    }

    #[test]
    fn test_find_in_live_graph() {
        let mut graph = Graph::new();
        graph.add_node(Node::new(1, "Load Image"));
        graph.add_node(Node::new(2, "SaveImage").with_title("Output"));

        assert_eq!(graph.find(&NodeQuery::from("loadimage")), Some(NodeId(1)));
        assert_eq!(graph.find(&NodeQuery::from("output")), Some(NodeId(2)));
        assert_eq!(graph.find(&NodeQuery::from(7)), None);
    }

    #[test]
    fn test_find_last_in_live_graph() {
        let mut graph = Graph::new();
        graph.add_node(Node::new(1, "KSampler"));
        graph.add_node(Node::new(2, "VAEDecode"));
        graph.add_node(Node::new(3, "KSampler"));

        let sampler = NodeQuery::from("ksampler");
        assert_eq!(graph.find(&sampler), Some(NodeId(1)));
        assert_eq!(graph.find_last(&sampler), Some(NodeId(3)));
        assert_eq!(graph.find_last(&NodeQuery::from(2)), Some(NodeId(2)));
    }
}
