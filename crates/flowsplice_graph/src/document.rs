// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized graph documents.
//!
//! A document is the standalone form of a graph as it is embedded in image
//! metadata or exchanged with the editor: a node list, a compact link list
//! (with `null` holes for deleted links) and the id counters.

use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId};
use crate::serde_util::null_as_default;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A graph document in compact form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Highest node id handed out
    #[serde(default)]
    pub last_node_id: i64,
    /// Highest link id handed out
    #[serde(default)]
    pub last_link_id: i64,
    /// Nodes
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<Node>,
    /// Links; `None` marks an empty entry
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: Vec<Option<Link>>,
    /// Groups, config, version and anything else
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl GraphDocument {
    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a document from an already parsed JSON value
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as pretty-printed JSON text
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All present links, skipping empty entries
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().flatten()
    }

    /// Largest node id present
    pub fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.iter().map(|n| n.id).max()
    }

    /// Largest link id present
    pub fn max_link_id(&self) -> Option<LinkId> {
        self.links().map(|l| l.id).max()
    }

    /// Raise the counters to at least the largest ids present
    pub fn normalize_counters(&mut self) {
        if let Some(NodeId(max)) = self.max_node_id() {
            self.last_node_id = self.last_node_id.max(max);
        }
        if let Some(LinkId(max)) = self.max_link_id() {
            self.last_link_id = self.last_link_id.max(max);
        }
    }

    /// Remove every node of `node_type` along with each link touching it.
    ///
    /// Slot references to the removed links are cleared on the surviving
    /// nodes. Returns the removed links.
    pub fn strip_node_type(&mut self, node_type: &str) -> Vec<Link> {
        let removed_nodes: HashSet<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == node_type)
            .map(|n| n.id)
            .collect();
        if removed_nodes.is_empty() {
            return Vec::new();
        }
        self.nodes.retain(|n| !removed_nodes.contains(&n.id));

        let mut removed_links = Vec::new();
        self.links.retain(|entry| match entry {
            Some(link)
                if removed_nodes.contains(&link.origin_id)
                    || removed_nodes.contains(&link.target_id) =>
            {
                removed_links.push(link.clone());
                false
            }
            _ => true,
        });

        let removed_ids: HashSet<LinkId> = removed_links.iter().map(|l| l.id).collect();
        for node in &mut self.nodes {
            for input in &mut node.inputs {
                if input.link.is_some_and(|id| removed_ids.contains(&id)) {
                    input.link = None;
                }
            }
            for output in &mut node.outputs {
                output.links.retain(|id| !removed_ids.contains(id));
            }
        }

        tracing::debug!(
            node_type,
            nodes = removed_nodes.len(),
            links = removed_links.len(),
            "stripped nodes from document"
        );
        removed_links
    }
}

/// Error when decoding or encoding a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Invalid JSON or unexpected shape
    #[error("Invalid graph document: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader_document() -> GraphDocument {
        GraphDocument::from_value(json!({
            "last_node_id": 3,
            "last_link_id": 2,
            "nodes": [
                {"id": 1, "type": "PrimitiveNode",
                 "outputs": [{"name": "STRING", "type": "STRING", "links": [1]}]},
                {"id": 2, "type": "LoadImageWithCMD",
                 "inputs": [{"name": "command", "type": "STRING", "link": 1}],
                 "outputs": [{"name": "IMAGE", "type": "IMAGE", "links": [2]}]},
                {"id": 3, "type": "PreviewImage",
                 "inputs": [{"name": "images", "type": "IMAGE", "link": 2}]}
            ],
            "links": [[1, 1, 0, 2, 0, "STRING"], null, [2, 2, 0, 3, 0, "IMAGE"]],
            "groups": [],
            "version": 0.4
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_keeps_unknown_fields() {
        let doc = loader_document();
        assert_eq!(doc.nodes.len(), 3);
        assert_eq!(doc.links.len(), 3);
        assert_eq!(doc.links().count(), 2);
        assert!(doc.extra.contains_key("groups"));

        let text = doc.to_json_pretty().unwrap();
        let back = GraphDocument::from_json(&text).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_strip_node_type() {
        let mut doc = loader_document();
        let removed = doc.strip_node_type("LoadImageWithCMD");

        assert_eq!(removed.len(), 2);
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.links().count(), 0);
        assert!(doc.node(NodeId(1)).unwrap().outputs[0].links.is_empty());
        assert_eq!(doc.node(NodeId(3)).unwrap().inputs[0].link, None);
    }

    #[test]
    fn test_strip_missing_type_is_noop() {
        let mut doc = loader_document();
        assert!(doc.strip_node_type("SaveImage").is_empty());
        assert_eq!(doc, loader_document());
    }

    #[test]
    fn test_normalize_counters() {
        let mut doc = loader_document();
        doc.last_node_id = 0;
        doc.last_link_id = 7;
        doc.normalize_counters();
        assert_eq!(doc.last_node_id, 3);
        assert_eq!(doc.last_link_id, 7);
    }
}
