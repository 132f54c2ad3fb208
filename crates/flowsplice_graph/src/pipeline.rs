// SPDX-License-Identifier: MIT OR Apache-2.0
//! Primary pipeline selection.
//!
//! A graph may hold several terminal steps (pivots). Each one gets a node
//! map; the pivot with the longest map owns the primary pipeline.

use crate::node::NodeId;
use crate::resolve::ResolvedGraph;
use crate::traverse::{build_node_map, NodeMap};
use serde::{Deserialize, Serialize};

/// Node type sets driving pipeline selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Types eligible as pivots (terminal pipeline steps)
    pub pivot_types: Vec<String>,
    /// Types listed as pipeline steps
    pub step_types: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let samplers = vec!["KSampler".to_string(), "KSamplerAdvanced".to_string()];
        Self {
            pivot_types: samplers.clone(),
            step_types: samplers,
        }
    }
}

/// The selected pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Winning pivot
    pub pivot: NodeId,
    /// Node map around the pivot
    pub node_map: NodeMap,
    /// Step nodes in layer order
    pub steps: Vec<NodeId>,
}

impl Pipeline {
    /// The final step, if any
    pub fn last_step(&self) -> Option<NodeId> {
        self.steps.last().copied()
    }
}

/// Picks the primary pipeline of a graph
#[derive(Debug, Clone, Default)]
pub struct PipelineSelector {
    config: PipelineConfig,
}

impl PipelineSelector {
    /// Create a selector for the given type sets
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Type sets in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pivot-eligible nodes, ascending by id
    pub fn candidates(&self, graph: &ResolvedGraph) -> Vec<NodeId> {
        graph.nodes_of_types(&self.config.pivot_types)
    }

    /// Select among explicit candidates.
    ///
    /// The candidate with the strictly longest node map wins; ties go to the
    /// earliest candidate in `candidates`.
    pub fn select(
        &self,
        graph: &ResolvedGraph,
        candidates: &[NodeId],
    ) -> Result<Pipeline, PipelineError> {
        let mut best: Option<(NodeId, NodeMap)> = None;
        for &pivot in candidates {
            let node_map = build_node_map(graph, pivot);
            tracing::debug!(%pivot, layers = node_map.len(), "pivot candidate");
            if best.as_ref().map_or(true, |(_, b)| node_map.len() > b.len()) {
                best = Some((pivot, node_map));
            }
        }

        let (pivot, node_map) = best.ok_or(PipelineError::NoPivotFound)?;
        let steps = self.steps(graph, &node_map);
        Ok(Pipeline {
            pivot,
            node_map,
            steps,
        })
    }

    /// Select among every pivot-eligible node of the graph
    pub fn select_primary(&self, graph: &ResolvedGraph) -> Result<Pipeline, PipelineError> {
        let candidates = self.candidates(graph);
        self.select(graph, &candidates)
    }

    fn steps(&self, graph: &ResolvedGraph, node_map: &NodeMap) -> Vec<NodeId> {
        node_map
            .iter()
            .filter(|id| {
                graph.node(*id).is_some_and(|n| {
                    self.config
                        .step_types
                        .iter()
                        .any(|t| *t == n.node.node_type)
                })
            })
            .collect()
    }
}

/// Error during pipeline selection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// No node matches the pivot type set
    #[error("No pivot node found")]
    NoPivotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GraphDocument;
    use crate::resolve::resolve;
    use serde_json::json;

    /// Two samplers: #10 heads a 2-layer map, #3 sits in a 5-layer chain
    fn two_pipelines() -> ResolvedGraph {
        let latent = |id: i64, link_in: Option<i64>, links_out: Vec<i64>, kind: &str| {
            json!({
                "id": id, "type": kind,
                "inputs": [{"name": "latent", "type": "LATENT", "link": link_in}],
                "outputs": [{"name": "LATENT", "type": "LATENT", "links": links_out}]
            })
        };
        let doc = GraphDocument::from_value(json!({
            "nodes": [
                latent(1, None, vec![1], "EmptyLatentImage"),
                latent(2, Some(1), vec![2], "LatentUpscale"),
                latent(3, Some(2), vec![3], "KSampler"),
                latent(4, Some(3), vec![4], "KSamplerAdvanced"),
                latent(5, Some(4), vec![], "VAEDecode"),
                latent(9, None, vec![9], "EmptyLatentImage"),
                latent(10, Some(9), vec![], "KSampler")
            ],
            "links": [
                [1, 1, 0, 2, 0, "LATENT"], [2, 2, 0, 3, 0, "LATENT"],
                [3, 3, 0, 4, 0, "LATENT"], [4, 4, 0, 5, 0, "LATENT"],
                [9, 9, 0, 10, 0, "LATENT"]
            ]
        }))
        .unwrap();
        resolve(&doc)
    }

    #[test]
    fn test_longest_map_wins() {
        let graph = two_pipelines();
        let selector = PipelineSelector::default();

        let pipeline = selector.select(&graph, &[NodeId(10), NodeId(3)]).unwrap();
        assert_eq!(pipeline.pivot, NodeId(3));
        assert_eq!(pipeline.node_map.len(), 5);
        assert_eq!(pipeline.steps, vec![NodeId(3), NodeId(4)]);
        assert_eq!(pipeline.last_step(), Some(NodeId(4)));
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let graph = two_pipelines();
        let selector = PipelineSelector::default();

        // #3 and #4 sit in the same chain, so their maps have equal length
        let pipeline = selector.select_primary(&graph).unwrap();
        assert_eq!(selector.candidates(&graph), vec![NodeId(3), NodeId(4), NodeId(10)]);
        assert_eq!(pipeline.pivot, NodeId(3));

        let pipeline = selector.select(&graph, &[NodeId(4), NodeId(3)]).unwrap();
        assert_eq!(pipeline.pivot, NodeId(4));
    }

    #[test]
    fn test_no_pivot() {
        let graph = two_pipelines();
        let selector = PipelineSelector::new(PipelineConfig {
            pivot_types: vec!["SamplerCustom".to_string()],
            step_types: Vec::new(),
        });
        assert_eq!(selector.select_primary(&graph), Err(PipelineError::NoPivotFound));
    }
}
