// SPDX-License-Identifier: MIT OR Apache-2.0
//! Splicing template subgraphs into a live graph.
//!
//! An import clones template nodes next to an anchor, keeps the links among
//! them, pushes the clones clear of existing nodes, folds clones of template
//! nodes that were imported before onto the earlier copies, and finally
//! wires substituted replacement nodes in.

use crate::connect::connect_by_name;
use crate::graph::{ConnectionError, Graph};
use crate::node::{Node, NodeId, Rect};
use crate::resolve::ResolvedGraph;
use crate::traverse::upstream_nodes;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Smallest configured displacement step
const MIN_MARGIN: f32 = 1.0;

/// Placement settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpliceConfig {
    /// Horizontal gap between nodes
    pub margin_x: f32,
    /// Vertical gap between nodes
    pub margin_y: f32,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        Self {
            margin_x: 30.0,
            margin_y: 60.0,
        }
    }
}

/// Where an import lands and on whose behalf
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Node owning the import; clones are tagged with it as `parentId`
    pub owner: NodeId,
    /// Top-left corner for the imported layout
    pub position: [f32; 2],
}

/// Axis along which collisions are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Push right
    Horizontal,
    /// Push down
    Vertical,
}

#[derive(Debug, Clone, Copy)]
enum Rewire {
    /// Template link into a substituted node, now landing on the replacement
    Incoming {
        origin: NodeId,
        origin_slot: usize,
        replacement: NodeId,
        target_slot: usize,
    },
    /// Template link out of a substituted node, now leaving the replacement
    Outgoing {
        replacement: NodeId,
        origin_slot: usize,
        target: NodeId,
        target_slot: usize,
    },
}

/// Result of one splice: imported nodes in template order, and where each
/// template node ended up (clone, earlier copy or replacement)
struct Splice {
    imported: Vec<NodeId>,
    placed: IndexMap<NodeId, NodeId>,
}

/// Clones template subgraphs into live graphs
#[derive(Debug, Clone, Default)]
pub struct Splicer {
    config: SpliceConfig,
}

impl Splicer {
    /// Create a splicer with the given placement settings
    pub fn new(config: SpliceConfig) -> Self {
        Self { config }
    }

    /// Placement settings in use
    pub fn config(&self) -> &SpliceConfig {
        &self.config
    }

    /// Anchor to the right of `owner`, top aligned
    pub fn anchor_right_of(&self, owner: &Node) -> Anchor {
        let b = owner.bounds();
        Anchor {
            owner: owner.id,
            position: [b.right() + self.config.margin_x, b.y],
        }
    }

    /// Anchor below `owner`, left aligned
    pub fn anchor_below(&self, owner: &Node) -> Anchor {
        let b = owner.bounds();
        Anchor {
            owner: owner.id,
            position: [b.x, b.bottom() + self.config.margin_y],
        }
    }

    /// Import `nodes` from `template` into `live`.
    ///
    /// Template nodes whose type matches an unused entry of `replacements`
    /// (live node ids) are not cloned; their links are redirected onto the
    /// replacement instead. Returns the live node standing for each imported
    /// template node, in template order. Unknown ids are skipped.
    pub fn import_subgraph(
        &self,
        live: &mut Graph,
        template: &ResolvedGraph,
        nodes: &[NodeId],
        anchor: &Anchor,
        replacements: &[NodeId],
    ) -> Vec<NodeId> {
        self.splice(live, template, nodes, anchor, replacements).imported
    }

    fn splice(
        &self,
        live: &mut Graph,
        template: &ResolvedGraph,
        nodes: &[NodeId],
        anchor: &Anchor,
        replacements: &[NodeId],
    ) -> Splice {
        let mut available: Vec<(NodeId, String)> = replacements
            .iter()
            .filter_map(|id| live.node(*id).map(|n| (n.id, n.node_type.clone())))
            .collect();
        let mut placed = IndexMap::new();
        let mut rewires = Vec::new();
        let mut to_clone = Vec::new();

        let unique: IndexSet<NodeId> = nodes.iter().copied().collect();
        for id in unique {
            let Some(node) = template.node(id) else {
                tracing::warn!(node = %id, "template node not found, skipping");
                continue;
            };

            let slot = available
                .iter()
                .position(|(_, node_type)| *node_type == node.node.node_type);
            let Some(slot) = slot else {
                to_clone.push(node);
                continue;
            };

            let (replacement, _) = available.remove(slot);
            tracing::debug!(template = %id, %replacement, "substituting live node");
            placed.insert(id, replacement);
            for link in node.inputs.iter().flatten().filter_map(|l| template.link(*l)) {
                rewires.push(Rewire::Incoming {
                    origin: link.link.origin_id,
                    origin_slot: link.link.origin_slot,
                    replacement,
                    target_slot: link.link.target_slot,
                });
            }
            for link in node.outputs.iter().flatten().filter_map(|l| template.link(*l)) {
                rewires.push(Rewire::Outgoing {
                    replacement,
                    origin_slot: link.link.origin_slot,
                    target: link.link.target_id,
                    target_slot: link.link.target_slot,
                });
            }
        }

        if to_clone.is_empty() {
            return Splice {
                imported: Vec::new(),
                placed,
            };
        }

        // Clone, keeping the template layout relative to the anchor
        let left = to_clone.iter().map(|n| n.node.pos[0]).fold(f32::INFINITY, f32::min);
        let top = to_clone.iter().map(|n| n.node.pos[1]).fold(f32::INFINITY, f32::min);
        let mut clones: IndexMap<NodeId, NodeId> = IndexMap::new();
        for resolved in &to_clone {
            let mut node = resolved.node.clone();
            node.id = live.next_node_id();
            node.pos = [
                anchor.position[0] + node.pos[0] - left,
                anchor.position[1] + node.pos[1] - top,
            ];
            node.properties.original_id = Some(resolved.id());
            node.properties.parent_id = Some(anchor.owner);
            node.properties.is_connected = true;
            clones.insert(resolved.id(), live.add_node(node));
        }

        for link in template.links() {
            let (Some(&origin), Some(&target)) =
                (clones.get(&link.link.origin_id), clones.get(&link.link.target_id))
            else {
                continue;
            };
            if let Err(err) =
                live.connect(origin, link.link.origin_slot, target, link.link.target_slot)
            {
                tracing::warn!(link = %link.link.id, "could not copy template link: {err}");
            }
        }

        for &id in clones.values() {
            self.resolve_collisions(live, id, Axis::Vertical);
        }

        // Fold clones onto copies imported earlier
        let mut imported = Vec::with_capacity(clones.len());
        for (&original, &clone) in &clones {
            let existing = live.nodes_with_origin(original).find(|id| *id != clone);
            let id = match existing {
                Some(existing) => {
                    tracing::debug!(%clone, %existing, "merging duplicate import");
                    merge_into(live, clone, existing);
                    existing
                }
                None => clone,
            };
            placed.insert(original, id);
            imported.push(id);
        }

        for rewire in rewires {
            let (origin, origin_slot, target, target_slot) = match rewire {
                Rewire::Incoming {
                    origin,
                    origin_slot,
                    replacement,
                    target_slot,
                } => match placed.get(&origin) {
                    Some(&origin) => (origin, origin_slot, replacement, target_slot),
                    None => continue,
                },
                Rewire::Outgoing {
                    replacement,
                    origin_slot,
                    target,
                    target_slot,
                } => match placed.get(&target) {
                    Some(&target) => (replacement, origin_slot, target, target_slot),
                    None => continue,
                },
            };
            rewire_link(live, origin, origin_slot, target, target_slot);
        }

        Splice { imported, placed }
    }

    /// Import the chain feeding input `slot` of template node `src` and
    /// wire it into the same-named input of live node `dst`.
    ///
    /// `src` and `dst` must share a type. Returns the imported nodes, the
    /// node nearest `dst` last. An unconnected source input imports nothing.
    pub fn import_input(
        &self,
        live: &mut Graph,
        template: &ResolvedGraph,
        src: NodeId,
        dst: NodeId,
        slot: &str,
        anchor: &Anchor,
        replacements: &[NodeId],
    ) -> Result<Vec<NodeId>, SpliceError> {
        let source = template
            .node(src)
            .ok_or(SpliceError::TemplateNodeNotFound(src))?;
        let destination = live.node(dst).ok_or(SpliceError::LiveNodeNotFound(dst))?;
        if source.node.node_type != destination.node_type {
            return Err(SpliceError::TypeMismatch {
                template: src,
                template_type: source.node.node_type.clone(),
                live: dst,
                live_type: destination.node_type.clone(),
            });
        }

        let input = source
            .node
            .input_index_ignore_case(slot)
            .ok_or_else(|| SpliceError::unresolved(src, slot))?;
        let Some(link) = template.input_link(src, input) else {
            return Ok(Vec::new());
        };
        let Some(origin) = link.origin else {
            return Ok(Vec::new());
        };

        let mut chain = vec![origin];
        chain.extend(upstream_nodes(template, origin));
        let mut splice = self.splice(live, template, &chain, anchor, replacements);
        if splice.imported.is_empty() {
            return Ok(Vec::new());
        }
        let live_origin = splice
            .placed
            .get(&origin)
            .copied()
            .ok_or(SpliceError::LiveNodeNotFound(origin))?;

        let origin_name = template
            .node(origin)
            .and_then(|n| n.node.output(link.link.origin_slot))
            .map(|o| o.name.clone());
        let origin_node = live
            .node(live_origin)
            .ok_or(SpliceError::LiveNodeNotFound(live_origin))?;
        let origin_slot = origin_name
            .as_deref()
            .and_then(|name| origin_node.output_index(name))
            .or_else(|| {
                origin_node
                    .outputs
                    .iter()
                    .position(|o| o.slot_type == link.link.link_type)
            })
            .ok_or_else(|| SpliceError::unresolved(live_origin, origin_name.as_deref().unwrap_or(slot)))?;

        let destination = live.node(dst).ok_or(SpliceError::LiveNodeNotFound(dst))?;
        let target_slot = destination
            .input_index(slot)
            .or_else(|| destination.input_index_ignore_case(slot))
            .ok_or_else(|| SpliceError::unresolved(dst, slot))?;
        live.connect(live_origin, origin_slot, dst, target_slot)?;

        splice.imported.reverse();
        Ok(splice.imported)
    }

    /// Push `node_id` along `axis` until it overlaps no other node.
    ///
    /// Each pass scans every node and moves the target past any overlap;
    /// passes repeat until one moves nothing.
    pub fn resolve_collisions(&self, live: &mut Graph, node_id: NodeId, axis: Axis) {
        let Some(node) = live.node(node_id) else {
            return;
        };
        let mut bounds = node.bounds();
        let margin = match axis {
            Axis::Horizontal => self.config.margin_x,
            Axis::Vertical => self.config.margin_y,
        }
        .max(MIN_MARGIN);

        let mut moved = true;
        'scan: while moved {
            moved = false;
            for other in live.nodes().filter(|n| n.id != node_id) {
                let b: Rect = other.bounds();
                if !b.overlaps(&bounds) {
                    continue;
                }
                let (edge, coord) = match axis {
                    Axis::Horizontal => (b.right(), &mut bounds.x),
                    Axis::Vertical => (b.bottom(), &mut bounds.y),
                };
                // Past the edge even when the margin rounds away.
                let mut next = edge + margin;
                if next <= edge {
                    next = next_up(edge);
                }
                if next <= *coord {
                    tracing::warn!(node = %node_id, position = *coord, "collision push out of range");
                    break 'scan;
                }
                *coord = next;
                moved = true;
            }
        }

        let target = [bounds.x, bounds.y];
        if let Some(node) = live.node_mut(node_id) {
            if node.pos != target {
                tracing::debug!(node = %node_id, from = ?node.pos, to = ?target, "resolved collision");
                node.pos = target;
            }
        }
    }
}

/// Smallest `f32` greater than `x`, or `x` itself at infinity or NaN
fn next_up(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    f32::from_bits(if x > 0.0 { bits + 1 } else { bits - 1 })
}

/// Re-point every link touching `from` onto `into`, then drop `from`
fn merge_into(live: &mut Graph, from: NodeId, into: NodeId) {
    let touching: Vec<_> = live.links_for_node(from).cloned().collect();
    for link in touching {
        live.disconnect(link.id);
        let (origin, target) = match (link.origin_id == from, link.target_id == from) {
            (true, false) => (into, link.target_id),
            (false, true) => (link.origin_id, into),
            _ => continue,
        };
        if let Err(err) = live.connect(origin, link.origin_slot, target, link.target_slot) {
            tracing::debug!(link = %link.id, "dropped while merging: {err}");
        }
    }
    live.remove_node(from);
}

/// Connect exactly as queued, falling back to name/type resolution when the
/// queued slot indexes do not fit the live nodes
fn rewire_link(live: &mut Graph, origin: NodeId, origin_slot: usize, target: NodeId, target_slot: usize) {
    let err = match live.connect(origin, origin_slot, target, target_slot) {
        Ok(_) => return,
        Err(err) => err,
    };

    let name = live
        .node(origin)
        .and_then(|n| n.output(origin_slot))
        .map(|o| o.name.clone())
        .or_else(|| {
            live.node(target)
                .and_then(|n| n.input(target_slot))
                .map(|i| i.name.clone())
        });
    let linked = name.is_some_and(|name| connect_by_name(live, origin, target, &name).is_some());
    if !linked {
        tracing::debug!(%origin, %target, "replacement rewire skipped: {err}");
    }
}

/// Error during an explicit splice request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpliceError {
    /// Substitution between nodes of different types
    #[error("Type mismatch: template node {template} is {template_type}, live node {live} is {live_type}")]
    TypeMismatch {
        /// Template node
        template: NodeId,
        /// Template node type
        template_type: String,
        /// Live node
        live: NodeId,
        /// Live node type
        live_type: String,
    },

    /// Named slot absent where it is needed
    #[error("Slot {slot:?} not found on node {node}")]
    UnresolvedSlot {
        /// Node searched
        node: NodeId,
        /// Slot name
        slot: String,
    },

    /// Template node not found
    #[error("Template node not found: {0}")]
    TemplateNodeNotFound(NodeId),

    /// Live node not found
    #[error("Live node not found: {0}")]
    LiveNodeNotFound(NodeId),

    /// Final connection refused by the live graph
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl SpliceError {
    fn unresolved(node: NodeId, slot: &str) -> Self {
        Self::UnresolvedSlot {
            node,
            slot: slot.to_string(),
        }
    }
}
