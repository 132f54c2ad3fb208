// SPDX-License-Identifier: MIT OR Apache-2.0
//! Name and type directed wiring between two nodes.

use crate::graph::Graph;
use crate::link::LinkId;
use crate::node::{Node, NodeId};

/// A resolved output/input slot pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPair {
    /// Output slot index on the origin node
    pub output: usize,
    /// Input slot index on the target node
    pub input: usize,
}

/// Pick the slots to wire `from` into `to` for `name`.
///
/// If `from` has an output called `name`, the first unconnected input of
/// `to` with a compatible type is used, whatever its name. Otherwise, if
/// `to` has an input called `name`, the first output of `from` with a
/// compatible type is used.
pub fn resolve_slots(from: &Node, to: &Node, name: &str) -> Option<SlotPair> {
    if let Some(output) = from.output_index(name) {
        let slot_type = &from.outputs[output].slot_type;
        let input = to
            .inputs
            .iter()
            .position(|i| !i.is_connected() && slot_type.can_connect_to(&i.slot_type))?;
        return Some(SlotPair { output, input });
    }

    let input = to.input_index(name)?;
    let slot_type = &to.inputs[input].slot_type;
    let output = from
        .outputs
        .iter()
        .position(|o| o.slot_type.can_connect_to(slot_type))?;
    Some(SlotPair { output, input })
}

/// Wire `from` into `to` for `name`, replacing whatever occupied the input.
///
/// Connection is opportunistic: when no usable pair exists nothing happens
/// and `None` is returned.
pub fn connect_by_name(graph: &mut Graph, from: NodeId, to: NodeId, name: &str) -> Option<LinkId> {
    let pair = resolve_slots(graph.node(from)?, graph.node(to)?, name);
    let Some(SlotPair { output, input }) = pair else {
        tracing::debug!(%from, %to, name, "no matching slots");
        return None;
    };

    match graph.connect(from, output, to, input) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::debug!(%from, %to, name, "connect skipped: {err}");
            None
        }
    }
}
