// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dataflow graph analysis and splicing.
//!
//! Works on node-link documents in the saved-workflow format: nodes with
//! typed input and output slots, joined by links that each carry one value
//! from an output slot to an input slot.
//!
//! ## Architecture
//!
//! - [`resolve`] turns a serialized document into a navigable graph
//! - [`traverse`] layers the flow around a pivot node
//! - [`pipeline`] picks the primary pipeline among pivot candidates
//! - [`extract`] cuts the connected flow of one node out of a document
//! - [`splice`] clones template subgraphs into a live [`Graph`]
//! - [`connect`] wires two live nodes by slot name

mod serde_util;

pub mod slot;
pub mod node;
pub mod link;
pub mod document;
pub mod graph;
pub mod resolve;
pub mod traverse;
pub mod pipeline;
pub mod extract;
pub mod query;
pub mod connect;
pub mod splice;

pub use slot::{InputSlot, OutputSlot, SlotDirection, SlotType};
pub use node::{Node, NodeId, NodeProperties, Rect};
pub use link::{CompactLink, Link, LinkId};
pub use document::{DocumentError, GraphDocument};
pub use graph::{ConnectionError, Graph};
pub use resolve::{resolve, ResolveError, ResolvedGraph, ResolvedLink, ResolvedNode};
pub use traverse::{build_node_map, upstream_nodes, NodeMap};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineSelector};
pub use extract::extract_flow;
pub use query::NodeQuery;
pub use connect::{connect_by_name, resolve_slots, SlotPair};
pub use splice::{Anchor, Axis, SpliceConfig, SpliceError, Splicer};
