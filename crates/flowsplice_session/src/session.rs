// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loader sessions.
//!
//! A session belongs to one loader node in a live graph. It walks a
//! directory of generated images and, on each render, splices parts of the
//! selected image's workflow next to the loader through a [`Workspace`].

use crate::config::SessionConfig;
use crate::cursor::{Counters, ImageCursor};
use crate::debounce::Debouncer;
use crate::store::{ImageRecord, MetadataStore, StoreError};
use flowsplice_graph::{
    connect_by_name, extract_flow, resolve, Anchor, ConnectionError, DocumentError, Graph,
    GraphDocument, LinkId, NodeId, NodeQuery, Pipeline, PipelineSelector, ResolvedGraph,
    SpliceError, Splicer,
};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Live graph shared between the host and its sessions
pub type SharedGraph = Arc<Mutex<Graph>>;

/// Something that asks for a re-render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The index was set by hand
    IndexChanged(i64),
    /// The render script changed
    CommandChanged,
}

/// Graph to search in a [`Workspace`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The selected image's workflow
    Template,
    /// The live graph
    Live,
}

/// Session state for one loader node
pub struct Session {
    owner: NodeId,
    live: SharedGraph,
    config: SessionConfig,
    selector: PipelineSelector,
    splicer: Splicer,
    cursor: ImageCursor,
    triggers: Debouncer<Trigger>,
}

impl Session {
    /// Create a session for loader node `owner`
    pub fn new(live: SharedGraph, owner: NodeId, config: SessionConfig) -> Self {
        Self {
            owner,
            live,
            selector: PipelineSelector::new(config.pipeline.clone()),
            splicer: Splicer::new(config.placement),
            cursor: ImageCursor::default(),
            triggers: Debouncer::new(config.index_debounce()),
            config,
        }
    }

    /// The loader node
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Configuration in use
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared live graph
    pub fn live(&self) -> &SharedGraph {
        &self.live
    }

    /// Image cursor
    pub fn cursor(&self) -> &ImageCursor {
        &self.cursor
    }

    /// Mutable image cursor
    pub fn cursor_mut(&mut self) -> &mut ImageCursor {
        &mut self.cursor
    }

    /// Load the images of `dir`
    pub fn load_images(&mut self, store: &dyn MetadataStore, dir: &Path) -> Result<usize, SessionError> {
        Ok(self.cursor.load(store, dir)?)
    }

    /// Load the directory holding `path` and select that image, or the
    /// first one if it is not loadable. Returns the selected index.
    pub fn load_by_path(&mut self, store: &dyn MetadataStore, path: &Path) -> Result<usize, SessionError> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
        self.cursor.load(store, dir)?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let index = self.cursor.position(&name).unwrap_or(0);
        Ok(self.cursor.set_index(index as i64))
    }

    /// Remove every node imported on behalf of this session
    pub fn clear(&self) -> usize {
        let removed = self.live.lock().remove_nodes_with_parent(self.owner);
        if removed > 0 {
            tracing::debug!(owner = %self.owner, removed, "cleared imports");
        }
        removed
    }

    /// Template for the selected image, if it has one
    pub fn template(&self) -> Result<Option<ResolvedGraph>, SessionError> {
        match self.cursor.selected() {
            Some(image) => template_for(image, &self.config),
            None => Ok(None),
        }
    }

    /// Queue a re-render, superseding any pending one
    pub fn schedule(&mut self, trigger: Trigger, now: Instant) -> Uuid {
        let delay = match trigger {
            Trigger::IndexChanged(_) => self.config.index_debounce(),
            Trigger::CommandChanged => self.config.command_debounce(),
        };
        self.triggers.schedule_after(trigger, delay, now)
    }

    /// Ticket of the pending re-render
    pub fn pending(&self) -> Option<Uuid> {
        self.triggers.pending()
    }

    /// Release a due re-render.
    ///
    /// Index changes are applied to the cursor here, and reset the counters.
    /// The caller renders when a trigger comes back.
    pub fn poll(&mut self, now: Instant) -> Option<Trigger> {
        let (ticket, trigger) = self.triggers.poll(now)?;
        if let Trigger::IndexChanged(index) = trigger {
            self.cursor.reset_counters();
            self.cursor.set_index(index);
        }
        tracing::debug!(owner = %self.owner, %ticket, ?trigger, "trigger released");
        Some(trigger)
    }

    /// Advance the cursor after an execution finished. Returns whether the
    /// selected image changed.
    pub fn on_executed<R: Rng>(&mut self, rng: &mut R) -> bool {
        self.cursor.advance(rng)
    }

    /// Render the selected image.
    ///
    /// Clears earlier imports, prepares the template and its primary
    /// pipeline, then runs `script` against a [`Workspace`]. If `script`
    /// fails the live graph is put back as it was before the render and the
    /// error counter goes up. Returns `None` when there is nothing to render.
    pub fn render_with<F, R>(&mut self, script: F) -> Result<Option<R>, SessionError>
    where
        F: FnOnce(&mut Workspace<'_>) -> Result<R, SessionError>,
    {
        let Some(image) = self.cursor.selected() else {
            tracing::debug!(owner = %self.owner, "no image selected");
            return Ok(None);
        };
        let Some(template) = template_for(image, &self.config)? else {
            tracing::debug!(owner = %self.owner, image = %image.path.display(), "image has no workflow");
            return Ok(None);
        };
        let pipeline = match self.selector.select_primary(&template) {
            Ok(pipeline) => Some(pipeline),
            Err(err) => {
                tracing::debug!(owner = %self.owner, "{err}");
                None
            }
        };

        let live = Arc::clone(&self.live);
        let mut graph = live.lock();
        let owner = graph
            .node(self.owner)
            .ok_or(SessionError::OwnerNotFound(self.owner))?;
        let anchor = self.splicer.anchor_right_of(owner);
        let snapshot = (*graph).clone();
        graph.remove_nodes_with_parent(self.owner);

        let result = {
            let mut workspace = Workspace {
                live: &mut *graph,
                template: &template,
                pipeline: pipeline.as_ref(),
                splicer: &self.splicer,
                anchor,
                image,
                index: self.cursor.index(),
                image_count: self.cursor.len(),
                counters: self.cursor.counters(),
            };
            script(&mut workspace)
        };

        match result {
            Ok(value) => {
                tracing::info!(owner = %self.owner, nodes = graph.node_count(), "rendered");
                Ok(Some(value))
            }
            Err(err) => {
                *graph = snapshot;
                self.cursor.record_error();
                tracing::warn!(owner = %self.owner, "render failed, graph restored: {err}");
                Err(err)
            }
        }
    }
}

fn template_for(image: &ImageRecord, config: &SessionConfig) -> Result<Option<ResolvedGraph>, SessionError> {
    let Some(mut document) = image.info.template_document()? else {
        return Ok(None);
    };
    for node_type in &config.excluded_types {
        document.strip_node_type(node_type);
    }

    let template = resolve(&document);
    if !template.diagnostics().is_empty() {
        tracing::warn!(
            image = %image.path.display(),
            count = template.diagnostics().len(),
            "template has malformed links"
        );
    }
    Ok(Some(template))
}

/// Attach the flow of `node` to the metadata of the image at `path`.
///
/// The flow is extracted from the image's workflow and stored as `flow`,
/// which later renders prefer over the full workflow.
pub fn annotate_flow(
    store: &dyn MetadataStore,
    path: &Path,
    node: NodeId,
) -> Result<GraphDocument, SessionError> {
    let mut record = store.load_metadata(path)?;
    let workflow = record
        .info
        .workflow
        .clone()
        .ok_or_else(|| SessionError::NoWorkflow(path.to_path_buf()))?;
    let flow = extract_flow(&GraphDocument::from_value(workflow)?, node);

    record.info.flow = Some(serde_json::to_value(&flow).map_err(DocumentError::from)?);
    store.save_metadata(path, &record.info)?;
    tracing::debug!(path = %path.display(), %node, nodes = flow.nodes.len(), "flow attached");
    Ok(flow)
}

/// Everything a render script may touch
pub struct Workspace<'a> {
    live: &'a mut Graph,
    template: &'a ResolvedGraph,
    pipeline: Option<&'a Pipeline>,
    splicer: &'a Splicer,
    anchor: Anchor,
    image: &'a ImageRecord,
    index: usize,
    image_count: usize,
    counters: Counters,
}

impl Workspace<'_> {
    /// Selected image
    pub fn image(&self) -> &ImageRecord {
        self.image
    }

    /// Index of the selected image
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of loaded images
    pub fn image_count(&self) -> usize {
        self.image_count
    }

    /// Counters at render time
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Primary pipeline of the template, if it has a pivot
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline
    }

    /// Pipeline steps in layer order
    pub fn steps(&self) -> &[NodeId] {
        match self.pipeline {
            Some(pipeline) => pipeline.steps.as_slice(),
            None => &[],
        }
    }

    /// Final pipeline step
    pub fn last_step(&self) -> Option<NodeId> {
        self.pipeline.and_then(Pipeline::last_step)
    }

    /// Template graph
    pub fn template(&self) -> &ResolvedGraph {
        self.template
    }

    /// Live graph
    pub fn live(&self) -> &Graph {
        self.live
    }

    /// Where imports land
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    /// First matching node. Template searches follow the pipeline's node
    /// map when there is one.
    pub fn find(&self, query: impl Into<NodeQuery>, scope: Scope) -> Option<NodeId> {
        let query = query.into();
        match (scope, self.pipeline) {
            (Scope::Live, _) => self.live.find(&query),
            (Scope::Template, Some(pipeline)) => pipeline.node_map.find(self.template, &query),
            (Scope::Template, None) => self
                .template
                .nodes()
                .find(|n| query.matches(&n.node))
                .map(|n| n.id()),
        }
    }

    /// Last matching node
    pub fn find_last(&self, query: impl Into<NodeQuery>, scope: Scope) -> Option<NodeId> {
        let query = query.into();
        match (scope, self.pipeline) {
            (Scope::Live, _) => self.live.find_last(&query),
            (Scope::Template, Some(pipeline)) => pipeline.node_map.find_last(self.template, &query),
            (Scope::Template, None) => self
                .template
                .nodes()
                .filter(|n| query.matches(&n.node))
                .last()
                .map(|n| n.id()),
        }
    }

    /// Link two live nodes by slot name
    pub fn connect(&mut self, from: NodeId, to: NodeId, name: &str) -> Option<LinkId> {
        connect_by_name(self.live, from, to, name)
    }

    /// Import template nodes next to the loader
    pub fn import_subgraph(&mut self, nodes: &[NodeId], replacements: &[NodeId]) -> Vec<NodeId> {
        self.splicer
            .import_subgraph(self.live, self.template, nodes, &self.anchor, replacements)
    }

    /// Import whatever feeds input `slot` of template node `src` and wire
    /// it into the same input of live node `dst`
    pub fn import_input(
        &mut self,
        src: NodeId,
        dst: NodeId,
        slot: &str,
        replacements: &[NodeId],
    ) -> Result<Vec<NodeId>, SessionError> {
        Ok(self.splicer.import_input(
            self.live,
            self.template,
            src,
            dst,
            slot,
            &self.anchor,
            replacements,
        )?)
    }

    /// Widget values of a node
    pub fn values(&self, node: NodeId, scope: Scope) -> Option<&Value> {
        match scope {
            Scope::Template => self.template.node(node)?.node.widgets_values.as_ref(),
            Scope::Live => self.live.node(node)?.widgets_values.as_ref(),
        }
    }

    /// Replace the widget values of a live node
    pub fn set_values(&mut self, node: NodeId, values: Value) -> Result<(), SessionError> {
        let target = self
            .live
            .node_mut(node)
            .ok_or(SessionError::NodeNotFound(node))?;
        target.widgets_values = Some(values);
        Ok(())
    }
}

/// Error during a session operation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Metadata store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Workflow could not be decoded
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Explicit splice request failed
    #[error(transparent)]
    Splice(#[from] SpliceError),

    /// Explicit connection failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The loader node is gone from the live graph
    #[error("Loader node not found: {0}")]
    OwnerNotFound(NodeId),

    /// Live node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Image carries no workflow
    #[error("Image has no workflow: {}", .0.display())]
    NoWorkflow(PathBuf),

    /// A render script gave up
    #[error("Render aborted: {0}")]
    Aborted(String),
}
