// SPDX-License-Identifier: MIT OR Apache-2.0
//! Image metadata store boundary.
//!
//! Images carry the graph document that produced them in text chunks. The
//! host owns file and network access; sessions only see [`MetadataStore`].

use flowsplice_graph::{DocumentError, GraphDocument};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Decoded image metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Full graph document the image was generated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Value>,
    /// Execution prompt sent to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    /// Extracted flow of the node that produced the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<Value>,
    /// Other chunks
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl ImageInfo {
    /// Decode raw text chunks. Chunks holding JSON are parsed, anything
    /// else is kept as a string.
    pub fn from_text_chunks<I, K, V>(chunks: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut info = Self::default();
        for (key, text) in chunks {
            let text = text.as_ref();
            let value = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
            let value = Some(value).filter(|v| !v.is_null());
            match key.into().as_str() {
                "workflow" => info.workflow = value,
                "prompt" => info.prompt = value,
                "flow" => info.flow = value,
                other => {
                    if let Some(value) = value {
                        info.extra.insert(other.to_string(), value);
                    }
                }
            }
        }
        info
    }

    /// Check that both the workflow and the prompt are present
    pub fn is_loadable(&self) -> bool {
        self.workflow.is_some() && self.prompt.is_some()
    }

    /// Graph document to render from: the attached flow if there is one,
    /// otherwise the full workflow. Non-object values are ignored.
    pub fn template_document(&self) -> Result<Option<GraphDocument>, DocumentError> {
        let source = [&self.flow, &self.workflow]
            .into_iter()
            .flatten()
            .find(|v| v.is_object());
        source
            .map(|v| GraphDocument::from_value(v.clone()))
            .transpose()
    }
}

/// One image with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path of the original image
    pub path: PathBuf,
    /// File name without extension
    pub name: String,
    /// Width in pixels
    #[serde(default)]
    pub width: u32,
    /// Height in pixels
    #[serde(default)]
    pub height: u32,
    /// Encoding, e.g. `PNG`
    #[serde(default)]
    pub format: String,
    /// Decoded metadata
    #[serde(default)]
    pub info: ImageInfo,
}

impl ImageRecord {
    /// Create a record named after the file stem of `path`
    pub fn new(path: impl Into<PathBuf>, info: ImageInfo) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            width: 0,
            height: 0,
            format: String::new(),
            info,
        }
    }

    /// Set the dimensions
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Source of images and their metadata
pub trait MetadataStore: Send + Sync {
    /// Every image directly inside `dir`
    fn list_images(&self, dir: &Path) -> Result<Vec<ImageRecord>, StoreError>;

    /// Metadata of a single image
    fn load_metadata(&self, path: &Path) -> Result<ImageRecord, StoreError>;

    /// Replace the metadata of a single image
    fn save_metadata(&self, path: &Path, info: &ImageInfo) -> Result<(), StoreError>;
}

/// In-memory store, images listed in insertion order
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: RwLock<IndexMap<PathBuf, ImageRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an image
    pub fn insert(&self, record: ImageRecord) {
        self.images.write().insert(record.path.clone(), record);
    }

    /// Number of images held
    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }
}

impl MetadataStore for MemoryStore {
    fn list_images(&self, dir: &Path) -> Result<Vec<ImageRecord>, StoreError> {
        Ok(self
            .images
            .read()
            .values()
            .filter(|r| r.path.parent() == Some(dir))
            .cloned()
            .collect())
    }

    fn load_metadata(&self, path: &Path) -> Result<ImageRecord, StoreError> {
        self.images
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn save_metadata(&self, path: &Path, info: &ImageInfo) -> Result<(), StoreError> {
        let mut images = self.images.write();
        let record = images
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
        record.info = info.clone();
        Ok(())
    }
}

/// Error reported by a metadata store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No image at this path
    #[error("Image not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The backing store failed
    #[error("Store backend failed: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_chunks_decoded() {
        let info = ImageInfo::from_text_chunks([
            ("workflow", r#"{"nodes": [], "links": []}"#),
            ("prompt", r#"{"1": {"class_type": "KSampler"}}"#),
            ("parameters", "a photo, 20 steps"),
            ("seed", "42"),
        ]);

        assert_eq!(info.workflow, Some(json!({"nodes": [], "links": []})));
        assert!(info.prompt.is_some());
        assert_eq!(info.extra["parameters"], json!("a photo, 20 steps"));
        assert_eq!(info.extra["seed"], json!(42));
        assert!(info.is_loadable());
    }

    #[test]
    fn test_null_chunk_is_absent() {
        let info = ImageInfo::from_text_chunks([("workflow", "null"), ("prompt", "{}")]);
        assert!(info.workflow.is_none());
        assert!(!info.is_loadable());
    }

    #[test]
    fn test_flow_preferred_over_workflow() {
        let info = ImageInfo {
            workflow: Some(json!({"last_node_id": 9, "nodes": [], "links": []})),
            flow: Some(json!({"last_node_id": 3, "nodes": [], "links": []})),
            ..ImageInfo::default()
        };
        assert_eq!(info.template_document().unwrap().unwrap().last_node_id, 3);

        let info = ImageInfo {
            workflow: Some(json!({"last_node_id": 9, "nodes": [], "links": []})),
            flow: Some(json!("not a graph")),
            ..ImageInfo::default()
        };
        assert_eq!(info.template_document().unwrap().unwrap().last_node_id, 9);

        assert!(ImageInfo::default().template_document().unwrap().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.insert(ImageRecord::new("/out/a.png", ImageInfo::default()));
        store.insert(ImageRecord::new("/out/b.png", ImageInfo::default()));
        store.insert(ImageRecord::new("/other/c.png", ImageInfo::default()));

        let listed = store.list_images(Path::new("/out")).unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        let info = ImageInfo {
            prompt: Some(json!({})),
            ..ImageInfo::default()
        };
        store.save_metadata(Path::new("/out/b.png"), &info).unwrap();
        assert_eq!(store.load_metadata(Path::new("/out/b.png")).unwrap().info, info);

        let err = store.load_metadata(Path::new("/out/z.png")).unwrap_err();
        assert_eq!(err, StoreError::NotFound(PathBuf::from("/out/z.png")));
    }
}
