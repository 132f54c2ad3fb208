// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cursor over the images of one directory.

use crate::store::{ImageRecord, MetadataStore, StoreError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the index moves after each execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Stay on the current image
    #[default]
    Fixed,
    /// Move to the next image, wrapping at the end
    Increment,
    /// Move to the previous image, wrapping at the start
    Decrement,
    /// Jump to a random image
    Randomize,
}

/// Execution counters, reset whenever the directory or index is changed by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    /// Automatic advances since the last reset
    pub queues: u64,
    /// Times an advance wrapped around the image list
    pub loops: u64,
    /// Failed renders
    pub errors: u64,
}

/// Position within a list of loadable images
#[derive(Debug, Clone, Default)]
pub struct ImageCursor {
    images: Vec<ImageRecord>,
    index: usize,
    mode: IndexMode,
    counters: Counters,
}

impl ImageCursor {
    /// Create a cursor over `images`, keeping only loadable ones
    pub fn new(images: Vec<ImageRecord>) -> Self {
        let mut cursor = Self::default();
        cursor.replace_images(images);
        cursor
    }

    /// Reload from `dir` in `store`. Resets the index and the counters.
    /// Returns how many images are loadable.
    pub fn load(&mut self, store: &dyn MetadataStore, dir: &Path) -> Result<usize, StoreError> {
        let images = store.list_images(dir)?;
        self.replace_images(images);
        tracing::debug!(dir = %dir.display(), count = self.images.len(), "loaded images");
        Ok(self.images.len())
    }

    fn replace_images(&mut self, images: Vec<ImageRecord>) {
        let total = images.len();
        self.images = images.into_iter().filter(|r| r.info.is_loadable()).collect();
        if self.images.len() < total {
            tracing::debug!(skipped = total - self.images.len(), "images without workflow or prompt");
        }
        self.index = 0;
        self.reset_counters();
    }

    /// Loaded images
    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    /// Number of loaded images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Check if no image is loaded
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Current index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Image under the cursor
    pub fn selected(&self) -> Option<&ImageRecord> {
        self.images.get(self.index)
    }

    /// Position of the image named `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.images.iter().position(|r| r.name == name)
    }

    /// Map any index onto the list. Negative indexes count from the end.
    pub fn wrap(&self, index: i64) -> usize {
        match i64::try_from(self.images.len()) {
            Ok(len) if len > 0 => index.rem_euclid(len) as usize,
            _ => 0,
        }
    }

    /// Jump to `index`, wrapped. Counters are left alone.
    pub fn set_index(&mut self, index: i64) -> usize {
        self.index = self.wrap(index);
        self.index
    }

    /// Advance mode
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Change the advance mode
    pub fn set_mode(&mut self, mode: IndexMode) {
        self.mode = mode;
    }

    /// Move according to the mode after an execution and count it.
    /// Returns whether the selected image changed.
    pub fn advance<R: Rng>(&mut self, rng: &mut R) -> bool {
        let previous = self.index;
        let current = previous as i64;
        let requested = match self.mode {
            IndexMode::Fixed => current,
            IndexMode::Increment => current + 1,
            IndexMode::Decrement => current - 1,
            IndexMode::Randomize if self.images.is_empty() => 0,
            IndexMode::Randomize => rng.gen_range(0..self.images.len()) as i64,
        };
        let wrapped = self.set_index(requested) as i64;

        self.counters.queues += 1;
        let looped = match self.mode {
            IndexMode::Increment => wrapped < requested,
            IndexMode::Decrement => wrapped > requested,
            IndexMode::Fixed | IndexMode::Randomize => false,
        };
        if looped {
            self.counters.loops += 1;
        }

        previous != self.index
    }

    /// Counters since the last reset
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Count a failed render
    pub fn record_error(&mut self) {
        self.counters.errors += 1;
    }

    /// Zero all counters
    pub fn reset_counters(&mut self) {
        self.counters = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ImageInfo, MemoryStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn record(path: &str) -> ImageRecord {
        let info = ImageInfo {
            workflow: Some(json!({"nodes": [], "links": []})),
            prompt: Some(json!({})),
            ..ImageInfo::default()
        };
        ImageRecord::new(path, info)
    }

    fn cursor(count: usize) -> ImageCursor {
        ImageCursor::new((0..count).map(|i| record(&format!("/out/{i}.png"))).collect())
    }

    #[test]
    fn test_wrap() {
        let cursor = cursor(3);
        assert_eq!(cursor.wrap(0), 0);
        assert_eq!(cursor.wrap(3), 0);
        assert_eq!(cursor.wrap(7), 1);
        assert_eq!(cursor.wrap(-1), 2);
        assert_eq!(cursor.wrap(-4), 2);
        assert_eq!(ImageCursor::default().wrap(5), 0);
    }

    #[test]
    fn test_increment_counts_loops() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cursor = cursor(2);
        cursor.set_mode(IndexMode::Increment);

        assert!(cursor.advance(&mut rng));
        assert_eq!(cursor.index(), 1);
        assert!(cursor.advance(&mut rng));
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.counters(), Counters { queues: 2, loops: 1, errors: 0 });
    }

    #[test]
    fn test_decrement_wraps_to_end() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cursor = cursor(3);
        cursor.set_mode(IndexMode::Decrement);

        cursor.advance(&mut rng);
        assert_eq!(cursor.index(), 2);
        assert_eq!(cursor.counters().loops, 1);
    }

    #[test]
    fn test_fixed_and_randomize() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut cursor = cursor(4);
        cursor.set_index(2);
        assert!(!cursor.advance(&mut rng));
        assert_eq!(cursor.index(), 2);

        cursor.set_mode(IndexMode::Randomize);
        for _ in 0..20 {
            cursor.advance(&mut rng);
            assert!(cursor.index() < 4);
        }
        assert_eq!(cursor.counters().queues, 21);
        assert_eq!(cursor.counters().loops, 0);
    }

    #[test]
    fn test_load_skips_incomplete_records() {
        let store = MemoryStore::new();
        store.insert(record("/out/a.png"));
        store.insert(ImageRecord::new("/out/b.png", ImageInfo::default()));
        store.insert(record("/out/c.png"));

        let mut cursor = cursor(5);
        cursor.set_index(4);
        cursor.record_error();
        assert_eq!(cursor.load(&store, Path::new("/out")).unwrap(), 2);
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.counters(), Counters::default());
        assert_eq!(cursor.position("c"), Some(1));
        assert_eq!(cursor.selected().unwrap().name, "a");
    }
}
