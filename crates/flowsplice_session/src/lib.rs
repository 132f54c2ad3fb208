// SPDX-License-Identifier: MIT OR Apache-2.0
//! Loader sessions around `flowsplice_graph`.
//!
//! A loader node in a live graph browses a directory of generated images.
//! For the selected image, its embedded workflow becomes a template whose
//! parts are spliced back next to the loader by a render script.
//!
//! ## Architecture
//!
//! - [`config`] holds type sets, margins and debounce delays (RON on disk)
//! - [`store`] is the boundary to the host's image metadata
//! - [`cursor`] tracks the selected image and execution counters
//! - [`debounce`] coalesces rapid triggers, last write wins
//! - [`session`] renders through a typed [`Workspace`]

pub mod config;
pub mod store;
pub mod cursor;
pub mod debounce;
pub mod session;

pub use config::{ConfigError, SessionConfig};
pub use store::{ImageInfo, ImageRecord, MemoryStore, MetadataStore, StoreError};
pub use cursor::{Counters, ImageCursor, IndexMode};
pub use debounce::Debouncer;
pub use session::{annotate_flow, Scope, Session, SessionError, SharedGraph, Trigger, Workspace};
