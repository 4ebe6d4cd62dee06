//! Marcador
//!
//! Reflow-stable reading locations for chaptered documents, plus a position
//! tracker that keeps "resume reading" and bookmarks pointing at the right
//! place after the chapter is re-rendered.
//!
//! # Modules
//!
//! - `tree`: Tree capability interface and the in-memory chapter tree (XHTML loader)
//! - `location`: Location model, canonical string codec, generation, resolution, validation
//! - `tracker`: Viewport-driven position tracking, debouncing and save/restore
//! - `store`: Persistence collaborators for saved positions and reading sessions
//! - `config`: Runtime configuration

pub mod config;
pub mod error;
pub mod location;
pub mod store;
pub mod tracker;
pub mod tree;

pub use config::Config;
pub use error::{Error, Result};
pub use location::{
    parse, serialize, Generator, GeneratorOptions, Location, LocationBuilder, LocationError,
    LocationParseError, PathSegment, RangeLocation, SegmentKind, Validator,
};
pub use store::{FileStore, MemoryStore, PositionStore};
pub use tracker::{PositionChangeEvent, PositionTracker, ReadingPosition, Renderer};
pub use tree::{ChapterTree, DocumentTree, NodeFilter, NodeId, NodeKind};
