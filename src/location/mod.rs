//! Location addressing
//!
//! A Location is a compact, re-render-proof address of a point inside one
//! chapter:
//!
//! - `types` - the data model and canonical serializer
//! - `parser` - the string decoder
//! - `generator` - live position → Location
//! - `resolver` - Location → live position
//! - `validator` - drift detection via content fingerprints
//! - `comparator` - document-order comparison

mod comparator;
pub mod fingerprint;
mod generator;
mod parser;
mod resolver;
mod types;
mod validator;

pub use comparator::{compare, compare_strings, is_after, is_before, is_in_range};
pub use generator::{Generator, GeneratorOptions, Geometry, LocationError, Rect};
pub use parser::{parse, try_parse, LocationParseError};
pub use resolver::{resolve, resolve_range, text_content, ResolvedLocation, ResolvedRange, TextSnippet};
pub use types::{
    serialize, Location, LocationBuilder, PathSegment, RangeLocation, SegmentKind, TextRange,
    LOCATION_PREFIX,
};
pub use validator::{DriftPolicy, Validation, Validator};

/// Length of `text` in characters
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Characters `[from, to)` of `text`, clipped to its length
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> String {
    if to <= from {
        return String::new();
    }
    text.chars().skip(from).take(to - from).collect()
}
