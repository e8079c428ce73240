//! Index building: entry materialisation, sorting, letter grouping,
//! hierarchy assembly, and range detection.

mod builder;
mod grouping;
mod models;
mod ranges;

pub use builder::{build_index, build_index_with};
pub use models::{Crossref, Index, IndexEntry, IndexNode, LetterGroup, RangeRef};
