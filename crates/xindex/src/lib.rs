//! xindex — an index processor.
//!
//! Takes a *raw index* (a stream of `(indexentry …)` records produced by a
//! typesetter) plus a *style* written in a small Lisp-flavoured DSL, and
//! produces a formatted, human-readable index document.
//!
//! The pipeline:
//!
//! 1. [`sexpr`] parses both inputs into a tagged [`Value`](sexpr::Value)
//!    tree.
//! 2. [`eval::StyleEvaluator`] materialises the style into an immutable
//!    [`style::StyleState`]: base types, location classes, attributes,
//!    letter groups, rewrite rules, crossref classes, markup templates.
//! 3. [`raw`] loads the raw entries.
//! 4. [`index::build_index`] matches every location against the configured
//!    location classes and merges the entries into a sorted hierarchical
//!    tree with ranges and cross-references.
//! 5. [`render::render_index`] walks the tree and emits the final text,
//!    driven by the style's markup templates.
//!
//! # Example
//! ```
//! use xindex::{eval::StyleEvaluator, index::build_index, raw, render::render_index};
//!
//! let mut evaluator = StyleEvaluator::new();
//! evaluator
//!     .eval_inline(r#"(define-location-class "pages" ("arabic-numbers"))"#)
//!     .unwrap();
//! let state = evaluator.into_state();
//! let entries = raw::parse_raw_index(r#"(indexentry :key ("apple") :locref "5")"#).unwrap();
//! let index = build_index(&entries, &state).unwrap();
//! assert_eq!(render_index(&index, &state), "A\napple 5\n");
//! ```

pub mod basetype;
pub mod error;
pub mod eval;
pub mod index;
pub mod locclass;
pub mod locref;
pub mod markup;
pub mod modules;
pub mod raw;
pub mod render;
pub mod rules;
pub mod sexpr;
pub mod style;

pub use crate::{
    error::{
        IndexBuilderError, LocationMatchError, ModuleNotFound, StyleError, SyntaxError,
        XindexError, XindexResult,
    },
    eval::StyleEvaluator,
    index::{Index, build_index, build_index_with},
    raw::{RawEntry, parse_raw_index, read_raw_file},
    render::{RenderConfig, render_index, render_index_with},
    style::StyleState,
};
