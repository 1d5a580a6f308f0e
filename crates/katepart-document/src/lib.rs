#![warn(missing_docs)]
//! `katepart-document` - a rope-backed document that keeps its syntax highlighting current.
//!
//! A [`Document`] owns its text and a per-line cache of [`LineHighlight`] results produced by
//! a shared [`Highlighting`] mode. Lines are highlighted lazily, up to the furthest line
//! anyone asked about. An edit re-highlights the edited lines and then keeps going only
//! while line end states differ from the cached ones, so typing inside a function body
//! touches one line while opening a block comment cascades to the end of the comment.
//!
//! The document also derives fold regions from folding markers and implements word
//! motion on top of the mode's word predicate.
//!
//! ```rust
//! use katepart_document::{Document, Position};
//! use katepart_syntax::Highlighting;
//! use std::sync::Arc;
//!
//! let mut doc = Document::new("foo bar quzzi", Arc::new(Highlighting::none()));
//! assert_eq!(doc.word_right(Position::new(0, 0)), Position::new(0, 4));
//! assert_eq!(doc.word_left(Position::new(0, 13)), Position::new(0, 8));
//! ```
//!
//! [`LineHighlight`]: katepart_syntax::LineHighlight
//! [`Highlighting`]: katepart_syntax::Highlighting

mod document;
mod folding;
mod motion;

pub use document::{CascadeStats, Document, Position};
pub use folding::{FoldRegion, fold_regions};
pub use motion::{WordSource, word_left, word_right};
