#![warn(missing_docs)]
//! `katepart-syntax` - incremental, context-stack based syntax highlighting.
//!
//! Syntax definitions are YAML documents describing named contexts, each an ordered list of
//! matching rules. A definition and every definition it references are compiled into one
//! [`Highlighting`] mode, which highlights a document line by line: each call takes the
//! state left by the previous line and returns attribute spans, folding markers and the new
//! state, so an edit only re-highlights lines until the state converges again.
//!
//! The crate also answers contextual questions (which context is active at a column, is a
//! character part of a word, which comment tokens apply), resolves attributes against
//! schemas and persists per-schema attribute overrides.
//!
//! ```rust
//! use katepart_syntax::{Highlighting, SyntaxDefinition};
//!
//! let yaml = r###"
//! name: Ini
//! contexts:
//!   - name: Normal
//!     attribute: Normal Text
//!     rules:
//!       - detect_char: ";"
//!         attribute: Comment
//!         context: Comment
//!   - name: Comment
//!     attribute: Comment
//!     line_end: "#pop"
//! formats:
//!   - name: Normal Text
//!   - name: Comment
//!     style: comment
//! "###;
//! let mode = Highlighting::from_definition(SyntaxDefinition::from_yaml_str(yaml)?)?;
//! let line = mode.highlight_line(None, "key=1 ; note", None);
//! assert_eq!(line.spans.len(), 2);
//! assert!(line.state.is_initial());
//! # Ok::<(), katepart_syntax::HighlightError>(())
//! ```

mod compiler;
mod config;
mod context;
mod definition;
mod error;
mod format;
mod highlighter;
mod manager;
mod persistence;
mod prefix_store;
mod property;
mod query;
mod repository;
mod schema;

pub use config::EngineConfig;
pub use context::{
    Context, ContextId, ContextSwitch, ContextTarget, FALLBACK_CONTEXT, Matcher, RegionId, Rule,
};
pub use definition::{
    CharacterEncoding, CommentSettings, EncodingSettings, KeywordSettings, MultiLineComment,
    RawContext, RawFormat, RawRule, RuleKind, SingleLineComment, SyntaxDefinition,
};
pub use error::{ConfigStoreError, Diagnostic, HighlightError};
pub use format::{AttributeIndex, Format, FormatRegistry};
pub use highlighter::{
    AttributeSpan, ContextChange, DEFAULT_MAX_CONTEXT_DEPTH, FoldingKind, FoldingMarker,
    HighlightOutcome, HighlightState, Highlighting, LineHighlight, ModeInfo, NO_HIGHLIGHTING,
};
pub use manager::HighlightManager;
pub use persistence::{
    ConfigStore, FileConfigStore, MemoryConfigStore, load_overrides, override_group,
    override_key, save_overrides,
};
pub use prefix_store::PrefixStore;
pub use property::{
    CommentMarkers, DEFAULT_HL_KEY, EncodedCharactersInsertionPolicy, HighlightPropertyBag,
    STD_DELIMINATOR, SingleLineCommentPosition,
};
pub use query::LineSource;
pub use repository::Repository;
pub use schema::{Attribute, DefaultStyle, ResolvedStyle, Rgb, Schema, TextStyle};
