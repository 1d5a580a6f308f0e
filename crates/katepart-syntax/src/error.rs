use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors produced by the definition loader/compiler and the highlight manager.
pub enum HighlightError {
    #[error("YAML parse error: {0}")]
    /// YAML parsing failed.
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    /// Filesystem I/O failed.
    Io(#[from] std::io::Error),

    #[error("syntax definition not found: {0}")]
    /// No definition with this name (or for this file) is known.
    GrammarNotFound(String),

    #[error("invalid syntax definition '{name}': {reason}")]
    /// A definition was found but cannot be used.
    GrammarInvalid {
        /// Name of the offending definition.
        name: String,
        /// Human-readable explanation.
        reason: String,
    },

    #[error("regex compile error for pattern '{pattern}': {message}")]
    /// A rule regex failed to compile.
    RegexCompile {
        /// The regex pattern string.
        pattern: String,
        /// The compiler error message.
        message: String,
    },

    #[error("unknown keyword list '{0}'")]
    /// A `keyword` rule references a list that does not exist.
    UnknownKeywordList(String),

    #[error("include_rules cycle detected involving '{0}'")]
    /// `include_rules` entries formed a cycle.
    RuleIncludeCycle(String),

    #[error("override store error: {0}")]
    /// The override store could not be opened.
    ConfigStore(#[from] ConfigStoreError),
}

#[derive(Debug, Error)]
/// Errors produced by override stores.
pub enum ConfigStoreError {
    #[error("I/O error: {0}")]
    /// Reading or writing the backing file failed.
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    /// The backing file is not a valid store document.
    Yaml(#[from] serde_yaml::Error),
}

/// A recoverable problem noticed while compiling or scanning.
///
/// Diagnostics never abort highlighting; they are logged and collected next to the
/// result they affected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Diagnostic {
    /// A context switch targets a context that does not exist.
    DanglingContextReference {
        /// Context in which the switch fired.
        context: String,
        /// The unresolved target, as written in the definition or as a raw index.
        target: String,
    },
    /// A rule matched without consuming input or changing the stack.
    ZeroProgressMatch {
        /// Context in which the match happened.
        context: String,
        /// Column (in chars) where the match happened.
        column: usize,
    },
    /// The context stack hit its depth cap and dropped its oldest entries.
    UnboundedContextStackGrowth {
        /// The configured cap.
        max_depth: usize,
    },
    /// A persisted override entry had fewer fields than expected.
    MalformedPersistedOverride {
        /// Attribute display name.
        attribute: String,
        /// Number of fields actually present.
        fields: usize,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingContextReference { context, target } => {
                write!(f, "context '{context}' switches to unknown context '{target}'")
            }
            Self::ZeroProgressMatch { context, column } => {
                write!(f, "zero-width match in context '{context}' at column {column}")
            }
            Self::UnboundedContextStackGrowth { max_depth } => {
                write!(f, "context stack exceeded {max_depth} entries")
            }
            Self::MalformedPersistedOverride { attribute, fields } => {
                write!(f, "override for '{attribute}' has only {fields} fields")
            }
        }
    }
}
