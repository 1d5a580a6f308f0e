use crate::property::{EncodedCharactersInsertionPolicy, SingleLineCommentPosition};
use crate::schema::{DefaultStyle, Rgb};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
/// Raw YAML syntax definition, as written in a definition file.
pub struct SyntaxDefinition {
    /// Internal (untranslated) name; also the key used for `##Name` references.
    pub name: String,

    #[serde(default)]
    /// User-visible name.
    pub translated_name: Option<String>,

    #[serde(default)]
    /// Menu section (e.g. `Sources`, `Markup`).
    pub section: String,

    #[serde(default)]
    /// User-visible section.
    pub translated_section: Option<String>,

    #[serde(default)]
    /// Whether this definition is hidden from mode pickers.
    pub hidden: bool,

    #[serde(default = "default_version")]
    /// Definition version.
    pub version: u32,

    #[serde(default)]
    /// Preferred indenter style.
    pub style: Option<String>,

    #[serde(default)]
    /// Author line.
    pub author: Option<String>,

    #[serde(default)]
    /// License identifier.
    pub license: Option<String>,

    #[serde(default)]
    /// File globs (`*.c`, `Makefile`) associated with this definition.
    pub extensions: Vec<String>,

    #[serde(default)]
    /// Folding follows indentation rather than region markers.
    pub indentation_sensitive: bool,

    #[serde(default)]
    /// Keyword lists referenced by `keyword` rules.
    pub lists: HashMap<String, Vec<String>>,

    /// Contexts in declaration order. The first one is the initial context.
    pub contexts: Vec<RawContext>,

    #[serde(default)]
    /// Formats (item data) in declaration order.
    pub formats: Vec<RawFormat>,

    #[serde(default)]
    /// Comment markers.
    pub comments: CommentSettings,

    #[serde(default)]
    /// Keyword/delimiter settings.
    pub keywords: KeywordSettings,

    #[serde(default)]
    /// Patterns for lines that count as empty.
    pub empty_lines: Vec<String>,

    #[serde(default)]
    /// Character encoding table.
    pub encodings: EncodingSettings,

    #[serde(skip)]
    /// Where the definition was loaded from, if it came from disk.
    pub file_path: Option<PathBuf>,
}

fn default_version() -> u32 {
    1
}

fn default_stay() -> String {
    "#stay".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
/// A context entry.
pub struct RawContext {
    /// Context name, unique within the definition.
    pub name: String,

    /// Format name applied to text no rule claims.
    pub attribute: String,

    #[serde(default = "default_stay")]
    /// Switch applied at the end of every line.
    pub line_end: String,

    #[serde(default)]
    /// Switch applied to empty lines (falls back to `line_end`).
    pub line_empty: Option<String>,

    #[serde(default)]
    /// Switch applied when no rule matches, without consuming input.
    pub fallthrough: Option<String>,

    #[serde(default)]
    /// Rules in match order.
    pub rules: Vec<RawRule>,
}

#[derive(Debug, Clone, Deserialize)]
/// A format (item data) entry.
pub struct RawFormat {
    /// Display name; rules and contexts refer to formats by this name.
    pub name: String,

    #[serde(default)]
    /// Explicit registry id. Defaults to `<definition>:<name>`.
    pub id: Option<String>,

    #[serde(default)]
    /// Default style class.
    pub style: DefaultStyle,

    #[serde(default)]
    /// Foreground color.
    pub color: Option<Rgb>,

    #[serde(default)]
    /// Foreground color for selected text.
    pub selected_color: Option<Rgb>,

    #[serde(default)]
    /// Background color.
    pub background_color: Option<Rgb>,

    #[serde(default)]
    /// Background color for selected text.
    pub selected_background_color: Option<Rgb>,

    #[serde(default)]
    /// Bold override.
    pub bold: Option<bool>,

    #[serde(default)]
    /// Italic override.
    pub italic: Option<bool>,

    #[serde(default)]
    /// Underline override.
    pub underline: Option<bool>,

    #[serde(default)]
    /// Strike-out override.
    pub strikeout: Option<bool>,

    #[serde(default)]
    /// Font family override.
    pub font_family: Option<String>,

    #[serde(default = "default_true")]
    /// Whether text with this format is spell checked.
    pub spellcheck: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
/// `comments:` block.
pub struct CommentSettings {
    #[serde(default)]
    /// Single-line comment marker.
    pub single_line: Option<SingleLineComment>,

    #[serde(default)]
    /// Multi-line comment markers.
    pub multi_line: Option<MultiLineComment>,
}

#[derive(Debug, Clone, Deserialize)]
/// Single-line comment marker.
pub struct SingleLineComment {
    /// The marker (e.g. `//`).
    pub marker: String,

    #[serde(default)]
    /// Where the marker is inserted when commenting out a line.
    pub position: SingleLineCommentPosition,
}

#[derive(Debug, Clone, Deserialize)]
/// Multi-line comment markers.
pub struct MultiLineComment {
    /// Start marker (e.g. `/*`).
    pub start: String,
    /// End marker (e.g. `*/`).
    pub end: String,
    #[serde(default)]
    /// Folding region used by the comment.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
/// `keywords:` block.
pub struct KeywordSettings {
    #[serde(default = "default_true")]
    /// Whether keyword lists match case sensitively.
    pub case_sensitive: bool,

    #[serde(default)]
    /// Characters removed from the default delimiter set.
    pub weak_deliminator: String,

    #[serde(default)]
    /// Characters added to the default delimiter set.
    pub additional_deliminator: String,

    #[serde(default)]
    /// Characters where soft wrapping may break. Defaults to the delimiter set.
    pub word_wrap_deliminator: Option<String>,
}

impl Default for KeywordSettings {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            weak_deliminator: String::new(),
            additional_deliminator: String::new(),
            word_wrap_deliminator: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
/// `encodings:` block.
pub struct EncodingSettings {
    #[serde(default)]
    /// How typed characters with an encoding are inserted.
    pub policy: EncodedCharactersInsertionPolicy,

    #[serde(default)]
    /// Escape sequence to character table.
    pub entries: Vec<CharacterEncoding>,
}

#[derive(Debug, Clone, Deserialize)]
/// One encoding entry, e.g. `\"a` for `ä`.
pub struct CharacterEncoding {
    /// The character.
    #[serde(rename = "char")]
    pub character: char,
    /// The literal escape sequence.
    pub string: String,
}

#[derive(Debug, Clone, PartialEq)]
/// The matching part of a rule.
pub enum RuleKind {
    /// A single character.
    DetectChar(char),
    /// Two consecutive characters.
    Detect2Chars(char, char),
    /// Any one character from the set.
    AnyChar(String),
    /// A literal string.
    StringDetect(String),
    /// A literal string bounded by delimiters on both sides.
    WordDetect(String),
    /// An Oniguruma regex anchored at the current position.
    RegExpr(String),
    /// A word from the named keyword list.
    Keyword(String),
    /// A decimal integer.
    Int,
    /// A floating point literal.
    Float,
    /// A C string escape (`\n`, `\x41`, `\017`, ...).
    HlCStringChar,
    /// Text from the first character up to and including the second one, on one line.
    RangeDetect(char, char),
    /// The continuation character at the very end of the line.
    LineContinue(char),
    /// A run of whitespace.
    DetectSpaces,
    /// `[A-Za-z_][A-Za-z0-9_]*`.
    DetectIdentifier,
    /// Splice in the rules of another context.
    IncludeRules(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RuleFields {
    #[serde(default)]
    attribute: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    lookahead: bool,
    #[serde(default)]
    first_non_space: bool,
    #[serde(default)]
    column: Option<usize>,
    #[serde(default)]
    begin_region: Option<String>,
    #[serde(default)]
    end_region: Option<String>,
    #[serde(default)]
    insensitive: bool,
}

#[derive(Debug, Clone)]
/// A single rule entry in a context.
pub struct RawRule {
    /// What the rule matches.
    pub kind: RuleKind,
    /// Format name for the match; the context attribute if unset.
    pub attribute: Option<String>,
    /// Context switch; `#stay` if unset.
    pub context: Option<String>,
    /// Match without consuming.
    pub lookahead: bool,
    /// Only match at the first non-space character of the line.
    pub first_non_space: bool,
    /// Only match at this column.
    pub column: Option<usize>,
    /// Folding region opened by the match.
    pub begin_region: Option<String>,
    /// Folding region closed by the match.
    pub end_region: Option<String>,
    /// Case-insensitive string/keyword/regex matching.
    pub insensitive: bool,
}

const RULE_KINDS: &[&str] = &[
    "detect_char",
    "detect_2chars",
    "any_char",
    "string",
    "word",
    "regex",
    "keyword",
    "int",
    "float",
    "hl_c_string_char",
    "range",
    "line_continue",
    "detect_spaces",
    "detect_identifier",
    "include_rules",
];

impl<'de> Deserialize<'de> for RawRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Value::Mapping(map) = &value else {
            return Err(serde::de::Error::custom("rules must be YAML mappings"));
        };

        let mut found = None;
        for key in RULE_KINDS {
            if let Some(v) = map.get(Value::String((*key).to_string())) {
                if found.is_some() {
                    return Err(serde::de::Error::custom(
                        "a rule must have exactly one rule kind",
                    ));
                }
                found = Some((*key, v.clone()));
            }
        }
        let Some((key, arg)) = found else {
            return Err(serde::de::Error::custom(format!(
                "rule has no rule kind (expected one of {})",
                RULE_KINDS.join(", ")
            )));
        };

        let kind = parse_kind(key, arg).map_err(serde::de::Error::custom)?;
        let fields: RuleFields =
            serde_yaml::from_value(value.clone()).map_err(serde::de::Error::custom)?;

        Ok(Self {
            kind,
            attribute: fields.attribute,
            context: fields.context,
            lookahead: fields.lookahead,
            first_non_space: fields.first_non_space,
            column: fields.column,
            begin_region: fields.begin_region,
            end_region: fields.end_region,
            insensitive: fields.insensitive,
        })
    }
}

fn parse_kind(key: &str, arg: Value) -> Result<RuleKind, String> {
    let text = || -> Result<String, String> {
        match &arg {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(format!("'{key}' expects a string argument")),
        }
    };

    let kind = match key {
        "detect_char" => RuleKind::DetectChar(exactly_one(key, &text()?)?),
        "detect_2chars" => {
            let (a, b) = exactly_two(key, &text()?)?;
            RuleKind::Detect2Chars(a, b)
        }
        "any_char" => RuleKind::AnyChar(non_empty(key, text()?)?),
        "string" => RuleKind::StringDetect(non_empty(key, text()?)?),
        "word" => RuleKind::WordDetect(non_empty(key, text()?)?),
        "regex" => RuleKind::RegExpr(non_empty(key, text()?)?),
        "keyword" => RuleKind::Keyword(non_empty(key, text()?)?),
        "include_rules" => RuleKind::IncludeRules(non_empty(key, text()?)?),
        "range" => {
            let (a, b) = exactly_two(key, &text()?)?;
            RuleKind::RangeDetect(a, b)
        }
        "line_continue" => match &arg {
            Value::Null | Value::Bool(true) => RuleKind::LineContinue('\\'),
            _ => RuleKind::LineContinue(exactly_one(key, &text()?)?),
        },
        "int" => RuleKind::Int,
        "float" => RuleKind::Float,
        "hl_c_string_char" => RuleKind::HlCStringChar,
        "detect_spaces" => RuleKind::DetectSpaces,
        "detect_identifier" => RuleKind::DetectIdentifier,
        other => return Err(format!("unknown rule kind '{other}'")),
    };
    Ok(kind)
}

fn non_empty(key: &str, s: String) -> Result<String, String> {
    if s.is_empty() {
        return Err(format!("'{key}' needs a non-empty argument"));
    }
    Ok(s)
}

fn exactly_one(key: &str, s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("'{key}' expects exactly one character, got '{s}'")),
    }
}

fn exactly_two(key: &str, s: &str) -> Result<(char, char), String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(format!("'{key}' expects exactly two characters, got '{s}'")),
    }
}

impl SyntaxDefinition {
    /// Parses a definition from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Names of the definitions this one refers to via `##Name` references.
    ///
    /// Order of first appearance, duplicates removed, own name included if self-referenced.
    pub fn referenced_definitions(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut note = |reference: &str| {
            if let Some((_, def)) = reference.split_once("##") {
                let def = def.trim();
                if !def.is_empty() && !out.iter().any(|d| d == def) {
                    out.push(def.to_string());
                }
            }
        };

        for ctx in &self.contexts {
            note(&ctx.line_end);
            if let Some(s) = &ctx.line_empty {
                note(s);
            }
            if let Some(s) = &ctx.fallthrough {
                note(s);
            }
            for rule in &ctx.rules {
                if let Some(s) = &rule.context {
                    note(s);
                }
                if let RuleKind::IncludeRules(target) = &rule.kind {
                    note(target);
                }
            }
        }
        out
    }
}
