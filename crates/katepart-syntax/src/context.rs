//! Resolved contexts and rules: the runtime representation consumed by the highlighter.

use crate::format::AttributeIndex;
use onig::{Regex, SearchOptions};
use std::collections::HashSet;
use std::sync::Arc;

/// Index of a context in a highlighting's context store.
pub type ContextId = usize;

/// The synthesized fallback context every highlighting has.
pub const FALLBACK_CONTEXT: ContextId = 0;

/// Id of a folding region (1-based, 0 is never used).
pub type RegionId = u16;

/// Where a context switch goes after popping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextTarget {
    /// A context of the same store.
    Context(ContextId),
    /// A reference that did not resolve when the definition was compiled.
    Unresolved(String),
}

/// A context stack operation: pop `pops` entries, then optionally push one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextSwitch {
    /// Number of entries popped first.
    pub pops: usize,
    /// Context pushed afterwards.
    pub push: Option<ContextTarget>,
}

impl ContextSwitch {
    /// `#stay`.
    pub fn stay() -> Self {
        Self::default()
    }

    /// `#pop` repeated `n` times.
    pub fn pop(n: usize) -> Self {
        Self {
            pops: n,
            push: None,
        }
    }

    /// Push a context without popping.
    pub fn push(context: ContextId) -> Self {
        Self {
            pops: 0,
            push: Some(ContextTarget::Context(context)),
        }
    }

    /// Returns `true` for `#stay`.
    pub fn is_stay(&self) -> bool {
        self.pops == 0 && self.push.is_none()
    }
}

/// A resolved context.
#[derive(Debug, Clone)]
pub struct Context {
    /// Index in the store.
    pub id: ContextId,
    /// Name within its definition.
    pub name: String,
    /// Name of the owning definition.
    pub definition: String,
    /// Attribute for text no rule claims.
    pub attribute: AttributeIndex,
    /// Switch applied at the end of each line.
    pub line_end: ContextSwitch,
    /// Switch applied to empty lines, if different from `line_end`.
    pub line_empty: Option<ContextSwitch>,
    /// Switch applied when no rule matches.
    pub fallthrough: Option<ContextSwitch>,
    /// Rules in match order, with `include_rules` already spliced in.
    pub rules: Vec<Rule>,
    /// Word delimiters of the owning definition.
    pub deliminator: Arc<str>,
    /// Keyword matching is case sensitive.
    pub case_sensitive: bool,
}

impl Context {
    /// Whether the context has a fallthrough switch.
    pub fn is_fallthrough(&self) -> bool {
        self.fallthrough.is_some()
    }

    /// Whether the context can carry a line over into the next one.
    pub fn has_line_continuation(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r.matcher, Matcher::LineContinue(_)))
    }

    /// Whether some rule of the context opens a folding region.
    pub fn is_folding_start(&self) -> bool {
        self.rules.iter().any(|r| r.begin_region.is_some())
    }

    /// Whether empty lines get their own switch.
    pub fn has_line_empty_switch(&self) -> bool {
        self.line_empty.is_some()
    }

    pub(crate) fn is_delimiter(&self, c: char) -> bool {
        self.deliminator.contains(c)
    }
}

/// A resolved rule.
#[derive(Debug, Clone)]
pub struct Rule {
    /// What the rule matches.
    pub matcher: Matcher,
    /// Attribute of the match; the context attribute if `None`.
    pub attribute: Option<AttributeIndex>,
    /// Stack operation applied after the match.
    pub switch: ContextSwitch,
    /// Match without consuming input.
    pub lookahead: bool,
    /// Only match at the first non-space character.
    pub first_non_space: bool,
    /// Only match at this column.
    pub column: Option<usize>,
    /// Folding region opened by the match.
    pub begin_region: Option<RegionId>,
    /// Folding region closed by the match.
    pub end_region: Option<RegionId>,
}

/// Rule matchers.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// One character.
    DetectChar(char),
    /// Two characters.
    Detect2Chars(char, char),
    /// One character of a set.
    AnyChar(Vec<char>),
    /// A literal string.
    StringDetect {
        /// The string.
        text: Vec<char>,
        /// Compare case-insensitively.
        insensitive: bool,
    },
    /// A literal string bounded by delimiters.
    WordDetect {
        /// The word.
        text: Vec<char>,
        /// Compare case-insensitively.
        insensitive: bool,
    },
    /// A compiled regex, anchored at the current position.
    RegExpr(Arc<Regex>),
    /// A keyword list lookup.
    Keyword {
        /// The words (lowercased when `insensitive`).
        words: Arc<HashSet<String>>,
        /// Compare case-insensitively.
        insensitive: bool,
    },
    /// Decimal integer.
    Int,
    /// Floating point literal.
    Float,
    /// C string escape.
    HlCStringChar,
    /// From one character to another on the same line.
    RangeDetect(char, char),
    /// Continuation character at end of line.
    LineContinue(char),
    /// Whitespace run.
    DetectSpaces,
    /// ASCII identifier.
    DetectIdentifier,
}

/// One line prepared for matching: chars plus their byte offsets.
#[derive(Debug)]
pub(crate) struct LineText<'a> {
    pub text: &'a str,
    pub chars: Vec<char>,
    // byte_at[i] is the byte offset of char i; the last entry is text.len().
    pub byte_at: Vec<usize>,
}

impl<'a> LineText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut chars = Vec::with_capacity(text.len());
        let mut byte_at = Vec::with_capacity(text.len() + 1);
        for (i, c) in text.char_indices() {
            chars.push(c);
            byte_at.push(i);
        }
        byte_at.push(text.len());
        Self {
            text,
            chars,
            byte_at,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn first_non_space(&self) -> Option<usize> {
        self.chars.iter().position(|c| !c.is_whitespace())
    }

    fn char_index_of_byte(&self, byte: usize) -> Option<usize> {
        self.byte_at.binary_search(&byte).ok()
    }
}

fn eq_chars(a: char, b: char, insensitive: bool) -> bool {
    if insensitive {
        a == b || a.to_lowercase().eq(b.to_lowercase())
    } else {
        a == b
    }
}

fn starts_with_at(line: &[char], pos: usize, needle: &[char], insensitive: bool) -> bool {
    line.len() >= pos + needle.len()
        && needle
            .iter()
            .zip(&line[pos..])
            .all(|(n, c)| eq_chars(*n, *c, insensitive))
}

fn count_while(chars: &[char], from: usize, pred: impl Fn(char) -> bool) -> usize {
    chars[from.min(chars.len())..]
        .iter()
        .take_while(|c| pred(**c))
        .count()
}

impl Matcher {
    /// Try to match at char index `pos`. Returns the end char index (exclusive).
    pub(crate) fn match_at(&self, line: &LineText<'_>, pos: usize, ctx: &Context) -> Option<usize> {
        let chars = &line.chars;
        let at = |i: usize| chars.get(i).copied();
        let word_start = pos == 0 || at(pos - 1).is_some_and(|c| ctx.is_delimiter(c));

        let end = match self {
            Self::DetectChar(c) => (at(pos)? == *c).then_some(pos + 1)?,
            Self::Detect2Chars(a, b) => (at(pos)? == *a && at(pos + 1)? == *b).then_some(pos + 2)?,
            Self::AnyChar(set) => set.contains(&at(pos)?).then_some(pos + 1)?,
            Self::StringDetect { text, insensitive } => {
                starts_with_at(chars, pos, text, *insensitive).then_some(pos + text.len())?
            }
            Self::WordDetect { text, insensitive } => {
                if !word_start || !starts_with_at(chars, pos, text, *insensitive) {
                    return None;
                }
                let end = pos + text.len();
                match at(end) {
                    Some(c) if !ctx.is_delimiter(c) => return None,
                    _ => end,
                }
            }
            Self::RegExpr(regex) => {
                let start_byte = line.byte_at[pos];
                let len = regex.match_with_options(
                    line.text,
                    start_byte,
                    SearchOptions::SEARCH_OPTION_NONE,
                    None,
                )?;
                line.char_index_of_byte(start_byte + len)?
            }
            Self::Keyword { words, insensitive } => {
                if !word_start {
                    return None;
                }
                let len = count_while(chars, pos, |c| !ctx.is_delimiter(c));
                if len == 0 {
                    return None;
                }
                let word: String = chars[pos..pos + len].iter().collect();
                let hit = if *insensitive {
                    words.contains(&word.to_lowercase())
                } else {
                    words.contains(&word)
                };
                hit.then_some(pos + len)?
            }
            Self::Int => {
                if !word_start {
                    return None;
                }
                let len = count_while(chars, pos, |c| c.is_ascii_digit());
                (len > 0).then_some(pos + len)?
            }
            Self::Float => {
                if !word_start {
                    return None;
                }
                match_float(chars, pos)?
            }
            Self::HlCStringChar => match_c_string_char(chars, pos)?,
            Self::RangeDetect(open, close) => {
                if at(pos)? != *open {
                    return None;
                }
                let rel = chars[pos + 1..].iter().position(|c| c == close)?;
                pos + 1 + rel + 1
            }
            Self::LineContinue(c) => (at(pos)? == *c && pos + 1 == chars.len()).then_some(pos + 1)?,
            Self::DetectSpaces => {
                let len = count_while(chars, pos, char::is_whitespace);
                (len > 0).then_some(pos + len)?
            }
            Self::DetectIdentifier => {
                let first = at(pos)?;
                if !(first.is_ascii_alphabetic() || first == '_') {
                    return None;
                }
                pos + 1 + count_while(chars, pos + 1, |c| c.is_ascii_alphanumeric() || c == '_')
            }
        };
        Some(end)
    }
}

fn match_float(chars: &[char], pos: usize) -> Option<usize> {
    let int_digits = count_while(chars, pos, |c| c.is_ascii_digit());
    let mut i = pos + int_digits;
    let mut frac_digits = 0;
    let has_dot = chars.get(i) == Some(&'.');
    if has_dot {
        frac_digits = count_while(chars, i + 1, |c| c.is_ascii_digit());
        i += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    // Optional exponent; without a dot it is mandatory.
    let mut exp_end = None;
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        let digits = count_while(chars, j, |c| c.is_ascii_digit());
        if digits > 0 {
            exp_end = Some(j + digits);
        }
    }

    match (has_dot, exp_end) {
        (_, Some(end)) => Some(end),
        (true, None) => Some(i),
        (false, None) => None,
    }
}

fn match_c_string_char(chars: &[char], pos: usize) -> Option<usize> {
    if chars.get(pos) != Some(&'\\') {
        return None;
    }
    let next = *chars.get(pos + 1)?;
    match next {
        'a' | 'b' | 'e' | 'f' | 'n' | 'r' | 't' | 'v' | '"' | '\'' | '?' | '\\' => Some(pos + 2),
        'x' => {
            let digits = count_while(chars, pos + 2, |c| c.is_ascii_hexdigit());
            (digits > 0).then_some(pos + 2 + digits)
        }
        '0'..='7' => {
            let digits = count_while(chars, pos + 1, |c| ('0'..='7').contains(&c)).min(3);
            Some(pos + 1 + digits)
        }
        _ => None,
    }
}
