//! Per-mode metadata: delimiters, comment markers, empty-line patterns and character
//! encodings.

use crate::definition::SyntaxDefinition;
use crate::prefix_store::PrefixStore;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// Key of the property bag every highlighting has, whether or not a definition loaded.
pub const DEFAULT_HL_KEY: &str = "none";

/// The default word delimiter set.
pub const STD_DELIMINATOR: &str = " \t.():!+,-<=>%&*/;?[]^{|}~\\";

/// Where a single-line comment marker goes when commenting out a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleLineCommentPosition {
    /// Column 0.
    #[default]
    StartOfLine,
    /// After the leading whitespace.
    AfterWhitespace,
}

/// How characters that have an encoding are inserted while typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodedCharactersInsertionPolicy {
    /// Insert the character as typed.
    #[default]
    Literal,
    /// Insert the escape sequence instead of the character.
    Encode,
}

/// Comment tokens for a highlighting mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentMarkers {
    /// Block comment start token (e.g. `/*`).
    pub start: String,
    /// Block comment end token (e.g. `*/`).
    pub end: String,
    /// Line comment token (e.g. `//`, `#`).
    pub single_line: String,
    /// Where the line comment token is placed.
    pub single_line_position: SingleLineCommentPosition,
}

impl CommentMarkers {
    /// Returns `true` if a line comment token is configured.
    pub fn has_single_line(&self) -> bool {
        !self.single_line.is_empty()
    }

    /// Returns `true` if both block comment tokens are configured.
    pub fn has_multi_line(&self) -> bool {
        !self.start.is_empty() && !self.end.is_empty()
    }
}

/// Metadata shared by all attributes of one highlighting mode.
#[derive(Debug, Clone)]
pub struct HighlightPropertyBag {
    /// Word delimiters.
    pub deliminator: String,
    /// Characters where soft wrapping may break.
    pub word_wrap_deliminator: String,
    /// Comment tokens.
    pub comments: CommentMarkers,
    /// Folding region id of the block comment (0 = none).
    pub multi_line_region: i8,
    /// Escape sequence to character.
    pub character_encodings: HashMap<String, char>,
    /// Character to escape sequence.
    pub reverse_character_encodings: HashMap<char, String>,
    /// Trie over the escape sequences.
    pub character_encodings_prefix_store: PrefixStore,
    /// Insertion policy for encoded characters.
    pub encoded_characters_insertion_policy: EncodedCharactersInsertionPolicy,
    /// Whole-line patterns for lines that count as empty.
    pub empty_lines: Vec<Regex>,
}

impl Default for HighlightPropertyBag {
    fn default() -> Self {
        Self {
            deliminator: STD_DELIMINATOR.to_string(),
            word_wrap_deliminator: STD_DELIMINATOR.to_string(),
            comments: CommentMarkers::default(),
            multi_line_region: 0,
            character_encodings: HashMap::new(),
            reverse_character_encodings: HashMap::new(),
            character_encodings_prefix_store: PrefixStore::new(),
            encoded_characters_insertion_policy: EncodedCharactersInsertionPolicy::default(),
            empty_lines: Vec::new(),
        }
    }
}

impl HighlightPropertyBag {
    /// Build the bag for one definition.
    ///
    /// `region_id` maps a folding region name to its id. Invalid empty-line patterns are
    /// skipped with a warning.
    pub fn from_definition(
        definition: &SyntaxDefinition,
        region_id: impl Fn(&str) -> Option<i8>,
    ) -> Self {
        let mut bag = Self::default();

        let kw = &definition.keywords;
        let mut deliminator: String = STD_DELIMINATOR
            .chars()
            .filter(|c| !kw.weak_deliminator.contains(*c))
            .collect();
        for c in kw.additional_deliminator.chars() {
            if !deliminator.contains(c) {
                deliminator.push(c);
            }
        }
        bag.word_wrap_deliminator = kw
            .word_wrap_deliminator
            .clone()
            .unwrap_or_else(|| deliminator.clone());
        bag.deliminator = deliminator;

        if let Some(single) = &definition.comments.single_line {
            bag.comments.single_line = single.marker.clone();
            bag.comments.single_line_position = single.position;
        }
        if let Some(multi) = &definition.comments.multi_line {
            bag.comments.start = multi.start.clone();
            bag.comments.end = multi.end.clone();
            bag.multi_line_region = multi
                .region
                .as_deref()
                .and_then(|name| region_id(name))
                .unwrap_or(0);
        }

        for pattern in &definition.empty_lines {
            match Regex::new(&format!(r"\A(?:{pattern})\z")) {
                Ok(re) => bag.empty_lines.push(re),
                Err(e) => warn!(
                    definition = %definition.name,
                    pattern = %pattern,
                    error = %e,
                    "skipping invalid empty-line pattern"
                ),
            }
        }

        bag.encoded_characters_insertion_policy = definition.encodings.policy;
        for entry in &definition.encodings.entries {
            bag.add_character_encoding(&entry.string, entry.character);
        }

        bag
    }

    /// Register an escape sequence for a character.
    pub fn add_character_encoding(&mut self, encoding: &str, c: char) {
        self.character_encodings_prefix_store.add_prefix(encoding);
        self.character_encodings.insert(encoding.to_string(), c);
        self.reverse_character_encodings
            .insert(c, encoding.to_string());
    }

    /// Whether `text` matches one of the empty-line patterns as a whole.
    pub fn matches_empty_line(&self, text: &str) -> bool {
        self.empty_lines.iter().any(|re| re.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_markers_flags() {
        let markers = CommentMarkers {
            single_line: "#".into(),
            ..CommentMarkers::default()
        };
        assert!(markers.has_single_line());
        assert!(!markers.has_multi_line());

        let markers = CommentMarkers {
            start: "/*".into(),
            ..CommentMarkers::default()
        };
        assert!(!markers.has_multi_line());
    }

    #[test]
    fn test_delimiters_follow_keyword_settings() {
        let yaml = r###"
name: Lisp
contexts:
  - name: Normal
    attribute: Normal Text
keywords:
  weak_deliminator: "-"
  additional_deliminator: "'"
empty_lines: ["\\s*", "\\s*;.*"]
"###;
        let def = SyntaxDefinition::from_yaml_str(yaml).unwrap();
        let bag = HighlightPropertyBag::from_definition(&def, |_| None);
        assert!(!bag.deliminator.contains('-'));
        assert!(bag.deliminator.contains('\''));
        assert_eq!(bag.word_wrap_deliminator, bag.deliminator);
        assert!(bag.matches_empty_line("   "));
        assert!(bag.matches_empty_line("  ; note"));
        assert!(!bag.matches_empty_line("  (x)"));
    }
}
