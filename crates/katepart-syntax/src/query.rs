//! Contextual queries: what context, word rules and comment tokens apply at a position.

use crate::context::{Context, ContextId};
use crate::format::AttributeIndex;
use crate::highlighter::{HighlightState, Highlighting};
use crate::prefix_store::PrefixStore;
use crate::property::{
    CommentMarkers, DEFAULT_HL_KEY, EncodedCharactersInsertionPolicy, HighlightPropertyBag,
    SingleLineCommentPosition,
};
use crate::schema::DefaultStyle;
use std::collections::HashMap;

/// Read access to a document's lines, as needed by context lookups.
pub trait LineSource {
    /// Text of `line` without its newline, or `None` past the end.
    fn line_text(&self, line: usize) -> Option<String>;

    /// End state of `line`, or `None` if it is unknown or the initial state.
    fn line_state(&self, line: usize) -> Option<HighlightState>;
}

const QUOTES: [char; 3] = ['"', '\'', '`'];

impl Highlighting {
    /// The context active at `column` of `line`.
    ///
    /// The line is re-highlighted from the previous line's end state. Returns `None` in the
    /// no-highlighting mode or when `line` does not exist.
    pub fn context_at(
        &self,
        source: &impl LineSource,
        line: usize,
        column: usize,
    ) -> Option<&Context> {
        if self.no_highlighting() {
            return None;
        }
        let text = source.line_text(line)?;
        let prev = match line {
            0 => None,
            _ => source.line_state(line - 1),
        };
        let next = source.line_text(line + 1);
        let (_, changes) = self.highlight_line_with_changes(prev.as_ref(), &text, next.as_deref());
        let id = changes
            .iter()
            .take_while(|c| c.column <= column)
            .last()
            .map(|c| c.context)?;
        self.context(id)
    }

    /// Key of the property bag that applies to `attribute`.
    pub fn hl_key_for_attribute(&self, attribute: AttributeIndex) -> &str {
        match self.registry.format_at(attribute) {
            Some(format) if self.bags.contains_key(&format.definition) => format.definition.as_str(),
            _ => DEFAULT_HL_KEY,
        }
    }

    /// Key of the property bag that applies inside `context`.
    pub fn hl_key_for_context(&self, context: ContextId) -> &str {
        match self.context(context) {
            Some(ctx) if self.bags.contains_key(&ctx.definition) => ctx.definition.as_str(),
            _ => DEFAULT_HL_KEY,
        }
    }

    fn bag(&self, attribute: AttributeIndex) -> &HighlightPropertyBag {
        let key = self.hl_key_for_attribute(attribute);
        // The default bag is inserted by every constructor.
        &self.bags[key]
    }

    /// Whether `c` belongs to a word in text with this attribute.
    pub fn is_in_word(&self, c: char, attribute: AttributeIndex) -> bool {
        !self.bag(attribute).deliminator.contains(c) && !c.is_whitespace() && !QUOTES.contains(&c)
    }

    /// Whether soft wrapping may break after `c`.
    pub fn can_break_at(&self, c: char, attribute: AttributeIndex) -> bool {
        self.bag(attribute).word_wrap_deliminator.contains(c) && c != '"' && c != '\''
    }

    /// All comment tokens for `attribute`.
    pub fn comment_markers(&self, attribute: AttributeIndex) -> &CommentMarkers {
        &self.bag(attribute).comments
    }

    /// Block comment start token.
    pub fn comment_start(&self, attribute: AttributeIndex) -> &str {
        &self.comment_markers(attribute).start
    }

    /// Block comment end token.
    pub fn comment_end(&self, attribute: AttributeIndex) -> &str {
        &self.comment_markers(attribute).end
    }

    /// Line comment token.
    pub fn comment_single_line_start(&self, attribute: AttributeIndex) -> &str {
        &self.comment_markers(attribute).single_line
    }

    /// Where the line comment token goes.
    pub fn comment_single_line_position(
        &self,
        attribute: AttributeIndex,
    ) -> SingleLineCommentPosition {
        self.comment_markers(attribute).single_line_position
    }

    /// Whether a range from `start_attribute` to `end_attribute` can be commented out.
    ///
    /// Both ends must belong to the same mode and that mode must have comment tokens.
    pub fn can_comment(&self, start_attribute: AttributeIndex, end_attribute: AttributeIndex) -> bool {
        let key = self.hl_key_for_attribute(start_attribute);
        if key != self.hl_key_for_attribute(end_attribute) {
            return false;
        }
        let markers = &self.bags[key].comments;
        markers.has_multi_line() || markers.has_single_line()
    }

    /// Folding region id of the block comment (0 = none).
    pub fn comment_region(&self, attribute: AttributeIndex) -> i8 {
        self.bag(attribute).multi_line_region
    }

    /// Whether `text` counts as empty. `attribute` is the attribute of its first character.
    pub fn is_empty_line(&self, text: &str, attribute: AttributeIndex) -> bool {
        text.is_empty() || self.bag(attribute).matches_empty_line(text)
    }

    /// Escape sequence to character.
    pub fn character_encodings(&self, attribute: AttributeIndex) -> &HashMap<String, char> {
        &self.bag(attribute).character_encodings
    }

    /// Character to escape sequence.
    pub fn reverse_character_encodings(&self, attribute: AttributeIndex) -> &HashMap<char, String> {
        &self.bag(attribute).reverse_character_encodings
    }

    /// Trie over the escape sequences.
    pub fn character_encodings_prefix_store(&self, attribute: AttributeIndex) -> &PrefixStore {
        &self.bag(attribute).character_encodings_prefix_store
    }

    /// Insertion policy for encoded characters.
    pub fn encoded_characters_insertion_policy(
        &self,
        attribute: AttributeIndex,
    ) -> EncodedCharactersInsertionPolicy {
        self.bag(attribute).encoded_characters_insertion_policy
    }

    /// Whether text with this attribute is spell checked.
    pub fn attribute_requires_spellchecking(&self, attribute: AttributeIndex) -> bool {
        self.registry
            .format_at(attribute)
            .is_some_and(|f| !f.skip_spell_checking)
    }

    /// Style class of `attribute`; `Normal` for unknown indices.
    pub fn default_style_for_attribute(&self, attribute: AttributeIndex) -> DefaultStyle {
        self.registry
            .format_at(attribute)
            .map(|f| f.default_style)
            .unwrap_or_default()
    }

    /// Default attribute of `context`.
    pub fn attribute(&self, context: ContextId) -> AttributeIndex {
        self.context(context).map(|c| c.attribute).unwrap_or(0)
    }

    /// Names of the other modes folded into this one.
    pub fn embedded_highlighting_modes(&self) -> &[String] {
        &self.embedded
    }

    /// Whether folding follows indentation.
    pub fn folding_indentation_sensitive(&self) -> bool {
        self.info().indentation_sensitive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines(Vec<&'static str>, Vec<Option<HighlightState>>);

    impl LineSource for Lines {
        fn line_text(&self, line: usize) -> Option<String> {
            self.0.get(line).map(|s| s.to_string())
        }

        fn line_state(&self, line: usize) -> Option<HighlightState> {
            self.1.get(line).cloned().flatten()
        }
    }

    #[test]
    fn test_word_predicate_on_default_delimiters() {
        let hl = Highlighting::none();
        for c in ['a', 'Z', '_', '0', 'ß', '#', '@', '$'] {
            assert!(hl.is_in_word(c, 0), "{c:?} should be a word char");
        }
        for c in [' ', '\t', '.', '(', ')', '-', '+', '\\', '"', '\'', '`', ';'] {
            assert!(!hl.is_in_word(c, 0), "{c:?} should not be a word char");
        }
        assert!(hl.can_break_at(' ', 0));
        assert!(!hl.can_break_at('a', 0));
    }

    #[test]
    fn test_no_highlighting_queries() {
        let hl = Highlighting::none();
        let lines = Lines(vec!["foo bar quzzi"], vec![None]);
        assert!(hl.context_at(&lines, 0, 3).is_none());
        assert!(!hl.is_empty_line("foo bar quzzi", 0));
        assert!(hl.is_empty_line("", 0));
        assert_eq!(hl.hl_key_for_attribute(0), DEFAULT_HL_KEY);
        assert!(!hl.can_comment(0, 0));
        assert!(hl.attribute_requires_spellchecking(0));
        assert_eq!(hl.default_style_for_attribute(7), DefaultStyle::Normal);
    }
}
