//! The document: rope text plus a lazily extended, incrementally repaired highlight cache.

use crate::folding::{FoldRegion, fold_regions};
use crate::motion::{self, WordSource};
use katepart_syntax::{
    AttributeIndex, ContextId, HighlightState, Highlighting, LineHighlight, LineSource,
};
use ropey::Rope;
use std::cmp::Ordering;
use std::iter;
use std::sync::Arc;
use tracing::debug;

/// A position in the document, in lines and chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Zero-based line.
    pub line: usize,
    /// Zero-based column in chars.
    pub column: usize,
}

impl Position {
    /// Create a position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What the last edit cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeStats {
    /// First re-highlighted line.
    pub first_line: usize,
    /// Number of lines re-highlighted.
    pub lines_highlighted: usize,
    /// Line whose end state matched the cached one, ending the cascade early.
    pub converged_at: Option<usize>,
}

/// A text document highlighted by a shared [`Highlighting`] mode.
///
/// `lines[i]` is `Some` exactly for `i < highlighted_until`; every cached entry was
/// computed from the end state of the entry before it.
#[derive(Debug)]
pub struct Document {
    text: Rope,
    mode: Arc<Highlighting>,
    lines: Vec<Option<LineHighlight>>,
    highlighted_until: usize,
    last_cascade: CascadeStats,
}

impl Document {
    /// Create a document. Nothing is highlighted until a line is requested.
    pub fn new(text: &str, mode: Arc<Highlighting>) -> Self {
        let text = Rope::from_str(text);
        let lines = vec![None; text.len_lines()];
        Self {
            text,
            mode,
            lines,
            highlighted_until: 0,
            last_cascade: CascadeStats::default(),
        }
    }

    /// The whole text.
    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Number of lines; an empty document has one.
    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Text of `line` without its line break.
    pub fn line(&self, line: usize) -> Option<String> {
        if line >= self.text.len_lines() {
            return None;
        }
        let mut text = self.text.line(line).to_string();
        strip_line_break(&mut text);
        Some(text)
    }

    /// Length of `line` in chars, without its line break.
    pub fn line_len(&self, line: usize) -> usize {
        self.line(line).map(|l| l.chars().count()).unwrap_or(0)
    }

    /// The highlighting mode.
    pub fn mode(&self) -> &Arc<Highlighting> {
        &self.mode
    }

    /// Switch to another mode; the whole cache is dropped.
    pub fn set_mode(&mut self, mode: Arc<Highlighting>) {
        debug!(mode = %mode.name(), "document mode changed");
        self.mode = mode;
        self.lines.iter_mut().for_each(|l| *l = None);
        self.highlighted_until = 0;
    }

    /// Number of leading lines with a valid cached highlight.
    pub fn highlighted_until(&self) -> usize {
        self.highlighted_until
    }

    /// Cost of the last edit.
    pub fn last_cascade(&self) -> CascadeStats {
        self.last_cascade
    }

    /// Highlight every line up to and including `line`.
    pub fn ensure_highlighted(&mut self, line: usize) {
        let target = line.min(self.line_count().saturating_sub(1));
        while self.highlighted_until <= target {
            let i = self.highlighted_until;
            let (highlight, _) = self.highlight(i, None);
            self.lines[i] = Some(highlight);
            self.highlighted_until += 1;
        }
    }

    /// The highlight of `line`, computing it if needed.
    pub fn line_highlight(&mut self, line: usize) -> Option<&LineHighlight> {
        if line >= self.line_count() {
            return None;
        }
        self.ensure_highlighted(line);
        self.lines[line].as_ref()
    }

    /// Highlight `line` from the cached end state of the line before it. The second value
    /// is whether the end state differs from `cached`.
    fn highlight(&self, line: usize, cached: Option<&HighlightState>) -> (LineHighlight, bool) {
        let prev = match line {
            0 => None,
            _ => self.lines[line - 1].as_ref().map(|l| &l.state),
        };
        let text = self.line(line).unwrap_or_default();
        let next = self.line(line + 1);
        let outcome = self
            .mode
            .do_highlight(prev, cached, &text, next.as_deref());
        (outcome.line, outcome.state_changed)
    }

    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.line_count().saturating_sub(1));
        Position::new(line, pos.column.min(self.line_len(line)))
    }

    fn char_index(&self, pos: Position) -> usize {
        self.text.line_to_char(pos.line) + pos.column
    }

    /// Insert `text` at `at`. Returns the position after the inserted text.
    pub fn insert_text(&mut self, at: Position, text: &str) -> Position {
        let at = self.clamp(at);
        self.replace(at, at, text)
    }

    /// Remove the text between `start` and `end` (in either order).
    pub fn remove_text(&mut self, start: Position, end: Position) {
        let (start, end) = (self.clamp(start.min(end)), self.clamp(start.max(end)));
        self.replace(start, end, "");
    }

    /// Replace the contents of `line` (its line break is kept).
    pub fn set_line_text(&mut self, line: usize, text: &str) {
        if line >= self.line_count() {
            return;
        }
        let len = self.line_len(line);
        self.replace(Position::new(line, 0), Position::new(line, len), text);
    }

    fn replace(&mut self, start: Position, end: Position, text: &str) -> Position {
        let lines_before = self.line_count();
        let from = self.char_index(start);
        let to = self.char_index(end);
        self.text.remove(from..to);
        self.text.insert(from, text);
        let after = from + text.chars().count();

        // Lines start.line..=end.line became start.line..=new_last. The cached entry of the
        // old last line describes the same line end, so it moves to new_last.
        let new_last = (end.line + self.line_count())
            .saturating_sub(lines_before)
            .clamp(start.line, self.line_count().saturating_sub(1));
        self.lines.splice(
            start.line..end.line,
            iter::repeat_n(None, new_last - start.line),
        );
        self.lines.resize(self.line_count(), None);

        let old_until = self.highlighted_until;
        let valid_end = if old_until > end.line {
            old_until - end.line + new_last
        } else {
            old_until.min(start.line)
        };
        self.cascade(start.line, new_last, valid_end);

        let line = self.text.char_to_line(after);
        Position::new(line, after - self.text.line_to_char(line))
    }

    /// Re-highlight `first..=last`, then keep going while end states change.
    fn cascade(&mut self, first: usize, last: usize, valid_end: usize) {
        let mut stats = CascadeStats {
            first_line: first,
            ..CascadeStats::default()
        };
        if first >= self.highlighted_until {
            // Nothing downstream was highlighted; stay lazy.
            self.last_cascade = stats;
            return;
        }

        let count = self.line_count();
        let mut i = first;
        self.highlighted_until = loop {
            if i >= count {
                break count;
            }
            if i > last && self.lines[i].is_none() {
                break i;
            }
            let (highlight, changed) = self.highlight(i, self.lines[i].as_ref().map(|l| &l.state));
            self.lines[i] = Some(highlight);
            stats.lines_highlighted += 1;
            if i >= last && !changed {
                stats.converged_at = Some(i);
                break valid_end.max(i + 1).min(count);
            }
            i += 1;
        };

        debug!(
            first = stats.first_line,
            lines = stats.lines_highlighted,
            converged_at = ?stats.converged_at,
            "re-highlighted after edit"
        );
        self.last_cascade = stats;
    }

    /// Attribute of the character at `pos`. Past the end of a line this is the default
    /// attribute of the context the line ends in.
    pub fn attribute_at(&mut self, pos: Position) -> AttributeIndex {
        self.ensure_highlighted(pos.line);
        self.cached_attribute_at(pos.line, pos.column)
    }

    fn cached_attribute_at(&self, line: usize, column: usize) -> AttributeIndex {
        match self.lines.get(line).and_then(Option::as_ref) {
            Some(highlight) => highlight.attribute_at(column).unwrap_or_else(|| {
                self.mode
                    .attribute(self.mode.top_context(&highlight.state))
            }),
            None => 0,
        }
    }

    /// The context active at `pos`, or `None` without highlighting.
    pub fn context_at(&mut self, pos: Position) -> Option<ContextId> {
        self.ensure_highlighted(pos.line);
        let mode = Arc::clone(&self.mode);
        mode.context_at(&*self, pos.line, pos.column).map(|c| c.id)
    }

    /// Whether `line` counts as empty for the mode of its first character.
    pub fn is_empty_line(&mut self, line: usize) -> bool {
        let Some(text) = self.line(line) else {
            return false;
        };
        let attribute = self.attribute_at(Position::new(line, 0));
        self.mode.is_empty_line(&text, attribute)
    }

    /// Foldable regions of the whole document.
    pub fn fold_regions(&mut self) -> Vec<FoldRegion> {
        self.ensure_highlighted(self.line_count());
        fold_regions(self.lines.iter().flatten())
    }

    /// Start of the next word after `from`.
    pub fn word_right(&mut self, from: Position) -> Position {
        self.ensure_highlighted(from.line + 1);
        motion::word_right(&*self, from)
    }

    /// Start of the word before `from`.
    pub fn word_left(&mut self, from: Position) -> Position {
        self.ensure_highlighted(from.line);
        motion::word_left(&*self, from)
    }
}

impl LineSource for Document {
    fn line_text(&self, line: usize) -> Option<String> {
        self.line(line)
    }

    fn line_state(&self, line: usize) -> Option<HighlightState> {
        self.lines
            .get(line)
            .and_then(Option::as_ref)
            .map(|l| l.state.clone())
    }
}

impl WordSource for Document {
    fn line_count(&self) -> usize {
        Document::line_count(self)
    }

    fn line_chars(&self, line: usize) -> Vec<char> {
        self.line(line)
            .map(|l| l.chars().collect())
            .unwrap_or_default()
    }

    fn is_word_char(&self, line: usize, column: usize, c: char) -> bool {
        self.mode
            .is_in_word(c, self.cached_attribute_at(line, column))
    }
}

fn strip_line_break(text: &mut String) {
    if text.ends_with("\r\n") {
        text.truncate(text.len() - 2);
    } else if let Some(c) = text.chars().last()
        && matches!(
            c,
            '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
        )
    {
        text.truncate(text.len() - c.len_utf8());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> Document {
        Document::new(text, Arc::new(Highlighting::none()))
    }

    #[test]
    fn test_lines_and_positions() {
        let mut doc = plain("ab\r\ncd\n");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(0).as_deref(), Some("ab"));
        assert_eq!(doc.line(2).as_deref(), Some(""));
        assert_eq!(doc.line(3), None);

        let end = doc.insert_text(Position::new(1, 1), "x\ny");
        assert_eq!(end, Position::new(2, 1));
        assert_eq!(doc.text(), "ab\r\ncx\nyd\n");

        doc.remove_text(Position::new(2, 1), Position::new(0, 1));
        assert_eq!(doc.text(), "ad\n");

        doc.set_line_text(0, "hello");
        assert_eq!(doc.text(), "hello\n");
        // Out-of-range positions clamp.
        doc.insert_text(Position::new(9, 9), "!");
        assert_eq!(doc.text(), "hello\n!");
    }

    #[test]
    fn test_lazy_highlighting() {
        let mut doc = plain("a\nb\nc\nd");
        assert_eq!(doc.highlighted_until(), 0);
        assert!(doc.line_highlight(1).is_some());
        assert_eq!(doc.highlighted_until(), 2);

        // Edits past the highlighted prefix do no work.
        doc.insert_text(Position::new(3, 0), "x");
        assert_eq!(doc.last_cascade().lines_highlighted, 0);
        assert_eq!(doc.highlighted_until(), 2);

        doc.ensure_highlighted(100);
        assert_eq!(doc.highlighted_until(), 4);
    }

    #[test]
    fn test_plain_mode_queries() {
        let mut doc = plain("foo bar quzzi\n   ");
        assert_eq!(doc.context_at(Position::new(0, 2)), None);
        assert!(!doc.is_empty_line(0));
        assert!(!doc.is_empty_line(1));
        assert!(doc.fold_regions().is_empty());
        assert_eq!(doc.attribute_at(Position::new(0, 5)), 0);
    }

    #[test]
    fn test_word_motion_over_plain_text() {
        let mut doc = plain("foo bar quzzi");
        let mut pos = Position::new(0, 0);
        let mut right = Vec::new();
        for _ in 0..3 {
            pos = doc.word_right(pos);
            right.push(pos.column);
        }
        assert_eq!(right, vec![4, 8, 13]);

        let mut left = Vec::new();
        for _ in 0..3 {
            pos = doc.word_left(pos);
            left.push(pos.column);
        }
        assert_eq!(left, vec![8, 4, 0]);
    }
}
