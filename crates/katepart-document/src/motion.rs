//! Word-wise cursor motion.
//!
//! Both directions treat a run of word characters and a run of other non-space characters
//! as one word each; whitespace is skipped after moving right and before moving left.

use crate::document::Position;

/// What word motion needs to know about a document.
pub trait WordSource {
    /// Number of lines (at least one).
    fn line_count(&self) -> usize;

    /// Characters of `line`, without its line break.
    fn line_chars(&self, line: usize) -> Vec<char>;

    /// Whether the character `c` at `line`/`column` belongs to a word.
    fn is_word_char(&self, line: usize, column: usize, c: char) -> bool;
}

/// Position of the start of the next word after `from`.
pub fn word_right(source: &impl WordSource, from: Position) -> Position {
    let last_line = source.line_count().saturating_sub(1);
    let mut line = from.line.min(last_line);
    let mut chars = source.line_chars(line);
    let mut col = from.column.min(chars.len());

    if col == chars.len() {
        if line == last_line {
            return Position::new(line, col);
        }
        line += 1;
        chars = source.line_chars(line);
        col = 0;
    } else if source.is_word_char(line, col, chars[col]) {
        while col < chars.len() && source.is_word_char(line, col, chars[col]) {
            col += 1;
        }
    } else if !chars[col].is_whitespace() {
        while col < chars.len()
            && !source.is_word_char(line, col, chars[col])
            && !chars[col].is_whitespace()
        {
            col += 1;
        }
    }

    while col < chars.len() && chars[col].is_whitespace() {
        col += 1;
    }
    Position::new(line, col)
}

/// Position of the start of the word before `from`.
pub fn word_left(source: &impl WordSource, from: Position) -> Position {
    let last_line = source.line_count().saturating_sub(1);
    let line = from.line.min(last_line);
    let chars = source.line_chars(line);
    let mut col = from.column;

    while col > 0 && (col > chars.len() || chars[col - 1].is_whitespace()) {
        col -= 1;
    }

    if col == 0 {
        if line == 0 {
            return Position::new(0, 0);
        }
        return Position::new(line - 1, source.line_chars(line - 1).len());
    }

    if source.is_word_char(line, col - 1, chars[col - 1]) {
        while col > 0 && source.is_word_char(line, col - 1, chars[col - 1]) {
            col -= 1;
        }
    } else {
        while col > 0
            && !source.is_word_char(line, col - 1, chars[col - 1])
            && !chars[col - 1].is_whitespace()
        {
            col -= 1;
        }
    }
    Position::new(line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain(Vec<&'static str>);

    impl WordSource for Plain {
        fn line_count(&self) -> usize {
            self.0.len()
        }

        fn line_chars(&self, line: usize) -> Vec<char> {
            self.0[line].chars().collect()
        }

        fn is_word_char(&self, _line: usize, _column: usize, c: char) -> bool {
            c.is_alphanumeric() || c == '_'
        }
    }

    #[test]
    fn test_word_right_skips_symbol_runs() {
        let doc = Plain(vec!["  -  1234  xyz"]);
        let mut pos = Position::new(0, 1);
        let mut stops = Vec::new();
        for _ in 0..4 {
            pos = word_right(&doc, pos);
            stops.push(pos.column);
        }
        assert_eq!(stops, vec![2, 5, 11, 14]);
    }

    #[test]
    fn test_word_left_skips_trailing_space() {
        let doc = Plain(vec!["  12  -  "]);
        let pos = word_left(&doc, Position::new(0, 8));
        assert_eq!(pos, Position::new(0, 6));
        let pos = word_left(&doc, pos);
        assert_eq!(pos, Position::new(0, 2));
        let pos = word_left(&doc, pos);
        assert_eq!(pos, Position::new(0, 0));
        // Columns past the end of the line behave like the line end.
        assert_eq!(word_left(&doc, Position::new(0, 40)), Position::new(0, 6));
    }

    #[test]
    fn test_motion_crosses_lines_and_clamps() {
        let doc = Plain(vec!["foo", "  bar", ""]);
        assert_eq!(word_right(&doc, Position::new(0, 3)), Position::new(1, 2));
        assert_eq!(word_right(&doc, Position::new(1, 2)), Position::new(1, 5));
        assert_eq!(word_right(&doc, Position::new(1, 5)), Position::new(2, 0));
        assert_eq!(word_right(&doc, Position::new(2, 0)), Position::new(2, 0));

        assert_eq!(word_left(&doc, Position::new(2, 0)), Position::new(1, 5));
        assert_eq!(word_left(&doc, Position::new(1, 2)), Position::new(0, 3));
        assert_eq!(word_left(&doc, Position::new(0, 0)), Position::new(0, 0));
    }
}
