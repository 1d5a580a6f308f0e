use katepart_syntax::{
    AttributeIndex, DefaultStyle, Diagnostic, EncodedCharactersInsertionPolicy, FoldingKind,
    HighlightState, Highlighting, LineSource, Repository, SingleLineCommentPosition,
    SyntaxDefinition,
};
use std::sync::Arc;

const MINIC: &str = include_str!("fixtures/minic.yaml");
const DOXY: &str = include_str!("fixtures/doxy.yaml");

fn repository() -> Repository {
    let mut repo = Repository::new();
    repo.load_from_str(MINIC).expect("load MiniC");
    repo.load_from_str(DOXY).expect("load Doxy");
    repo
}

fn minic() -> Highlighting {
    repository().compile("MiniC", 64).expect("compile MiniC")
}

fn attr(hl: &Highlighting, definition: &str, name: &str) -> AttributeIndex {
    hl.formats()
        .index_by_name(definition, name)
        .unwrap_or_else(|| panic!("no format {definition}/{name}"))
}

struct Buffer {
    lines: Vec<String>,
    states: Vec<HighlightState>,
}

impl Buffer {
    fn new(hl: &Highlighting, text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let mut states = Vec::with_capacity(lines.len());
        let mut prev: Option<HighlightState> = None;
        for (i, line) in lines.iter().enumerate() {
            let next = lines.get(i + 1).map(String::as_str);
            let result = hl.highlight_line(prev.as_ref(), line, next);
            states.push(result.state.clone());
            prev = Some(result.state);
        }
        Self { lines, states }
    }
}

impl LineSource for Buffer {
    fn line_text(&self, line: usize) -> Option<String> {
        self.lines.get(line).cloned()
    }

    fn line_state(&self, line: usize) -> Option<HighlightState> {
        self.states.get(line).cloned()
    }
}

#[test]
fn test_embedded_modes_and_format_dedup() {
    let hl = minic();
    assert_eq!(hl.embedded_highlighting_modes(), &["Doxy".to_string()]);
    // 9 MiniC formats + Doxy "Word"; the shared tag id is registered once.
    assert_eq!(hl.formats().len(), 10);
    let tag = hl.formats().index_of("shared:tag").unwrap();
    assert_eq!(hl.formats().format_at(tag).unwrap().definition, "MiniC");

    let word = attr(&hl, "Doxy", "Word");
    assert_eq!(hl.hl_key_for_attribute(word), "Doxy");
    assert_eq!(hl.hl_key_for_attribute(0), "MiniC");

    let doxy = repository().compile("Doxy", 64).unwrap();
    assert_eq!(doxy.embedded_highlighting_modes(), &["MiniC".to_string()]);
    assert!(doxy.info().hidden);
    assert_eq!(hl.info().author.as_deref(), Some("Katepart Authors"));
    assert_eq!(hl.info().version, 3);
}

#[test]
fn test_keywords_numbers_and_strings() {
    let hl = minic();
    let line = hl.highlight_line(None, "int x = \"a\\tb\"; y = 3.14 + 42;", None);
    assert_eq!(line.attribute_at(0), Some(attr(&hl, "MiniC", "Keyword")));
    assert_eq!(line.attribute_at(4), Some(0));
    assert_eq!(line.attribute_at(8), Some(attr(&hl, "MiniC", "String")));
    assert_eq!(line.attribute_at(10), Some(attr(&hl, "MiniC", "Escape")));
    assert_eq!(line.attribute_at(12), Some(attr(&hl, "MiniC", "String")));
    assert_eq!(line.attribute_at(20), Some(attr(&hl, "MiniC", "Float")));
    assert_eq!(line.attribute_at(27), Some(attr(&hl, "MiniC", "Number")));
    assert!(line.state.is_initial());

    // Spans are ordered and cover the line without overlap.
    let mut end = 0;
    for span in &line.spans {
        assert_eq!(span.offset, end);
        end = span.end();
    }
    assert_eq!(end, line_len("int x = \"a\\tb\"; y = 3.14 + 42;"));
}

fn line_len(s: &str) -> usize {
    s.chars().count()
}

#[test]
fn test_block_comment_with_embedded_tags() {
    let hl = minic();
    let comment = attr(&hl, "MiniC", "Comment");
    let tag = hl.formats().index_of("shared:tag").unwrap();

    let line = hl.highlight_line(None, "/* @brief text */ x", None);
    assert_eq!(line.attribute_at(0), Some(comment));
    assert_eq!(line.attribute_at(3), Some(tag));
    assert_eq!(line.attribute_at(8), Some(tag));
    assert_eq!(line.attribute_at(10), Some(comment));
    assert_eq!(line.attribute_at(16), Some(comment));
    assert_eq!(line.attribute_at(18), Some(0));
    assert!(line.state.is_initial());
    assert!(!line.folding_start);
    assert_eq!(line.folding.len(), 2);
    assert_eq!(line.folding[0].kind, FoldingKind::Begin);
    assert_eq!(line.folding[1].kind, FoldingKind::End);
}

#[test]
fn test_multiline_comment_state_and_folding() {
    let hl = minic();
    let first = hl.highlight_line(None, "x /* open", None);
    assert!(!first.state.is_initial());
    assert!(first.folding_start);

    let second = hl.highlight_line(Some(&first.state), "still open", None);
    assert_eq!(second.state, first.state);
    assert_eq!(second.attribute_at(0), Some(attr(&hl, "MiniC", "Comment")));

    let third = hl.highlight_line(Some(&second.state), "done */ int", None);
    assert!(third.state.is_initial());
    assert_eq!(third.attribute_at(8), Some(attr(&hl, "MiniC", "Keyword")));
}

#[test]
fn test_embedded_code_block_returns_to_host_rules() {
    let hl = minic();
    let line = hl.highlight_line(None, "// @code int 1", None);
    let tag = hl.formats().index_of("shared:tag").unwrap();
    assert_eq!(line.attribute_at(3), Some(tag));
    assert_eq!(line.attribute_at(8), Some(attr(&hl, "Doxy", "Word")));
    assert_eq!(line.attribute_at(9), Some(attr(&hl, "MiniC", "Keyword")));
    assert_eq!(line.attribute_at(13), Some(attr(&hl, "MiniC", "Number")));
    // Both the embedded context and the line comment end with the line.
    assert!(line.state.is_initial());
}

#[test]
fn test_first_non_space_and_line_continuation() {
    let hl = minic();
    let pre = attr(&hl, "MiniC", "Preprocessor");

    let line = hl.highlight_line(None, "  #define X \\", Some("  1"));
    assert_eq!(line.attribute_at(2), Some(pre));
    assert!(!line.state.is_initial());
    let next = hl.highlight_line(Some(&line.state), "  1", None);
    assert_eq!(next.attribute_at(2), Some(pre));
    assert!(next.state.is_initial());

    let line = hl.highlight_line(None, "a #b", None);
    assert_ne!(line.attribute_at(2), Some(pre));
}

#[test]
fn test_context_at_column() {
    let hl = minic();
    let buffer = Buffer::new(&hl, "int x = \"ab\";\n/* c\nd */ e");

    assert_eq!(hl.context_at(&buffer, 0, 0).unwrap().name, "Normal");
    assert_eq!(hl.context_at(&buffer, 0, 8).unwrap().name, "Normal");
    assert_eq!(hl.context_at(&buffer, 0, 9).unwrap().name, "String");
    assert_eq!(hl.context_at(&buffer, 0, 12).unwrap().name, "Normal");
    assert_eq!(hl.context_at(&buffer, 1, 3).unwrap().name, "BlockComment");
    assert_eq!(hl.context_at(&buffer, 2, 0).unwrap().name, "BlockComment");
    assert_eq!(hl.context_at(&buffer, 2, 5).unwrap().name, "Normal");
    assert!(hl.context_at(&buffer, 7, 0).is_none());

    let string = hl.context_at(&buffer, 0, 9).unwrap().id;
    assert_eq!(hl.hl_key_for_context(string), "MiniC");
    assert_eq!(hl.attribute(string), attr(&hl, "MiniC", "String"));
}

#[test]
fn test_comment_queries() {
    let hl = minic();
    let keyword = attr(&hl, "MiniC", "Keyword");
    let string = attr(&hl, "MiniC", "String");
    let word = attr(&hl, "Doxy", "Word");

    assert_eq!(hl.comment_start(keyword), "/*");
    assert_eq!(hl.comment_end(keyword), "*/");
    assert_eq!(hl.comment_single_line_start(keyword), "//");
    assert_eq!(
        hl.comment_single_line_position(keyword),
        SingleLineCommentPosition::AfterWhitespace
    );
    assert_eq!(hl.comment_region(keyword), 1);

    assert!(hl.can_comment(keyword, string));
    assert!(!hl.can_comment(keyword, word));
    assert!(!hl.can_comment(word, word));
    assert_eq!(hl.comment_start(word), "");
}

#[test]
fn test_empty_line_patterns() {
    let hl = minic();
    assert!(hl.is_empty_line("", 0));
    assert!(hl.is_empty_line("    ", 0));
    assert!(hl.is_empty_line("  // just a note", 0));
    assert!(!hl.is_empty_line("int x;", 0));
    assert!(!hl.is_empty_line("x // note", 0));
}

#[test]
fn test_plain_text_mode() {
    let hl = Highlighting::none();
    let line = hl.highlight_line(None, "foo bar quzzi", None);
    assert!(line.spans.is_empty());
    assert!(!hl.is_empty_line("foo bar quzzi", 0));
}

#[test]
fn test_character_encodings_and_spellcheck() {
    let hl = minic();
    let normal = 0;
    assert_eq!(hl.character_encodings(normal).get("\\\"a"), Some(&'ä'));
    assert_eq!(
        hl.reverse_character_encodings(normal).get(&'ß').map(String::as_str),
        Some("\\ss")
    );
    assert_eq!(
        hl.character_encodings_prefix_store(normal)
            .longest_prefix_match("x\\\"ab", 1),
        Some("\\\"a")
    );
    assert_eq!(
        hl.encoded_characters_insertion_policy(normal),
        EncodedCharactersInsertionPolicy::Encode
    );

    let pre = attr(&hl, "MiniC", "Preprocessor");
    assert!(!hl.attribute_requires_spellchecking(pre));
    assert!(hl.attribute_requires_spellchecking(0));
    assert_eq!(hl.default_style_for_attribute(pre), DefaultStyle::Preprocessor);
}

#[test]
fn test_determinism_across_instances() {
    let a = minic();
    let b = minic();
    let text = "for (int i = 0; i < 10; i++) { /* x */ }";
    assert_eq!(
        a.highlight_line(None, text, None),
        b.highlight_line(None, text, None)
    );
}

fn compile_inline(yaml: &str, max_depth: usize) -> Highlighting {
    let def = SyntaxDefinition::from_yaml_str(yaml).expect("parse");
    Highlighting::compile(Arc::new(def), |_| None, max_depth).expect("compile")
}

#[test]
fn test_dangling_reference_recovery() {
    let hl = compile_inline(
        r###"
name: Dangling
contexts:
  - name: Normal
    attribute: Normal Text
    rules:
      - detect_char: "!"
        attribute: Bang
        context: Missing
formats:
  - name: Normal Text
  - name: Bang
    style: alert
"###,
        64,
    );
    assert!(matches!(
        hl.diagnostics(),
        [Diagnostic::DanglingContextReference { target, .. }] if target == "Missing"
    ));

    let line = hl.highlight_line(None, "a!b", None);
    assert_eq!(line.spans.len(), 1);
    assert_eq!(line.spans[0].length, 3);
    assert_eq!(line.spans[0].attribute, 0);
    assert!(line.state.is_initial());
    assert!(
        line.diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DanglingContextReference { .. }))
    );
}

#[test]
fn test_context_stack_depth_cap() {
    let hl = compile_inline(
        r###"
name: Parens
contexts:
  - name: Normal
    attribute: Normal Text
    rules:
      - detect_char: "("
        context: Nested
  - name: Nested
    attribute: Normal Text
    rules:
      - detect_char: "("
        context: Nested
      - detect_char: ")"
        context: "#pop"
"###,
        4,
    );
    let line = hl.highlight_line(None, "((((((((", None);
    assert_eq!(line.state.contexts().len(), 4);
    assert!(
        line.diagnostics
            .contains(&Diagnostic::UnboundedContextStackGrowth { max_depth: 4 })
    );

    // Pops never remove the bottom of the stack.
    let line = hl.highlight_line(Some(&line.state), "))))))))", None);
    assert_eq!(line.state.contexts().len(), 1);
    assert!(!line.state.is_initial());
}

#[test]
fn test_zero_width_match_forces_progress() {
    let hl = compile_inline(
        r###"
name: Zero
contexts:
  - name: Normal
    attribute: Normal Text
    rules:
      - regex: "(?=x)"
      - detect_char: "y"
        lookahead: true
"###,
        64,
    );
    let line = hl.highlight_line(None, "xyx", None);
    assert_eq!(line.spans.len(), 1);
    assert_eq!(line.spans[0].length, 3);
    assert!(line.diagnostics.contains(&Diagnostic::ZeroProgressMatch {
        context: "Normal".to_string(),
        column: 0,
    }));
    assert!(line.diagnostics.contains(&Diagnostic::ZeroProgressMatch {
        context: "Normal".to_string(),
        column: 1,
    }));
}

#[test]
fn test_line_empty_switch() {
    let hl = compile_inline(
        r###"
name: Heredoc
contexts:
  - name: Normal
    attribute: Normal Text
    rules:
      - string: "<<"
        attribute: Doc
        context: Doc
  - name: Doc
    attribute: Doc
    line_empty: "#pop"
formats:
  - name: Normal Text
  - name: Doc
    style: verbatim_string
"###,
        64,
    );
    let start = hl.highlight_line(None, "x <<", None);
    let body = hl.highlight_line(Some(&start.state), "some text", None);
    assert_eq!(body.state, start.state);
    assert_eq!(body.attribute_at(0), Some(1));
    let end = hl.highlight_line(Some(&body.state), "", None);
    assert!(end.state.is_initial());
}
