use katepart_document::{Document, FoldRegion, Position};
use katepart_syntax::{Highlighting, Repository};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn minic() -> Arc<Highlighting> {
    let mut repo = Repository::new();
    repo.load_from_str(include_str!("../../katepart-syntax/tests/fixtures/minic.yaml"))
        .expect("load MiniC");
    repo.load_from_str(include_str!("../../katepart-syntax/tests/fixtures/doxy.yaml"))
        .expect("load Doxy");
    Arc::new(repo.compile("MiniC", 64).expect("compile MiniC"))
}

fn attr(mode: &Highlighting, name: &str) -> usize {
    mode.formats().index_by_name("MiniC", name).unwrap()
}

#[test]
fn test_opening_and_closing_a_comment_cascades() {
    let mode = minic();
    let text = vec!["int x;"; 50].join("\n");
    let mut doc = Document::new(&text, mode.clone());
    doc.ensure_highlighted(usize::MAX);
    assert_eq!(doc.highlighted_until(), 50);

    doc.insert_text(Position::new(10, 0), "/*");
    let stats = doc.last_cascade();
    assert_eq!(stats.first_line, 10);
    assert_eq!(stats.lines_highlighted, 40);
    assert_eq!(stats.converged_at, None);
    assert_eq!(doc.attribute_at(Position::new(30, 0)), attr(&mode, "Comment"));

    doc.insert_text(Position::new(20, 0), "*/");
    assert_eq!(doc.last_cascade().lines_highlighted, 30);
    assert_eq!(doc.attribute_at(Position::new(30, 0)), attr(&mode, "Keyword"));
    assert_eq!(doc.fold_regions(), vec![FoldRegion::new(10, 20, 1)]);

    // An edit that keeps the end state touches one line.
    doc.set_line_text(5, "int yy;");
    let stats = doc.last_cascade();
    assert_eq!(stats.lines_highlighted, 1);
    assert_eq!(stats.converged_at, Some(5));
    assert_eq!(doc.highlighted_until(), 50);
}

#[test]
fn test_joining_lines_repairs_the_cache() {
    let mode = minic();
    let mut doc = Document::new("int a; /*\nx\n*/ int b;\nint c;", mode.clone());
    doc.ensure_highlighted(usize::MAX);
    assert_eq!(doc.attribute_at(Position::new(1, 0)), attr(&mode, "Comment"));

    // Remove "/*" and the line break after it.
    doc.remove_text(Position::new(0, 7), Position::new(1, 0));
    assert_eq!(doc.line(0).as_deref(), Some("int a; x"));
    assert_eq!(doc.line_count(), 3);
    assert_eq!(doc.attribute_at(Position::new(0, 7)), 0);
    assert_eq!(doc.attribute_at(Position::new(2, 0)), attr(&mode, "Keyword"));
    assert!(doc.fold_regions().is_empty());
}

#[test]
fn test_queries_follow_the_highlight() {
    let mode = minic();
    let mut doc = Document::new("int a;\n\n  // note\n/* c\n\n*/", mode.clone());

    assert!(!doc.is_empty_line(0));
    assert!(doc.is_empty_line(1));
    assert!(doc.is_empty_line(2));
    assert!(doc.is_empty_line(4));

    let id = doc.context_at(Position::new(3, 3)).unwrap();
    assert_eq!(mode.context(id).unwrap().name, "BlockComment");
    let id = doc.context_at(Position::new(0, 1)).unwrap();
    assert_eq!(mode.context(id).unwrap().name, "Normal");
    assert_eq!(doc.fold_regions(), vec![FoldRegion::new(3, 5, 1)]);
}

#[test]
fn test_word_motion_uses_mode_delimiters() {
    let mut doc = Document::new("x = foo_bar;", minic());
    let mut pos = Position::new(0, 0);
    let mut stops = Vec::new();
    for _ in 0..4 {
        pos = doc.word_right(pos);
        stops.push(pos.column);
    }
    assert_eq!(stops, vec![2, 4, 11, 12]);
    assert_eq!(doc.word_left(Position::new(0, 11)), Position::new(0, 4));
}

#[test]
fn test_word_motion_across_lines() {
    let text = "hello  there...\n\tno  one answers.";
    let mut doc = Document::new(text, Arc::new(Highlighting::none()));

    let mut pos = Position::new(0, 0);
    let mut right = Vec::new();
    for _ in 0..8 {
        pos = doc.word_right(pos);
        right.push((pos.line, pos.column));
    }
    assert_eq!(
        right,
        vec![(0, 7), (0, 12), (0, 15), (1, 1), (1, 5), (1, 9), (1, 16), (1, 17)]
    );

    let mut left = Vec::new();
    for _ in 0..8 {
        pos = doc.word_left(pos);
        left.push((pos.line, pos.column));
    }
    assert_eq!(
        left,
        vec![(1, 16), (1, 9), (1, 5), (1, 1), (0, 15), (0, 12), (0, 7), (0, 0)]
    );
}

const SNIPPETS: &[&str] = &[
    "/*", "*/", "\"", "\n", "x", "// c", "{", "}", "\\", " ", "#", "int ", "@code ", "3.5",
];

fn random_position(rng: &mut StdRng, doc: &Document) -> Position {
    let line = rng.gen_range(0..doc.line_count());
    let column = rng.gen_range(0..=doc.line_len(line));
    Position::new(line, column)
}

#[test]
fn test_random_edits_match_full_rehighlight() {
    let mode = minic();
    let seed_text = "int main() {\n  char *s = \"a\\tb\";\n  /* block\n   * @brief x */\n  return 0; // done\n}\n#define X \\\n  1\n";
    let mut doc = Document::new(seed_text, mode.clone());
    let mut rng = StdRng::seed_from_u64(0x6b617465);

    for step in 0..300 {
        if rng.gen_bool(0.5) {
            let line = rng.gen_range(0..doc.line_count());
            doc.ensure_highlighted(line);
        }

        if rng.gen_bool(0.6) {
            let at = random_position(&mut rng, &doc);
            let snippet = SNIPPETS[rng.gen_range(0..SNIPPETS.len())];
            doc.insert_text(at, snippet);
        } else {
            let start = random_position(&mut rng, &doc);
            let end_line = (start.line + rng.gen_range(0..2)).min(doc.line_count() - 1);
            let end = Position::new(end_line, rng.gen_range(0..=doc.line_len(end_line)));
            doc.remove_text(start, end);
        }

        doc.ensure_highlighted(usize::MAX);
        let mut fresh = Document::new(&doc.text(), mode.clone());
        fresh.ensure_highlighted(usize::MAX);
        assert_eq!(doc.line_count(), fresh.line_count());
        for line in 0..doc.line_count() {
            assert_eq!(
                doc.line_highlight(line).cloned(),
                fresh.line_highlight(line).cloned(),
                "line {line} differs after step {step}:\n{}",
                doc.text()
            );
        }
    }
}
