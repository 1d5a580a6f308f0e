//! Per-line incremental highlighting.

use crate::compiler::{Pool, compile_pool};
use crate::context::{
    Context, ContextId, ContextSwitch, ContextTarget, FALLBACK_CONTEXT, LineText, Matcher,
    RegionId,
};
use crate::definition::SyntaxDefinition;
use crate::error::{Diagnostic, HighlightError};
use crate::format::{AttributeIndex, Format, FormatRegistry};
use crate::property::{DEFAULT_HL_KEY, HighlightPropertyBag, STD_DELIMINATOR};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Default cap on the context stack depth.
pub const DEFAULT_MAX_CONTEXT_DEPTH: usize = 64;

/// Name of the no-highlighting mode.
pub const NO_HIGHLIGHTING: &str = "None";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

fn next_instance() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

/// Resumable lexer state carried from one line to the next.
///
/// The stack is stored in canonical form: a stack holding only the initial context is
/// stored empty, so it compares equal to [`HighlightState::initial`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HighlightState {
    stack: Vec<ContextId>,
}

impl HighlightState {
    /// The state before the first line.
    pub fn initial() -> Self {
        Self::default()
    }

    /// Returns `true` for the initial state.
    pub fn is_initial(&self) -> bool {
        self.stack.is_empty()
    }

    /// Stored contexts, bottom first. Empty for the initial state.
    pub fn contexts(&self) -> &[ContextId] {
        &self.stack
    }

    fn expand(&self, initial: ContextId) -> Vec<ContextId> {
        if self.stack.is_empty() {
            vec![initial]
        } else {
            self.stack.clone()
        }
    }

    fn canonical(stack: Vec<ContextId>, initial: ContextId) -> Self {
        if stack.len() == 1 && stack[0] == initial {
            Self::default()
        } else {
            Self { stack }
        }
    }
}

/// A run of text with one attribute. Offsets and lengths are in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpan {
    /// Start column.
    pub offset: usize,
    /// Length in chars.
    pub length: usize,
    /// Attribute index into the mode's format registry.
    pub attribute: AttributeIndex,
}

impl AttributeSpan {
    /// Exclusive end column.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Whether a folding marker opens or closes a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldingKind {
    /// Region start.
    Begin,
    /// Region end.
    End,
}

/// A folding marker produced by a rule with `begin_region`/`end_region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldingMarker {
    /// Column of the match.
    pub offset: usize,
    /// Length of the match.
    pub length: usize,
    /// Region id.
    pub region: RegionId,
    /// Begin or end.
    pub kind: FoldingKind,
}

/// The result of highlighting one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineHighlight {
    /// Ordered, non-overlapping attribute spans.
    pub spans: Vec<AttributeSpan>,
    /// Folding markers in line order.
    pub folding: Vec<FoldingMarker>,
    /// Some region opened on this line is not closed on it.
    pub folding_start: bool,
    /// State at the end of the line.
    pub state: HighlightState,
    /// Recoverable problems noticed while scanning the line.
    pub diagnostics: Vec<Diagnostic>,
}

impl LineHighlight {
    /// Attribute of the character at `column`, if some span covers it.
    pub fn attribute_at(&self, column: usize) -> Option<AttributeIndex> {
        self.spans
            .iter()
            .find(|s| s.offset <= column && column < s.end())
            .map(|s| s.attribute)
    }
}

/// A point in a line where the active context changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextChange {
    /// Column where the new context becomes active.
    pub column: usize,
    /// The new top-of-stack context.
    pub context: ContextId,
}

/// Result of [`Highlighting::do_highlight`].
#[derive(Debug, Clone)]
pub struct HighlightOutcome {
    /// The freshly highlighted line.
    pub line: LineHighlight,
    /// The end state differs from the cached one, so the next line must be redone.
    pub state_changed: bool,
}

/// Descriptive fields of a loaded mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeInfo {
    /// Mode name.
    pub name: String,
    /// Localized name.
    pub translated_name: Option<String>,
    /// Menu section.
    pub section: String,
    /// Localized section.
    pub translated_section: Option<String>,
    /// Hidden from mode pickers.
    pub hidden: bool,
    /// Definition version.
    pub version: u32,
    /// Default indenter style.
    pub style: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// License.
    pub license: Option<String>,
    /// File name globs.
    pub extensions: Vec<String>,
    /// Source file, if loaded from disk.
    pub file_path: Option<PathBuf>,
    /// Folding follows indentation.
    pub indentation_sensitive: bool,
}

impl ModeInfo {
    fn from_definition(def: &SyntaxDefinition) -> Self {
        Self {
            name: def.name.clone(),
            translated_name: def.translated_name.clone(),
            section: def.section.clone(),
            translated_section: def.translated_section.clone(),
            hidden: def.hidden,
            version: def.version,
            style: def.style.clone(),
            author: def.author.clone(),
            license: def.license.clone(),
            extensions: def.extensions.clone(),
            file_path: def.file_path.clone(),
            indentation_sensitive: def.indentation_sensitive,
        }
    }
}

/// A compiled highlighting mode, shared read-only by every document that uses it.
#[derive(Debug)]
pub struct Highlighting {
    instance: u64,
    info: ModeInfo,
    no_hl: bool,
    pub(crate) contexts: Vec<Context>,
    pub(crate) registry: FormatRegistry,
    pub(crate) bags: HashMap<String, HighlightPropertyBag>,
    pub(crate) embedded: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    initial: ContextId,
    max_depth: usize,
}

impl Highlighting {
    /// The no-highlighting mode: one default context, one "Normal Text" attribute.
    pub fn none() -> Self {
        let mut registry = FormatRegistry::new();
        registry.register_format(Format::normal_text(NO_HIGHLIGHTING));
        let mut bags = HashMap::new();
        bags.insert(DEFAULT_HL_KEY.to_string(), HighlightPropertyBag::default());

        Self {
            instance: next_instance(),
            info: ModeInfo {
                name: NO_HIGHLIGHTING.to_string(),
                version: 1,
                ..ModeInfo::default()
            },
            no_hl: true,
            contexts: vec![Context {
                id: FALLBACK_CONTEXT,
                name: "Normal Text".to_string(),
                definition: NO_HIGHLIGHTING.to_string(),
                attribute: 0,
                line_end: ContextSwitch::stay(),
                line_empty: None,
                fallthrough: None,
                rules: Vec::new(),
                deliminator: Arc::from(STD_DELIMINATOR),
                case_sensitive: true,
            }],
            registry,
            bags,
            embedded: Vec::new(),
            diagnostics: Vec::new(),
            initial: FALLBACK_CONTEXT,
            max_depth: DEFAULT_MAX_CONTEXT_DEPTH,
        }
    }

    /// Compile `definition` together with every definition it references.
    ///
    /// `lookup` resolves `##Name` references to other definitions.
    pub fn compile<F>(
        definition: Arc<SyntaxDefinition>,
        lookup: F,
        max_depth: usize,
    ) -> Result<Self, HighlightError>
    where
        F: FnMut(&str) -> Option<Arc<SyntaxDefinition>>,
    {
        let info = ModeInfo::from_definition(&definition);
        let Pool {
            contexts,
            registry,
            bags,
            embedded,
            initial,
            diagnostics,
        } = compile_pool(definition, lookup)?;

        debug!(
            mode = %info.name,
            contexts = contexts.len(),
            formats = registry.len(),
            embedded = embedded.len(),
            "compiled highlighting mode"
        );

        Ok(Self {
            instance: next_instance(),
            info,
            no_hl: false,
            contexts,
            registry,
            bags,
            embedded,
            diagnostics,
            initial,
            max_depth: max_depth.max(1),
        })
    }

    /// Compile a single self-contained definition.
    pub fn from_definition(definition: SyntaxDefinition) -> Result<Self, HighlightError> {
        Self::compile(Arc::new(definition), |_| None, DEFAULT_MAX_CONTEXT_DEPTH)
    }

    /// Identifier unique to this compiled instance; a recompiled mode gets a new one.
    pub fn instance_id(&self) -> u64 {
        self.instance
    }

    /// Descriptive fields.
    pub fn info(&self) -> &ModeInfo {
        &self.info
    }

    /// Mode name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Returns `true` for the no-highlighting mode.
    pub fn no_highlighting(&self) -> bool {
        self.no_hl
    }

    /// Problems found while compiling.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Context at the bottom of the stack before the first line.
    pub fn initial_context(&self) -> ContextId {
        self.initial
    }

    /// Context stack depth cap.
    pub fn max_context_depth(&self) -> usize {
        self.max_depth
    }

    /// All contexts, indexed by [`ContextId`].
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    /// The context with this id.
    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(id)
    }

    /// The format registry.
    pub fn formats(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Top of the stack described by `state`.
    pub fn top_context(&self, state: &HighlightState) -> ContextId {
        state.contexts().last().copied().unwrap_or(self.initial)
    }

    /// Highlight one line.
    ///
    /// `prev` is the end state of the previous line (`None` for the first line). `next_line`
    /// is the text of the following line if there is one; it only decides whether a line
    /// continuation carries the context over.
    pub fn highlight_line(
        &self,
        prev: Option<&HighlightState>,
        text: &str,
        next_line: Option<&str>,
    ) -> LineHighlight {
        self.scan(prev, text, next_line, None)
    }

    /// Like [`highlight_line`](Self::highlight_line), also recording every context change.
    ///
    /// The first record is always column 0 with the context the line starts in.
    pub fn highlight_line_with_changes(
        &self,
        prev: Option<&HighlightState>,
        text: &str,
        next_line: Option<&str>,
    ) -> (LineHighlight, Vec<ContextChange>) {
        let mut changes = Vec::new();
        let line = self.scan(prev, text, next_line, Some(&mut changes));
        (line, changes)
    }

    /// Highlight one line and compare its end state with the cached one.
    pub fn do_highlight(
        &self,
        prev: Option<&HighlightState>,
        cached_end: Option<&HighlightState>,
        text: &str,
        next_line: Option<&str>,
    ) -> HighlightOutcome {
        let line = self.highlight_line(prev, text, next_line);
        let state_changed = cached_end != Some(&line.state);
        HighlightOutcome {
            line,
            state_changed,
        }
    }

    fn scan(
        &self,
        prev: Option<&HighlightState>,
        text: &str,
        next_line: Option<&str>,
        mut changes: Option<&mut Vec<ContextChange>>,
    ) -> LineHighlight {
        let prev = prev.cloned().unwrap_or_default();
        if self.no_hl {
            if let Some(changes) = changes.as_deref_mut() {
                changes.push(ContextChange {
                    column: 0,
                    context: FALLBACK_CONTEXT,
                });
            }
            return LineHighlight {
                state: prev,
                ..LineHighlight::default()
            };
        }

        let mut scanner = Scanner {
            hl: self,
            stack: prev.expand(self.initial),
            spans: Vec::new(),
            folding: Vec::new(),
            diagnostics: Vec::new(),
            changes,
        };
        scanner.record(0);
        scanner.run(text, next_line);

        let folding_start = opens_region(&scanner.folding);
        let Scanner {
            stack,
            spans,
            folding,
            diagnostics,
            ..
        } = scanner;
        LineHighlight {
            spans,
            folding,
            folding_start,
            state: HighlightState::canonical(stack, self.initial),
            diagnostics,
        }
    }
}

enum SwitchResult {
    Unchanged,
    Changed,
    Dangling,
}

struct Scanner<'a, 'c> {
    hl: &'a Highlighting,
    stack: Vec<ContextId>,
    spans: Vec<AttributeSpan>,
    folding: Vec<FoldingMarker>,
    diagnostics: Vec<Diagnostic>,
    changes: Option<&'c mut Vec<ContextChange>>,
}

impl<'a> Scanner<'a, '_> {
    fn top(&self) -> &'a Context {
        let hl: &'a Highlighting = self.hl;
        let id = self.stack.last().copied().unwrap_or(hl.initial);
        hl.contexts
            .get(id)
            .unwrap_or(&hl.contexts[FALLBACK_CONTEXT])
    }

    fn record(&mut self, column: usize) {
        let context = self.top().id;
        if let Some(changes) = self.changes.as_deref_mut() {
            changes.push(ContextChange { column, context });
        }
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    fn emit(&mut self, start: usize, end: usize, attribute: AttributeIndex) {
        if start >= end {
            return;
        }
        if let Some(last) = self.spans.last_mut()
            && last.attribute == attribute
            && last.end() == start
        {
            last.length = end - last.offset;
            return;
        }
        self.spans.push(AttributeSpan {
            offset: start,
            length: end - start,
            attribute,
        });
    }

    fn run(&mut self, text: &str, next_line: Option<&str>) {
        let line = LineText::new(text);
        let len = line.len();
        let first_non_space = line.first_non_space();
        // Non-consuming stack changes allowed at one position before progress is forced.
        let stall_limit = self.hl.max_depth * 2 + self.hl.contexts.len();
        let mut stalls = 0;
        let mut continued = false;
        let mut pos = 0;

        while pos < len {
            if stalls > stall_limit {
                let ctx = self.top();
                let (name, attribute) = (ctx.name.clone(), ctx.attribute);
                debug!(context = %name, column = pos, "forcing progress after repeated switches");
                self.diagnose(Diagnostic::ZeroProgressMatch {
                    context: name,
                    column: pos,
                });
                self.emit(pos, pos + 1, attribute);
                pos += 1;
                stalls = 0;
                continue;
            }

            let ctx = self.top();
            let hit = ctx.rules.iter().find_map(|rule| {
                if rule.first_non_space && Some(pos) != first_non_space {
                    return None;
                }
                if rule.column.is_some_and(|c| c != pos) {
                    return None;
                }
                rule.matcher
                    .match_at(&line, pos, ctx)
                    .map(|end| (rule, end))
            });

            let Some((rule, end)) = hit else {
                let ctx_attribute = ctx.attribute;
                if let Some(fallthrough) = ctx.fallthrough.clone()
                    && matches!(self.apply(&fallthrough), SwitchResult::Changed)
                {
                    self.record(pos);
                    stalls += 1;
                    continue;
                }
                self.emit(pos, pos + 1, ctx_attribute);
                pos += 1;
                stalls = 0;
                continue;
            };

            let ctx_attribute = ctx.attribute;
            let ctx_name = ctx.name.clone();
            let mut attribute = rule.attribute.unwrap_or(ctx_attribute);
            if matches!(rule.matcher, Matcher::LineContinue(_)) {
                continued = true;
            }
            if let Some(region) = rule.end_region {
                self.folding.push(FoldingMarker {
                    offset: pos,
                    length: end - pos,
                    region,
                    kind: FoldingKind::End,
                });
            }
            if let Some(region) = rule.begin_region {
                self.folding.push(FoldingMarker {
                    offset: pos,
                    length: end - pos,
                    region,
                    kind: FoldingKind::Begin,
                });
            }
            let lookahead = rule.lookahead;
            let switch = rule.switch.clone();

            let changed = match self.apply(&switch) {
                SwitchResult::Changed => true,
                SwitchResult::Unchanged => false,
                SwitchResult::Dangling => {
                    attribute = ctx_attribute;
                    false
                }
            };

            let consumed = if lookahead { pos } else { end };
            if consumed == pos && !changed {
                debug!(context = %ctx_name, column = pos, "zero-width match without a switch");
                self.diagnose(Diagnostic::ZeroProgressMatch {
                    context: ctx_name,
                    column: pos,
                });
                self.emit(pos, pos + 1, ctx_attribute);
                pos += 1;
                stalls = 0;
                continue;
            }

            self.emit(pos, consumed, attribute);
            if consumed > pos {
                stalls = 0;
            } else {
                stalls += 1;
            }
            pos = consumed;
            if changed {
                self.record(pos);
            }
        }

        if continued && next_line.is_some() {
            return;
        }
        self.end_of_line(len == 0, len);
    }

    fn end_of_line(&mut self, empty: bool, column: usize) {
        for _ in 0..=self.hl.max_depth + self.hl.contexts.len() {
            let ctx = self.top();
            let switch = if empty {
                ctx.line_empty.as_ref().unwrap_or(&ctx.line_end)
            } else {
                &ctx.line_end
            };
            if switch.is_stay() {
                return;
            }
            let switch = switch.clone();
            match self.apply(&switch) {
                SwitchResult::Changed => self.record(column),
                SwitchResult::Unchanged | SwitchResult::Dangling => return,
            }
        }
    }

    fn apply(&mut self, switch: &ContextSwitch) -> SwitchResult {
        if let Some(ContextTarget::Unresolved(target)) = &switch.push {
            let context = self.top().name.clone();
            debug!(context = %context, target = %target, "switch to unknown context ignored");
            let target = target.clone();
            self.diagnose(Diagnostic::DanglingContextReference { context, target });
            return SwitchResult::Dangling;
        }

        let before = self.stack.clone();
        for _ in 0..switch.pops {
            if self.stack.len() <= 1 {
                break;
            }
            self.stack.pop();
        }
        if let Some(ContextTarget::Context(id)) = switch.push {
            self.stack.push(id);
            let max_depth = self.hl.max_depth;
            if self.stack.len() > max_depth {
                let excess = self.stack.len() - max_depth;
                self.stack.drain(..excess);
                warn!(max_depth, "context stack too deep, dropping oldest entries");
                self.diagnose(Diagnostic::UnboundedContextStackGrowth { max_depth });
            }
        }

        if self.stack == before {
            SwitchResult::Unchanged
        } else {
            SwitchResult::Changed
        }
    }
}

fn opens_region(markers: &[FoldingMarker]) -> bool {
    let mut open: Vec<RegionId> = Vec::new();
    for marker in markers {
        match marker.kind {
            FoldingKind::Begin => open.push(marker.region),
            FoldingKind::End => {
                if let Some(i) = open.iter().rposition(|r| *r == marker.region) {
                    open.remove(i);
                }
            }
        }
    }
    !open.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(yaml: &str) -> Highlighting {
        Highlighting::from_definition(SyntaxDefinition::from_yaml_str(yaml).unwrap()).unwrap()
    }

    const C_LIKE: &str = r###"
name: MiniC
lists:
  keywords: [if, else, return]
contexts:
  - name: Normal
    attribute: Normal Text
    rules:
      - keyword: keywords
        attribute: Keyword
      - detect_char: "{"
        begin_region: Brace
      - detect_char: "}"
        end_region: Brace
      - detect_2chars: "/*"
        attribute: Comment
        context: Comment
      - detect_char: '"'
        attribute: String
        context: String
      - int:
        attribute: Number
  - name: Comment
    attribute: Comment
    rules:
      - detect_2chars: "*/"
        context: "#pop"
  - name: String
    attribute: String
    line_end: "#pop"
    rules:
      - line_continue:
      - detect_char: '"'
        context: "#pop"
formats:
  - name: Normal Text
  - name: Keyword
    style: keyword
  - name: Comment
    style: comment
  - name: String
    style: string
  - name: Number
    style: dec_val
"###;

    #[test]
    fn test_spans_cover_line_and_merge() {
        let hl = mode(C_LIKE);
        let line = hl.highlight_line(None, "if x1 42", None);
        let kw = hl.formats().index_by_name("MiniC", "Keyword").unwrap();
        let num = hl.formats().index_by_name("MiniC", "Number").unwrap();
        assert_eq!(
            line.spans,
            vec![
                AttributeSpan { offset: 0, length: 2, attribute: kw },
                AttributeSpan { offset: 2, length: 4, attribute: 0 },
                AttributeSpan { offset: 6, length: 2, attribute: num },
            ]
        );
        assert!(line.state.is_initial());
    }

    #[test]
    fn test_multiline_comment_state() {
        let hl = mode(C_LIKE);
        let first = hl.highlight_line(None, "x /* open", None);
        assert_eq!(first.state.contexts(), &[1, 2]);
        let second = hl.highlight_line(Some(&first.state), "still */ y", None);
        assert!(second.state.is_initial());
        let comment = hl.formats().index_by_name("MiniC", "Comment").unwrap();
        assert_eq!(second.attribute_at(0), Some(comment));
        assert_eq!(second.attribute_at(9), Some(0));
    }

    #[test]
    fn test_line_end_and_continuation() {
        let hl = mode(C_LIKE);
        let open = hl.highlight_line(None, "\"abc", None);
        assert!(open.state.is_initial());

        let continued = hl.highlight_line(None, "\"abc\\", Some("def\""));
        assert_eq!(continued.state.contexts(), &[1, 3]);
        // No following line: the continuation does not carry.
        let last = hl.highlight_line(None, "\"abc\\", None);
        assert!(last.state.is_initial());
    }

    #[test]
    fn test_folding_start() {
        let hl = mode(C_LIKE);
        assert!(hl.highlight_line(None, "if {", None).folding_start);
        assert!(!hl.highlight_line(None, "{ }", None).folding_start);
        let closing = hl.highlight_line(None, "}", None);
        assert!(!closing.folding_start);
        assert_eq!(closing.folding[0].kind, FoldingKind::End);
    }

    #[test]
    fn test_highlight_is_idempotent() {
        let hl = mode(C_LIKE);
        let prev = hl.highlight_line(None, "/* a", None).state;
        let a = hl.highlight_line(Some(&prev), "b */ if 1", None);
        let b = hl.highlight_line(Some(&prev), "b */ if 1", None);
        assert_eq!(a, b);

        let outcome = hl.do_highlight(Some(&prev), Some(&a.state), "b */ if 1", None);
        assert!(!outcome.state_changed);
        let outcome = hl.do_highlight(Some(&prev), None, "b */ if 1", None);
        assert!(outcome.state_changed);
    }

    #[test]
    fn test_context_changes() {
        let hl = mode(C_LIKE);
        let (_, changes) = hl.highlight_line_with_changes(None, "a \"s\" b", None);
        assert_eq!(
            changes,
            vec![
                ContextChange { column: 0, context: 1 },
                ContextChange { column: 3, context: 3 },
                ContextChange { column: 5, context: 1 },
            ]
        );
    }

    #[test]
    fn test_no_highlighting_mode() {
        let hl = Highlighting::none();
        let line = hl.highlight_line(None, "foo bar quzzi", None);
        assert!(line.spans.is_empty());
        assert!(line.state.is_initial());
        assert!(hl.no_highlighting());
        assert_eq!(hl.formats().len(), 1);
    }

    #[test]
    fn test_fallthrough_switches_without_consuming() {
        let yaml = r###"
name: Ft
contexts:
  - name: Normal
    attribute: Normal Text
    rules:
      - detect_char: "@"
        attribute: Mark
        context: Tag
  - name: Tag
    attribute: Mark
    fallthrough: "#pop"
    rules:
      - detect_identifier:
formats:
  - name: Normal Text
  - name: Mark
    style: others
"###;
        let hl = mode(yaml);
        let line = hl.highlight_line(None, "@ab c", None);
        assert_eq!(
            line.spans,
            vec![
                AttributeSpan { offset: 0, length: 3, attribute: 1 },
                AttributeSpan { offset: 3, length: 2, attribute: 0 },
            ]
        );
        assert!(line.state.is_initial());
        assert!(line.diagnostics.is_empty());
    }
}
