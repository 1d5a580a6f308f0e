use crate::context::{
    Context, ContextId, ContextSwitch, ContextTarget, FALLBACK_CONTEXT, Matcher, RegionId, Rule,
};
use crate::definition::{RawContext, RawRule, RuleKind, SyntaxDefinition};
use crate::error::{Diagnostic, HighlightError};
use crate::format::{AttributeIndex, Format, FormatRegistry};
use crate::property::{DEFAULT_HL_KEY, HighlightPropertyBag};
use onig::{Regex, RegexOptions, Syntax};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Everything a compiled grammar shares between its documents.
#[derive(Debug)]
pub(crate) struct Pool {
    pub contexts: Vec<Context>,
    pub registry: FormatRegistry,
    pub bags: HashMap<String, HighlightPropertyBag>,
    pub embedded: Vec<String>,
    pub initial: ContextId,
    pub diagnostics: Vec<Diagnostic>,
}

enum Entry {
    Rule(Rule),
    Include(ContextId),
}

struct Names<'a> {
    ids: HashMap<(&'a str, &'a str), ContextId>,
    initial_of: HashMap<&'a str, ContextId>,
}

impl Names<'_> {
    fn resolve(&self, current_def: &str, reference: &str) -> Option<ContextId> {
        match reference.split_once("##") {
            Some(("", def)) => self.initial_of.get(def.trim()).copied(),
            Some((name, def)) => self.ids.get(&(def.trim(), name.trim())).copied(),
            None => self.ids.get(&(current_def, reference)).copied(),
        }
    }
}

/// Compile `main` and every definition it references into one pool.
///
/// `lookup` resolves `##Name` references. Definitions it cannot find are skipped; references
/// into them stay unresolved.
pub(crate) fn compile_pool<F>(
    main: Arc<SyntaxDefinition>,
    mut lookup: F,
) -> Result<Pool, HighlightError>
where
    F: FnMut(&str) -> Option<Arc<SyntaxDefinition>>,
{
    let defs = collect_definitions(main, &mut lookup);
    for def in &defs {
        if def.contexts.is_empty() {
            return Err(HighlightError::GrammarInvalid {
                name: def.name.clone(),
                reason: "definition has no contexts".to_string(),
            });
        }
    }
    let main = &defs[0];

    let mut names = Names {
        ids: HashMap::new(),
        initial_of: HashMap::new(),
    };
    let mut context_names = vec![("Normal Text", main.name.as_str())];
    let mut next_id = FALLBACK_CONTEXT + 1;
    for def in &defs {
        names.initial_of.insert(def.name.as_str(), next_id);
        for ctx in &def.contexts {
            names
                .ids
                .entry((def.name.as_str(), ctx.name.as_str()))
                .or_insert(next_id);
            context_names.push((ctx.name.as_str(), def.name.as_str()));
            next_id += 1;
        }
    }

    let mut registry = FormatRegistry::new();
    let mut format_ids: HashMap<(&str, &str), AttributeIndex> = HashMap::new();
    if main.formats.is_empty() {
        let index = registry.register_format(Format::normal_text(&main.name));
        format_ids.insert((main.name.as_str(), "Normal Text"), index);
    }
    for def in &defs {
        for raw in &def.formats {
            let index = registry.register_format(Format::from_raw(&def.name, raw));
            format_ids
                .entry((def.name.as_str(), raw.name.as_str()))
                .or_insert(index);
        }
    }

    let region_ids = collect_regions(&defs);
    let mut bags = HashMap::new();
    bags.insert(DEFAULT_HL_KEY.to_string(), HighlightPropertyBag::default());
    for def in &defs {
        let bag = HighlightPropertyBag::from_definition(def, |name| {
            region_ids.get(name).and_then(|id| i8::try_from(*id).ok())
        });
        bags.entry(def.name.clone()).or_insert(bag);
    }

    let mut diagnostics = Vec::new();
    let mut contexts = vec![Context {
        id: FALLBACK_CONTEXT,
        name: "Normal Text".to_string(),
        definition: main.name.clone(),
        attribute: 0,
        line_end: ContextSwitch::stay(),
        line_empty: None,
        fallthrough: None,
        rules: Vec::new(),
        deliminator: deliminator_of(&bags, &main.name),
        case_sensitive: main.keywords.case_sensitive,
    }];
    let mut entries: Vec<Vec<Entry>> = vec![Vec::new()];

    for def in &defs {
        let deliminator = deliminator_of(&bags, &def.name);
        let mut compiler = ContextCompiler {
            def: def.as_ref(),
            names: &names,
            format_ids: &format_ids,
            region_ids: &region_ids,
            diagnostics: &mut diagnostics,
        };
        for raw in &def.contexts {
            let id = contexts.len();
            let (context, context_entries) = compiler.compile_context(id, raw, &deliminator)?;
            contexts.push(context);
            entries.push(context_entries);
        }
    }

    let mut flattened: HashMap<ContextId, Vec<Rule>> = HashMap::new();
    for id in 0..contexts.len() {
        let mut visiting = HashSet::new();
        flatten_rules(id, &entries, &context_names, &mut flattened, &mut visiting)?;
    }
    for context in &mut contexts {
        if let Some(rules) = flattened.remove(&context.id) {
            context.rules = rules;
        }
    }

    let embedded = defs
        .iter()
        .skip(1)
        .map(|d| d.name.clone())
        .filter(|n| *n != main.name)
        .collect();

    Ok(Pool {
        contexts,
        registry,
        bags,
        embedded,
        initial: FALLBACK_CONTEXT + 1,
        diagnostics,
    })
}

fn collect_definitions<F>(main: Arc<SyntaxDefinition>, lookup: &mut F) -> Vec<Arc<SyntaxDefinition>>
where
    F: FnMut(&str) -> Option<Arc<SyntaxDefinition>>,
{
    let mut seen: HashSet<String> = HashSet::from([main.name.clone()]);
    let mut defs = vec![main];
    let mut i = 0;
    while i < defs.len() {
        let referenced = defs[i].referenced_definitions();
        for name in referenced {
            if !seen.insert(name.clone()) {
                continue;
            }
            match lookup(&name) {
                Some(def) => defs.push(def),
                None => warn!(
                    definition = %defs[i].name,
                    missing = %name,
                    "referenced syntax definition not found"
                ),
            }
        }
        i += 1;
    }
    defs
}

fn collect_regions(defs: &[Arc<SyntaxDefinition>]) -> HashMap<String, RegionId> {
    let mut ids: HashMap<String, RegionId> = HashMap::new();
    let mut add = |name: &str| {
        let next = ids.len() as RegionId + 1;
        ids.entry(name.to_string()).or_insert(next);
    };
    for def in defs {
        for ctx in &def.contexts {
            for rule in &ctx.rules {
                if let Some(name) = &rule.begin_region {
                    add(name);
                }
                if let Some(name) = &rule.end_region {
                    add(name);
                }
            }
        }
        if let Some(name) = def
            .comments
            .multi_line
            .as_ref()
            .and_then(|m| m.region.as_deref())
        {
            add(name);
        }
    }
    ids
}

fn deliminator_of(bags: &HashMap<String, HighlightPropertyBag>, definition: &str) -> Arc<str> {
    let bag = bags
        .get(definition)
        .or_else(|| bags.get(DEFAULT_HL_KEY));
    match bag {
        Some(bag) => Arc::from(bag.deliminator.as_str()),
        None => Arc::from(crate::property::STD_DELIMINATOR),
    }
}

struct ContextCompiler<'a> {
    def: &'a SyntaxDefinition,
    names: &'a Names<'a>,
    format_ids: &'a HashMap<(&'a str, &'a str), AttributeIndex>,
    region_ids: &'a HashMap<String, RegionId>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl ContextCompiler<'_> {
    fn compile_context(
        &mut self,
        id: ContextId,
        raw: &RawContext,
        deliminator: &Arc<str>,
    ) -> Result<(Context, Vec<Entry>), HighlightError> {
        let attribute = self.attribute(&raw.name, &raw.attribute);
        let line_end = self.switch(&raw.name, &raw.line_end);
        let line_empty = raw.line_empty.as_deref().map(|s| self.switch(&raw.name, s));
        let fallthrough = raw
            .fallthrough
            .as_deref()
            .map(|s| self.switch(&raw.name, s))
            .filter(|s| !s.is_stay());

        let mut entries = Vec::with_capacity(raw.rules.len());
        for rule in &raw.rules {
            if let RuleKind::IncludeRules(target) = &rule.kind {
                match self.names.resolve(&self.def.name, target) {
                    Some(target) => entries.push(Entry::Include(target)),
                    None => self.dangling(&raw.name, target),
                }
                continue;
            }
            entries.push(Entry::Rule(self.rule(&raw.name, rule)?));
        }

        let context = Context {
            id,
            name: raw.name.clone(),
            definition: self.def.name.clone(),
            attribute,
            line_end,
            line_empty,
            fallthrough,
            rules: Vec::new(),
            deliminator: deliminator.clone(),
            case_sensitive: self.def.keywords.case_sensitive,
        };
        Ok((context, entries))
    }

    fn rule(&mut self, context: &str, raw: &RawRule) -> Result<Rule, HighlightError> {
        let matcher = self.matcher(raw)?;
        Ok(Rule {
            matcher,
            attribute: raw.attribute.as_deref().map(|a| self.attribute(context, a)),
            switch: raw
                .context
                .as_deref()
                .map(|s| self.switch(context, s))
                .unwrap_or_default(),
            lookahead: raw.lookahead,
            first_non_space: raw.first_non_space,
            column: raw.column,
            begin_region: raw
                .begin_region
                .as_ref()
                .and_then(|r| self.region_ids.get(r).copied()),
            end_region: raw
                .end_region
                .as_ref()
                .and_then(|r| self.region_ids.get(r).copied()),
        })
    }

    fn matcher(&self, raw: &RawRule) -> Result<Matcher, HighlightError> {
        let insensitive = raw.insensitive;
        let matcher = match &raw.kind {
            RuleKind::DetectChar(c) => Matcher::DetectChar(*c),
            RuleKind::Detect2Chars(a, b) => Matcher::Detect2Chars(*a, *b),
            RuleKind::AnyChar(set) => Matcher::AnyChar(set.chars().collect()),
            RuleKind::StringDetect(s) => Matcher::StringDetect {
                text: s.chars().collect(),
                insensitive,
            },
            RuleKind::WordDetect(s) => Matcher::WordDetect {
                text: s.chars().collect(),
                insensitive,
            },
            RuleKind::RegExpr(pattern) => Matcher::RegExpr(Arc::new(compile_regex(
                pattern,
                insensitive,
            )?)),
            RuleKind::Keyword(list) => {
                let words = self
                    .def
                    .lists
                    .get(list)
                    .ok_or_else(|| HighlightError::UnknownKeywordList(list.clone()))?;
                let insensitive = insensitive || !self.def.keywords.case_sensitive;
                let words = words
                    .iter()
                    .map(|w| if insensitive { w.to_lowercase() } else { w.clone() })
                    .collect();
                Matcher::Keyword {
                    words: Arc::new(words),
                    insensitive,
                }
            }
            RuleKind::Int => Matcher::Int,
            RuleKind::Float => Matcher::Float,
            RuleKind::HlCStringChar => Matcher::HlCStringChar,
            RuleKind::RangeDetect(a, b) => Matcher::RangeDetect(*a, *b),
            RuleKind::LineContinue(c) => Matcher::LineContinue(*c),
            RuleKind::DetectSpaces => Matcher::DetectSpaces,
            RuleKind::DetectIdentifier => Matcher::DetectIdentifier,
            RuleKind::IncludeRules(target) => {
                return Err(HighlightError::GrammarInvalid {
                    name: self.def.name.clone(),
                    reason: format!("include_rules '{target}' cannot be used as a matcher"),
                });
            }
        };
        Ok(matcher)
    }

    fn attribute(&self, context: &str, name: &str) -> AttributeIndex {
        match self.format_ids.get(&(self.def.name.as_str(), name)) {
            Some(index) => *index,
            None => {
                warn!(
                    definition = %self.def.name,
                    context = %context,
                    attribute = %name,
                    "unknown format, using attribute 0"
                );
                0
            }
        }
    }

    fn switch(&mut self, context: &str, reference: &str) -> ContextSwitch {
        let mut rest = reference.trim();
        let mut pops = 0;
        while let Some(r) = rest.strip_prefix("#pop") {
            pops += 1;
            rest = r;
        }
        rest = rest.strip_prefix('!').unwrap_or(rest);
        if rest.is_empty() || rest == "#stay" {
            return ContextSwitch { pops, push: None };
        }

        let push = match self.names.resolve(&self.def.name, rest) {
            Some(id) => ContextTarget::Context(id),
            None => {
                self.dangling(context, rest);
                ContextTarget::Unresolved(rest.to_string())
            }
        };
        ContextSwitch {
            pops,
            push: Some(push),
        }
    }

    fn dangling(&mut self, context: &str, target: &str) {
        warn!(
            definition = %self.def.name,
            context = %context,
            target = %target,
            "unresolved context reference"
        );
        self.diagnostics.push(Diagnostic::DanglingContextReference {
            context: context.to_string(),
            target: target.to_string(),
        });
    }
}

fn compile_regex(pattern: &str, insensitive: bool) -> Result<Regex, HighlightError> {
    let options = if insensitive {
        RegexOptions::REGEX_OPTION_IGNORECASE
    } else {
        RegexOptions::REGEX_OPTION_NONE
    };
    Regex::with_options(pattern, options, Syntax::default()).map_err(|e| {
        HighlightError::RegexCompile {
            pattern: pattern.to_string(),
            message: e.to_string(),
        }
    })
}

fn flatten_rules(
    id: ContextId,
    entries: &[Vec<Entry>],
    names: &[(&str, &str)],
    done: &mut HashMap<ContextId, Vec<Rule>>,
    visiting: &mut HashSet<ContextId>,
) -> Result<Vec<Rule>, HighlightError> {
    if let Some(rules) = done.get(&id) {
        return Ok(rules.clone());
    }
    if !visiting.insert(id) {
        let (name, def) = names[id];
        return Err(HighlightError::RuleIncludeCycle(format!("{name}##{def}")));
    }

    let mut rules = Vec::new();
    for entry in &entries[id] {
        match entry {
            Entry::Rule(rule) => rules.push(rule.clone()),
            Entry::Include(target) => {
                rules.extend(flatten_rules(*target, entries, names, done, visiting)?);
            }
        }
    }

    visiting.remove(&id);
    done.insert(id, rules.clone());
    Ok(rules)
}
