use crate::definition::SyntaxDefinition;
use crate::error::HighlightError;
use crate::highlighter::Highlighting;
use glob::Pattern;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFINITION_EXTENSIONS: &[&str] = &["yaml", "yml"];

#[derive(Debug, Default)]
/// Known syntax definitions, loaded from strings, files, or search path directories.
pub struct Repository {
    search_paths: Vec<PathBuf>,
    by_name: HashMap<String, Arc<SyntaxDefinition>>,
    file_globs: HashMap<String, Vec<Pattern>>,
    scanned: bool,
}

impl Repository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory that is scanned for `*.yaml` definitions on the next lookup miss.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
        self.scanned = false;
    }

    /// Loads a definition from a YAML string and registers it under its name.
    pub fn load_from_str(&mut self, yaml: &str) -> Result<Arc<SyntaxDefinition>, HighlightError> {
        let definition = SyntaxDefinition::from_yaml_str(yaml)?;
        self.register(definition)
    }

    /// Loads a definition from a file and registers it under its name.
    pub fn load_from_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<SyntaxDefinition>, HighlightError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let mut definition = SyntaxDefinition::from_yaml_str(&yaml)?;
        definition.file_path = Some(path.to_path_buf());
        self.register(definition)
    }

    fn register(
        &mut self,
        definition: SyntaxDefinition,
    ) -> Result<Arc<SyntaxDefinition>, HighlightError> {
        validate(&definition)?;
        let definition = Arc::new(definition);
        debug!(name = %definition.name, "registered syntax definition");
        self.file_globs
            .insert(definition.name.clone(), compile_globs(&definition));
        self.by_name
            .insert(definition.name.clone(), definition.clone());
        Ok(definition)
    }

    /// Loads every definition file found in the search paths. Files that fail to load are
    /// skipped with a warning. Returns the number of definitions loaded.
    pub fn scan_search_paths(&mut self) -> usize {
        self.scanned = true;
        let mut files = Vec::new();
        for base in &self.search_paths {
            let entries = match std::fs::read_dir(base) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %base.display(), error = %e, "cannot read search path");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_definition = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| DEFINITION_EXTENSIONS.contains(&e));
                if is_definition && path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();

        let mut loaded = 0;
        for path in files {
            match self.load_from_path(&path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "skipping syntax definition"),
            }
        }
        loaded
    }

    fn ensure_scanned(&mut self) {
        if !self.scanned && !self.search_paths.is_empty() {
            self.scan_search_paths();
        }
    }

    /// The definition called `name`.
    pub fn definition_for_name(
        &mut self,
        name: &str,
    ) -> Result<Arc<SyntaxDefinition>, HighlightError> {
        if let Some(def) = self.by_name.get(name) {
            return Ok(def.clone());
        }
        self.ensure_scanned();
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| HighlightError::GrammarNotFound(name.to_string()))
    }

    /// The definition whose extension globs match the file name of `path`.
    pub fn definition_for_file(&mut self, path: impl AsRef<Path>) -> Option<Arc<SyntaxDefinition>> {
        self.ensure_scanned();
        let file_name = path.as_ref().file_name()?.to_str()?;
        let mut candidates: Vec<&String> = self
            .file_globs
            .iter()
            .filter(|(_, globs)| globs.iter().any(|glob| glob.matches(file_name)))
            .map(|(name, _)| name)
            .collect();
        // Deterministic pick when several modes claim the same file.
        candidates.sort();
        candidates
            .first()
            .and_then(|name| self.by_name.get(*name))
            .cloned()
    }

    /// Re-read the definition called `name` from its file, if it came from one.
    pub fn reload_definition(
        &mut self,
        name: &str,
    ) -> Result<Arc<SyntaxDefinition>, HighlightError> {
        let current = self.definition_for_name(name)?;
        match &current.file_path {
            Some(path) => {
                let path = path.clone();
                let reloaded = self.load_from_path(&path)?;
                if reloaded.name != name {
                    self.by_name.remove(name);
                    self.file_globs.remove(name);
                }
                Ok(reloaded)
            }
            None => Ok(current),
        }
    }

    /// Compile the definition called `name` into a highlighting mode, resolving its
    /// `##Name` references through this repository.
    pub fn compile(&mut self, name: &str, max_depth: usize) -> Result<Highlighting, HighlightError> {
        let definition = self.definition_for_name(name)?;
        Highlighting::compile(definition, |other| self.definition_for_name(other).ok(), max_depth)
    }

    /// Names of all registered definitions, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

fn validate(definition: &SyntaxDefinition) -> Result<(), HighlightError> {
    let invalid = |reason: &str| HighlightError::GrammarInvalid {
        name: definition.name.clone(),
        reason: reason.to_string(),
    };
    if definition.name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if definition.contexts.is_empty() {
        return Err(invalid("definition has no contexts"));
    }
    Ok(())
}

fn compile_globs(definition: &SyntaxDefinition) -> Vec<Pattern> {
    definition
        .extensions
        .iter()
        .filter_map(|glob| match Pattern::new(glob.trim()) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(name = %definition.name, glob = %glob, error = %e, "ignoring file glob");
                None
            }
        })
        .collect()
}
