use crate::config::EngineConfig;
use crate::error::{ConfigStoreError, Diagnostic, HighlightError};
use crate::highlighter::{Highlighting, NO_HIGHLIGHTING};
use crate::persistence::{
    ConfigStore, FileConfigStore, MemoryConfigStore, load_overrides, save_overrides,
};
use crate::repository::Repository;
use crate::schema::{Attribute, ResolvedStyle, Schema};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Mode name, mode instance and schema name.
type AttributeKey = (String, u64, String);

/// Owns the definition repository, the schemas and the override store, and hands out shared
/// highlighting modes.
///
/// A mode is compiled by its first user and dropped with its last one; the manager only
/// keeps weak references.
pub struct HighlightManager {
    config: EngineConfig,
    repository: Repository,
    modes: HashMap<String, Weak<Highlighting>>,
    none_mode: Arc<Highlighting>,
    schemas: HashMap<String, Schema>,
    store: Box<dyn ConfigStore>,
    attribute_cache: HashMap<AttributeKey, Arc<[ResolvedStyle]>>,
}

impl std::fmt::Debug for HighlightManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightManager")
            .field("config", &self.config)
            .field("repository", &self.repository)
            .field("modes", &self.modes.keys().collect::<Vec<_>>())
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl HighlightManager {
    /// Set up the manager: scan the search paths and open the override store.
    pub fn initialize(config: EngineConfig) -> Result<Self, HighlightError> {
        let store: Box<dyn ConfigStore> = match &config.override_store {
            Some(path) => Box::new(FileConfigStore::open(path)?),
            None => Box::new(MemoryConfigStore::new()),
        };
        Ok(Self::with_store(config, store))
    }

    /// Like [`initialize`](Self::initialize) with an explicit override store.
    pub fn with_store(config: EngineConfig, store: Box<dyn ConfigStore>) -> Self {
        let mut repository = Repository::new();
        for path in &config.search_paths {
            repository.add_search_path(path);
        }
        let loaded = if config.search_paths.is_empty() {
            0
        } else {
            repository.scan_search_paths()
        };

        let mut schemas = HashMap::new();
        for schema in [Schema::normal(), Schema::dark()] {
            schemas.insert(schema.name().to_string(), schema);
        }

        info!(definitions = loaded, "highlight manager initialized");
        Self {
            config,
            repository,
            modes: HashMap::new(),
            none_mode: Arc::new(Highlighting::none()),
            schemas,
            store,
            attribute_cache: HashMap::new(),
        }
    }

    /// Flush the override store and drop the manager.
    pub fn shutdown(mut self) -> Result<(), ConfigStoreError> {
        self.store.flush()?;
        info!("highlight manager shut down");
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The definition repository.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Mutable access to the repository, e.g. to load definitions from strings.
    pub fn repository_mut(&mut self) -> &mut Repository {
        &mut self.repository
    }

    /// The no-highlighting mode.
    pub fn none_mode(&self) -> Arc<Highlighting> {
        self.none_mode.clone()
    }

    /// The shared mode called `name`, compiling it if no live instance exists.
    ///
    /// Unknown or invalid modes fall back to the no-highlighting mode.
    pub fn mode_for_name(&mut self, name: &str) -> Arc<Highlighting> {
        if name.is_empty() || name == NO_HIGHLIGHTING {
            return self.none_mode.clone();
        }
        if let Some(mode) = self.modes.get(name).and_then(Weak::upgrade) {
            return mode;
        }

        match self.repository.compile(name, self.config.max_context_depth) {
            Ok(mode) => {
                let mode = Arc::new(mode);
                self.modes.insert(name.to_string(), Arc::downgrade(&mode));
                debug!(mode = %name, "created highlighting mode");
                mode
            }
            Err(e) => {
                warn!(mode = %name, error = %e, "falling back to no highlighting");
                self.none_mode.clone()
            }
        }
    }

    /// The shared mode whose extension globs match `path`.
    pub fn mode_for_file(&mut self, path: impl AsRef<Path>) -> Arc<Highlighting> {
        match self.repository.definition_for_file(path) {
            Some(def) => self.mode_for_name(&def.name),
            None => self.none_mode.clone(),
        }
    }

    /// Re-read and recompile `name`.
    ///
    /// Current holders keep their instance; later [`mode_for_name`](Self::mode_for_name) calls
    /// get the new one. Cached attribute lists of every instance of the mode are dropped.
    pub fn reload(&mut self, name: &str) -> Result<Arc<Highlighting>, HighlightError> {
        self.repository.reload_definition(name)?;
        let mode = Arc::new(
            self.repository
                .compile(name, self.config.max_context_depth)?,
        );
        self.modes.insert(name.to_string(), Arc::downgrade(&mode));
        self.attribute_cache.retain(|(cached, _, _), _| cached != name);
        info!(mode = %name, "reloaded highlighting mode");
        Ok(mode)
    }

    /// Number of modes with at least one live holder.
    pub fn live_modes(&mut self) -> usize {
        self.modes.retain(|_, weak| weak.strong_count() > 0);
        self.modes.len()
    }

    /// Register (or replace) a schema.
    pub fn add_schema(&mut self, schema: Schema) {
        let name = schema.name().to_string();
        self.attribute_cache.retain(|(_, _, s), _| *s != name);
        self.schemas.insert(name, schema);
    }

    /// The schema called `name`.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Registered schema names, sorted.
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }

    fn schema_or_default(&self, name: &str) -> Schema {
        if let Some(schema) = self.schemas.get(name) {
            return schema.clone();
        }
        warn!(schema = %name, "unknown schema, using the default one");
        self.schemas
            .get(&self.config.default_schema)
            .cloned()
            .unwrap_or_else(Schema::normal)
    }

    /// Resolved styles of every attribute of `mode` in `schema`, index-aligned with its
    /// format registry. Cached per mode instance until its overrides change.
    pub fn attributes_for_schema(
        &mut self,
        mode: &Highlighting,
        schema: &str,
    ) -> Arc<[ResolvedStyle]> {
        let key = (
            mode.name().to_string(),
            mode.instance_id(),
            schema.to_string(),
        );
        if let Some(styles) = self.attribute_cache.get(&key) {
            return styles.clone();
        }

        let resolved_schema = self.schema_or_default(schema);
        let (list, _) = load_overrides(mode, schema, self.store.as_ref());
        let styles: Arc<[ResolvedStyle]> =
            list.iter().map(|a| resolved_schema.resolve(a)).collect();
        self.attribute_cache.insert(key, styles.clone());
        styles
    }

    /// The editable attribute list of `mode` in `schema`, with stored overrides applied.
    pub fn attribute_overrides(
        &self,
        mode: &Highlighting,
        schema: &str,
    ) -> (Vec<Attribute>, Vec<Diagnostic>) {
        load_overrides(mode, schema, self.store.as_ref())
    }

    /// Store `list` as the overrides of `mode` in `schema`.
    pub fn set_attribute_overrides(
        &mut self,
        mode: &Highlighting,
        schema: &str,
        list: &[Attribute],
        write_defaults_too: bool,
    ) {
        let resolved_schema = match self.schemas.get(schema) {
            Some(s) => s.clone(),
            None => self.schema_or_default(schema).renamed(schema),
        };
        save_overrides(mode, &resolved_schema, self.store.as_mut(), list, write_defaults_too);
        self.attribute_cache
            .retain(|(name, _, s), _| name != mode.name() || s != schema);
    }

    /// Write pending overrides to the backing store.
    pub fn flush_overrides(&mut self) -> Result<(), ConfigStoreError> {
        self.store.flush()
    }
}
