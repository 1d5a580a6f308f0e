use crate::error::HighlightError;
use crate::highlighter::DEFAULT_MAX_CONTEXT_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Settings for a [`HighlightManager`](crate::HighlightManager).
pub struct EngineConfig {
    /// Directories scanned for `*.yaml` syntax definitions.
    pub search_paths: Vec<PathBuf>,
    /// Schema used when a caller does not name one.
    pub default_schema: String,
    /// Context stack depth cap.
    pub max_context_depth: usize,
    /// YAML file holding attribute overrides; overrides stay in memory if unset.
    pub override_store: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            default_schema: "Normal".to_string(),
            max_context_depth: DEFAULT_MAX_CONTEXT_DEPTH,
            override_store: None,
        }
    }
}

impl EngineConfig {
    /// Parses a config from YAML text. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, HighlightError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HighlightError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }
}
