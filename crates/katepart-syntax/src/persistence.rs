//! Persisted per-schema attribute overrides.
//!
//! Each attribute is stored as a fixed-order list of fields under the group
//! `Highlighting <mode> - Schema <schema>`:
//!
//! | index | field                              |
//! |-------|------------------------------------|
//! | 0     | default style class (integer)      |
//! | 1     | foreground (ARGB hex)              |
//! | 2     | selected foreground                |
//! | 3     | bold (`0`/`1`)                     |
//! | 4     | italic                             |
//! | 5     | strikeout                          |
//! | 6     | underline                          |
//! | 7     | background                         |
//! | 8     | selected background                |
//! | 9     | font family                        |
//! | 10    | terminator `---`                   |
//!
//! A blank field inherits from the schema.

use crate::error::{ConfigStoreError, Diagnostic};
use crate::format::Format;
use crate::highlighter::Highlighting;
use crate::schema::{Attribute, DefaultStyle, Rgb, Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FIELD_COUNT: usize = 10;
const TERMINATOR: &str = "---";

/// Key/value storage for override lists.
pub trait ConfigStore {
    /// The list stored under `key` in `group`.
    fn read_entry(&self, group: &str, key: &str) -> Option<Vec<String>>;

    /// Store a list under `key` in `group`.
    fn write_entry(&mut self, group: &str, key: &str, value: Vec<String>);

    /// Persist pending writes.
    fn flush(&mut self) -> Result<(), ConfigStoreError> {
        Ok(())
    }
}

/// An in-memory [`ConfigStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryConfigStore {
    groups: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Group names in order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn read_entry(&self, group: &str, key: &str) -> Option<Vec<String>> {
        self.groups.get(group)?.get(key).cloned()
    }

    fn write_entry(&mut self, group: &str, key: &str, value: Vec<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

/// A [`ConfigStore`] backed by a YAML file. Writes are kept in memory until
/// [`flush`](ConfigStore::flush).
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    data: MemoryConfigStore,
    dirty: bool,
}

impl FileConfigStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => MemoryConfigStore::new(),
            Ok(text) => serde_yaml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryConfigStore::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            data,
            dirty: false,
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are unflushed writes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl ConfigStore for FileConfigStore {
    fn read_entry(&self, group: &str, key: &str) -> Option<Vec<String>> {
        self.data.read_entry(group, key)
    }

    fn write_entry(&mut self, group: &str, key: &str, value: Vec<String>) {
        self.data.write_entry(group, key, value);
        self.dirty = true;
    }

    fn flush(&mut self) -> Result<(), ConfigStoreError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_yaml::to_string(&self.data)?;
        std::fs::write(&self.path, text)?;
        self.dirty = false;
        debug!(path = %self.path.display(), "flushed override store");
        Ok(())
    }
}

/// Group name for the overrides of `mode` in `schema`.
pub fn override_group(mode: &str, schema: &str) -> String {
    format!("Highlighting {mode} - Schema {schema}")
}

/// Store key of a format: its name, prefixed with the owning definition for embedded modes.
pub fn override_key(mode: &str, format: &Format) -> String {
    if format.definition == mode {
        format.name.clone()
    } else {
        format!("{}:{}", format.definition, format.name)
    }
}

/// The editable attribute list of `hl` with the overrides stored for `schema` applied.
///
/// Entries with fewer than ten fields are padded; each one produces a diagnostic.
pub fn load_overrides(
    hl: &Highlighting,
    schema: &str,
    store: &dyn ConfigStore,
) -> (Vec<Attribute>, Vec<Diagnostic>) {
    let group = override_group(hl.name(), schema);
    let mut diagnostics = Vec::new();
    let mut list = Vec::with_capacity(hl.formats().len());

    for format in hl.formats().iter() {
        let mut attribute = format.to_attribute();
        let key = override_key(hl.name(), format);
        if let Some(fields) = store.read_entry(&group, &key)
            && !fields.is_empty()
        {
            if fields.len() < FIELD_COUNT {
                warn!(group = %group, attribute = %key, fields = fields.len(), "short override entry");
                diagnostics.push(Diagnostic::MalformedPersistedOverride {
                    attribute: key.clone(),
                    fields: fields.len(),
                });
            }
            apply_fields(&mut attribute, &fields);
        }
        list.push(attribute);
    }

    (list, diagnostics)
}

fn apply_fields(attribute: &mut Attribute, fields: &[String]) {
    let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");
    let color = |i: usize| Some(field(i)).filter(|s| !s.is_empty()).and_then(Rgb::from_argb_hex);
    let flag = |i: usize| Some(field(i)).filter(|s| !s.is_empty()).map(|s| s != "0");

    // Only the name and the spell checking flag survive an override.
    let skip_spell_checking = attribute.skip_spell_checking;
    *attribute = Attribute::new(std::mem::take(&mut attribute.name), DefaultStyle::Normal);
    attribute.skip_spell_checking = skip_spell_checking;

    attribute.default_style = field(0)
        .parse::<usize>()
        .ok()
        .and_then(DefaultStyle::from_index)
        .unwrap_or_default();
    let style = &mut attribute.style;
    style.foreground = color(1);
    style.selected_foreground = color(2);
    style.bold = flag(3);
    style.italic = flag(4);
    style.strikeout = flag(5);
    style.underline = flag(6);
    style.background = color(7);
    style.selected_background = color(8);
    let font = field(9);
    if !font.is_empty() && font != TERMINATOR {
        style.font_family = Some(font.to_string());
    }
}

/// Write `list` as the overrides of `hl` for `schema`.
///
/// `list` is index-aligned with the format registry. With `write_defaults_too`, unset fields
/// are filled from `schema`; backgrounds only when the schema defines one.
pub fn save_overrides(
    hl: &Highlighting,
    schema: &Schema,
    store: &mut dyn ConfigStore,
    list: &[Attribute],
    write_defaults_too: bool,
) {
    let group = override_group(hl.name(), schema.name());
    for (format, attribute) in hl.formats().iter().zip(list) {
        let key = override_key(hl.name(), format);
        let fields = encode_fields(attribute, schema, write_defaults_too);
        store.write_entry(&group, &key, fields);
    }
}

fn encode_fields(attribute: &Attribute, schema: &Schema, write_defaults_too: bool) -> Vec<String> {
    let style = &attribute.style;
    let defaults = schema.resolve(&Attribute::new("", attribute.default_style));

    let color = |value: Option<Rgb>, default: Option<Rgb>| match (value, write_defaults_too) {
        (Some(c), _) => c.to_argb_hex(),
        (None, true) => default.map(Rgb::to_argb_hex).unwrap_or_default(),
        (None, false) => String::new(),
    };
    let flag = |value: Option<bool>, default: bool| match (value, write_defaults_too) {
        (Some(b), _) => bool_field(b),
        (None, true) => bool_field(default),
        (None, false) => String::new(),
    };

    vec![
        attribute.default_style.index().to_string(),
        color(style.foreground, Some(defaults.foreground)),
        color(style.selected_foreground, Some(defaults.selected_foreground)),
        flag(style.bold, defaults.bold),
        flag(style.italic, defaults.italic),
        flag(style.strikeout, defaults.strikeout),
        flag(style.underline, defaults.underline),
        color(style.background, defaults.background),
        color(style.selected_background, defaults.selected_background),
        match (&style.font_family, write_defaults_too) {
            (Some(font), _) => font.clone(),
            (None, true) => defaults.font_family.clone().unwrap_or_default(),
            (None, false) => String::new(),
        },
        TERMINATOR.to_string(),
    ]
}

fn bool_field(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}
