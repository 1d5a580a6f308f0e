use crate::definition::RawFormat;
use crate::schema::{Attribute, DefaultStyle, ResolvedStyle, Schema, TextStyle};
use std::collections::HashMap;

/// Index of a format in a [`FormatRegistry`]; the value stored on attribute spans.
pub type AttributeIndex = usize;

/// A format declared by a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Registry id, unique per pool.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Name of the definition that declared the format.
    pub definition: String,
    /// Style class.
    pub default_style: DefaultStyle,
    /// Explicit style properties from the definition.
    pub style: TextStyle,
    /// Whether spell checking is skipped.
    pub skip_spell_checking: bool,
}

impl Format {
    /// The format every pool falls back to.
    pub fn normal_text(definition: &str) -> Self {
        Self {
            id: format!("{definition}:Normal Text"),
            name: "Normal Text".to_string(),
            definition: definition.to_string(),
            default_style: DefaultStyle::Normal,
            style: TextStyle::default(),
            skip_spell_checking: false,
        }
    }

    /// Convert a raw format entry of `definition`.
    pub fn from_raw(definition: &str, raw: &RawFormat) -> Self {
        Self {
            id: raw
                .id
                .clone()
                .unwrap_or_else(|| format!("{definition}:{}", raw.name)),
            name: raw.name.clone(),
            definition: definition.to_string(),
            default_style: raw.style,
            style: TextStyle {
                foreground: raw.color,
                selected_foreground: raw.selected_color,
                background: raw.background_color,
                selected_background: raw.selected_background_color,
                bold: raw.bold,
                italic: raw.italic,
                underline: raw.underline,
                strikeout: raw.strikeout,
                font_family: raw.font_family.clone(),
            },
            skip_spell_checking: !raw.spellcheck,
        }
    }

    /// The editable attribute for this format.
    pub fn to_attribute(&self) -> Attribute {
        Attribute {
            name: self.name.clone(),
            default_style: self.default_style,
            style: self.style.clone(),
            skip_spell_checking: self.skip_spell_checking,
        }
    }
}

/// Deduplicating format registry.
///
/// Indices are dense and never renumbered; a reload builds a new registry.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    formats: Vec<Format>,
    id_to_index: HashMap<String, AttributeIndex>,
}

impl FormatRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a format, returning its index.
    ///
    /// If a format with the same id is already present its index is returned and the new
    /// format is dropped.
    pub fn register_format(&mut self, format: Format) -> AttributeIndex {
        if let Some(&index) = self.id_to_index.get(&format.id) {
            return index;
        }
        let index = self.formats.len();
        self.id_to_index.insert(format.id.clone(), index);
        self.formats.push(format);
        index
    }

    /// The format at `index`.
    pub fn format_at(&self, index: AttributeIndex) -> Option<&Format> {
        self.formats.get(index)
    }

    /// Index of the format with this id.
    pub fn index_of(&self, id: &str) -> Option<AttributeIndex> {
        self.id_to_index.get(id).copied()
    }

    /// Index of the format `name` declared by `definition`.
    pub fn index_by_name(&self, definition: &str, name: &str) -> Option<AttributeIndex> {
        self.formats
            .iter()
            .position(|f| f.definition == definition && f.name == name)
    }

    /// Number of formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Returns `true` if no format is registered.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// All formats in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.formats.iter()
    }

    /// Resolve the format at `index` against `schema`.
    pub fn resolve_style(&self, index: AttributeIndex, schema: &Schema) -> Option<ResolvedStyle> {
        self.format_at(index)
            .map(|f| schema.resolve(&f.to_attribute()))
    }
}
