//! Default styles, schemas and style resolution.
//!
//! A [`Schema`] holds one [`TextStyle`] per [`DefaultStyle`] class. Formats and user overrides
//! only carry the properties they set explicitly; everything else is inherited from the schema
//! entry for the format's style class.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default style classes, in their persisted numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum DefaultStyle {
    #[default]
    Normal = 0,
    Keyword,
    Function,
    Variable,
    ControlFlow,
    Operator,
    BuiltIn,
    Extension,
    Preprocessor,
    Attribute,
    Char,
    SpecialChar,
    String,
    VerbatimString,
    SpecialString,
    Import,
    DataType,
    DecVal,
    BaseN,
    Float,
    Constant,
    Comment,
    Documentation,
    Annotation,
    CommentVar,
    RegionMarker,
    Information,
    Warning,
    Alert,
    Others,
    Error,
}

impl DefaultStyle {
    /// All classes in numeric order.
    pub const ALL: [DefaultStyle; 31] = [
        Self::Normal,
        Self::Keyword,
        Self::Function,
        Self::Variable,
        Self::ControlFlow,
        Self::Operator,
        Self::BuiltIn,
        Self::Extension,
        Self::Preprocessor,
        Self::Attribute,
        Self::Char,
        Self::SpecialChar,
        Self::String,
        Self::VerbatimString,
        Self::SpecialString,
        Self::Import,
        Self::DataType,
        Self::DecVal,
        Self::BaseN,
        Self::Float,
        Self::Constant,
        Self::Comment,
        Self::Documentation,
        Self::Annotation,
        Self::CommentVar,
        Self::RegionMarker,
        Self::Information,
        Self::Warning,
        Self::Alert,
        Self::Others,
        Self::Error,
    ];

    /// The persisted number of this class.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Class for a persisted number.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// An opaque RGB color (`0xRRGGBB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u32);

impl Rgb {
    /// Build a color from components.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Hex encoding used by override stores: ARGB with an opaque alpha (`ffrrggbb`).
    pub fn to_argb_hex(self) -> String {
        format!("{:x}", 0xff00_0000 | (self.0 & 0x00ff_ffff))
    }

    /// Parses the override-store encoding. Any alpha channel is ignored.
    pub fn from_argb_hex(s: &str) -> Option<Self> {
        u32::from_str_radix(s.trim(), 16)
            .ok()
            .map(|v| Self(v & 0x00ff_ffff))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0x00ff_ffff)
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return Err(format!("expected #rrggbb, got '{s}'"));
        }
        u32::from_str_radix(hex, 16)
            .map(Self)
            .map_err(|e| format!("invalid color '{s}': {e}"))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A partial style: only `Some` fields are set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextStyle {
    /// Foreground color.
    pub foreground: Option<Rgb>,
    /// Foreground color for selected text.
    pub selected_foreground: Option<Rgb>,
    /// Background color.
    pub background: Option<Rgb>,
    /// Background color for selected text.
    pub selected_background: Option<Rgb>,
    /// Bold.
    pub bold: Option<bool>,
    /// Italic.
    pub italic: Option<bool>,
    /// Underline.
    pub underline: Option<bool>,
    /// Strike-out.
    pub strikeout: Option<bool>,
    /// Font family.
    pub font_family: Option<String>,
}

impl TextStyle {
    /// Fields set in `self` win, the rest come from `base`.
    pub fn merged_over(&self, base: &TextStyle) -> TextStyle {
        TextStyle {
            foreground: self.foreground.or(base.foreground),
            selected_foreground: self.selected_foreground.or(base.selected_foreground),
            background: self.background.or(base.background),
            selected_background: self.selected_background.or(base.selected_background),
            bold: self.bold.or(base.bold),
            italic: self.italic.or(base.italic),
            underline: self.underline.or(base.underline),
            strikeout: self.strikeout.or(base.strikeout),
            font_family: self.font_family.clone().or_else(|| base.font_family.clone()),
        }
    }

    /// Returns `true` if no property is set.
    pub fn is_empty(&self) -> bool {
        *self == TextStyle::default()
    }
}

/// A named attribute carrying only its explicitly set properties.
///
/// This is the unit that is edited by users and written to override stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Display name (the persistence key).
    pub name: String,
    /// Style class used for inheritance.
    pub default_style: DefaultStyle,
    /// Explicit properties.
    pub style: TextStyle,
    /// Whether spell checking is skipped for text with this attribute.
    pub skip_spell_checking: bool,
}

impl Attribute {
    /// A new attribute without explicit properties.
    pub fn new(name: impl Into<String>, default_style: DefaultStyle) -> Self {
        Self {
            name: name.into(),
            default_style,
            style: TextStyle::default(),
            skip_spell_checking: false,
        }
    }
}

/// A fully resolved style, ready for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStyle {
    /// Display name of the attribute.
    pub name: String,
    /// Style class the attribute inherits from.
    pub default_style: DefaultStyle,
    /// Foreground color.
    pub foreground: Rgb,
    /// Foreground color for selected text.
    pub selected_foreground: Rgb,
    /// Background color, if any.
    pub background: Option<Rgb>,
    /// Background color for selected text, if any.
    pub selected_background: Option<Rgb>,
    /// Bold.
    pub bold: bool,
    /// Italic.
    pub italic: bool,
    /// Underline.
    pub underline: bool,
    /// Strike-out.
    pub strikeout: bool,
    /// Font family, if overridden.
    pub font_family: Option<String>,
    /// Whether spell checking is skipped.
    pub skip_spell_checking: bool,
}

/// A named set of default styles, one per [`DefaultStyle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    normal_foreground: Rgb,
    selected_foreground: Rgb,
    defaults: HashMap<DefaultStyle, TextStyle>,
}

impl Schema {
    /// An empty schema; every class falls back to the given foreground colors.
    pub fn new(name: impl Into<String>, foreground: Rgb, selected_foreground: Rgb) -> Self {
        Self {
            name: name.into(),
            normal_foreground: foreground,
            selected_foreground,
            defaults: HashMap::new(),
        }
    }

    /// The schema name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy of this schema under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Set the default style for a class.
    pub fn set_default(&mut self, class: DefaultStyle, style: TextStyle) {
        self.defaults.insert(class, style);
    }

    /// Builder form of [`Schema::set_default`].
    pub fn with_default(mut self, class: DefaultStyle, style: TextStyle) -> Self {
        self.set_default(class, style);
        self
    }

    /// The default style for a class (empty if the schema does not define it).
    pub fn default_for(&self, class: DefaultStyle) -> TextStyle {
        self.defaults.get(&class).cloned().unwrap_or_default()
    }

    /// Resolve an attribute against this schema.
    pub fn resolve(&self, attribute: &Attribute) -> ResolvedStyle {
        let merged = attribute
            .style
            .merged_over(&self.default_for(attribute.default_style));
        ResolvedStyle {
            name: attribute.name.clone(),
            default_style: attribute.default_style,
            foreground: merged.foreground.unwrap_or(self.normal_foreground),
            selected_foreground: merged
                .selected_foreground
                .unwrap_or(self.selected_foreground),
            background: merged.background,
            selected_background: merged.selected_background,
            bold: merged.bold.unwrap_or(false),
            italic: merged.italic.unwrap_or(false),
            underline: merged.underline.unwrap_or(false),
            strikeout: merged.strikeout.unwrap_or(false),
            font_family: merged.font_family,
            skip_spell_checking: attribute.skip_spell_checking,
        }
    }

    /// The built-in light schema.
    pub fn normal() -> Self {
        let fg = |c: u32| TextStyle {
            foreground: Some(Rgb(c)),
            ..TextStyle::default()
        };
        let bold = |c: u32| TextStyle {
            bold: Some(true),
            ..fg(c)
        };
        let italic = |c: u32| TextStyle {
            italic: Some(true),
            ..fg(c)
        };

        Self::new("Normal", Rgb(0x1f1c1b), Rgb(0xffffff))
            .with_default(DefaultStyle::Normal, fg(0x1f1c1b))
            .with_default(DefaultStyle::Keyword, bold(0x1f1c1b))
            .with_default(DefaultStyle::Function, fg(0x644a9b))
            .with_default(DefaultStyle::Variable, fg(0x0057ae))
            .with_default(DefaultStyle::ControlFlow, bold(0x1f1c1b))
            .with_default(DefaultStyle::Operator, fg(0x1f1c1b))
            .with_default(DefaultStyle::BuiltIn, fg(0x644a9b))
            .with_default(DefaultStyle::Extension, bold(0x0095ff))
            .with_default(DefaultStyle::Preprocessor, fg(0x006e28))
            .with_default(DefaultStyle::Attribute, fg(0x0057ae))
            .with_default(DefaultStyle::Char, fg(0x924c9d))
            .with_default(DefaultStyle::SpecialChar, fg(0x3daee9))
            .with_default(DefaultStyle::String, fg(0xbf0303))
            .with_default(DefaultStyle::VerbatimString, fg(0xbf0303))
            .with_default(DefaultStyle::SpecialString, fg(0xff5500))
            .with_default(DefaultStyle::Import, fg(0xff5500))
            .with_default(DefaultStyle::DataType, fg(0x0057ae))
            .with_default(DefaultStyle::DecVal, fg(0xb08000))
            .with_default(DefaultStyle::BaseN, fg(0xb08000))
            .with_default(DefaultStyle::Float, fg(0xb08000))
            .with_default(DefaultStyle::Constant, bold(0xaa5500))
            .with_default(DefaultStyle::Comment, italic(0x898887))
            .with_default(DefaultStyle::Documentation, fg(0x607880))
            .with_default(DefaultStyle::Annotation, fg(0xca60ca))
            .with_default(DefaultStyle::CommentVar, fg(0x0095ff))
            .with_default(
                DefaultStyle::RegionMarker,
                TextStyle {
                    background: Some(Rgb(0xe0e9f8)),
                    ..fg(0x0057ae)
                },
            )
            .with_default(DefaultStyle::Information, fg(0xb08000))
            .with_default(DefaultStyle::Warning, fg(0xbf0303))
            .with_default(
                DefaultStyle::Alert,
                TextStyle {
                    background: Some(Rgb(0xf7e6e6)),
                    ..bold(0xbf0303)
                },
            )
            .with_default(DefaultStyle::Others, fg(0x006e28))
            .with_default(
                DefaultStyle::Error,
                TextStyle {
                    underline: Some(true),
                    ..fg(0xbf0303)
                },
            )
    }

    /// The built-in dark schema.
    pub fn dark() -> Self {
        let fg = |c: u32| TextStyle {
            foreground: Some(Rgb(c)),
            ..TextStyle::default()
        };
        let bold = |c: u32| TextStyle {
            bold: Some(true),
            ..fg(c)
        };

        let mut schema = Self::new("Dark", Rgb(0xcfcfc2), Rgb(0xffffff))
            .with_default(DefaultStyle::Keyword, bold(0xcfcfc2))
            .with_default(DefaultStyle::ControlFlow, bold(0xfdbc4b))
            .with_default(DefaultStyle::Function, fg(0x8e44ad))
            .with_default(DefaultStyle::Variable, fg(0x27aeae))
            .with_default(DefaultStyle::DataType, fg(0x2980b9))
            .with_default(DefaultStyle::DecVal, fg(0xf67400))
            .with_default(DefaultStyle::BaseN, fg(0xf67400))
            .with_default(DefaultStyle::Float, fg(0xf67400))
            .with_default(DefaultStyle::Char, fg(0x3daee9))
            .with_default(DefaultStyle::String, fg(0xf44f4f))
            .with_default(DefaultStyle::Preprocessor, fg(0x27ae60))
            .with_default(DefaultStyle::Others, fg(0x27ae60))
            .with_default(
                DefaultStyle::Comment,
                TextStyle {
                    italic: Some(true),
                    ..fg(0x7a7c7d)
                },
            )
            .with_default(
                DefaultStyle::Error,
                TextStyle {
                    underline: Some(true),
                    ..fg(0xda4453)
                },
            );
        schema.set_default(
            DefaultStyle::Alert,
            TextStyle {
                background: Some(Rgb(0x4d1f24)),
                ..bold(0x95da4c)
            },
        );
        schema
    }
}
