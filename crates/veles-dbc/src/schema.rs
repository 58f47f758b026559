//! Schema entry model.
//!
//! A [`SchemaEntry`] is one candidate field layout for a logical table,
//! believed valid for a set of client builds. Entries are created per file
//! during scanning, renamed and merged during reconciliation, and die when
//! their build list is emptied by a merge.

use serde::{Deserialize, Serialize};

/// Build at which multi-slot locale string groups were replaced by plain
/// inline string references.
pub const INLINE_STRING_BUILD: i32 = 11927;

/// Physical column types.
///
/// The serialized tags are the uppercase variant names, which is also the
/// form the schema store and catalog files use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Int,
    UInt,
    Float,
    String,
    Byte,
    UShort,
    ULong,
    /// Multi-slot locale string group: one offset per language plus a
    /// trailing presence mask.
    LangStringRef,
}

impl FieldType {
    /// Get the serialized tag for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::UInt => "UINT",
            Self::Float => "FLOAT",
            Self::String => "STRING",
            Self::Byte => "BYTE",
            Self::UShort => "USHORT",
            Self::ULong => "ULONG",
            Self::LangStringRef => "LANGSTRINGREF",
        }
    }

    /// Whether values of this type dereference into the string table.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::String | Self::LangStringRef)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One column of a schema entry. An empty name means unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    #[serde(rename = "@Name", default)]
    pub name: String,
    #[serde(rename = "@Type")]
    pub ty: FieldType,
}

impl SchemaField {
    /// A field whose name has not been established yet.
    pub fn unresolved(ty: FieldType) -> Self {
        Self {
            name: String::new(),
            ty,
        }
    }

    pub fn named(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// One candidate layout for a logical table across a set of builds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaEntry {
    /// Uppercased file name, e.g. `SPELL.DBC`.
    pub name: String,
    pub builds: Vec<i32>,
    /// On-disk column order; a locale string field stands for its whole
    /// multi-slot group.
    pub fields: Vec<SchemaField>,
}

impl SchemaEntry {
    pub fn new(name: impl Into<String>, build: i32) -> Self {
        Self {
            name: name.into(),
            builds: vec![build],
            fields: Vec::new(),
        }
    }

    /// Earliest build this entry spans, or `i32::MAX` for a dead entry.
    pub fn min_build(&self) -> i32 {
        self.builds.iter().copied().min().unwrap_or(i32::MAX)
    }

    /// Index of the field labelled `ID`, case-insensitive.
    pub fn id_field_index(&self) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case("ID"))
    }

    pub fn named_field_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_named()).count()
    }

    pub fn fully_named(&self) -> bool {
        self.fields.iter().all(SchemaField::is_named)
    }

    /// Whether both name and type sequences are identical end-to-end.
    ///
    /// Two entries passing this test describe the same true schema and can
    /// be merged.
    pub fn layout_matches(&self, other: &SchemaEntry) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name && a.ty == b.ty)
    }
}
