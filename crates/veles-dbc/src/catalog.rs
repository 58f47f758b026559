//! Known-schema catalog.
//!
//! Community-maintained XML definition files describe the authoritative
//! layout of some (table, build) pairs. The catalog loads them once at
//! startup and answers lookups with fully-named field lists; everything it
//! cannot answer falls through to content inference.
//!
//! Definition type tags are free text on disk but are parsed into
//! [`FieldType`] here, at load time; an unrecognized tag aborts the load.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::schema::{FieldType, SchemaField};
use crate::{Error, FxHashSet, Result};

#[derive(Debug, Deserialize)]
struct DefinitionXml {
    #[serde(rename = "Table", default)]
    tables: Vec<TableXml>,
}

#[derive(Debug, Deserialize)]
struct TableXml {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "@Build")]
    build: i32,
    #[serde(rename = "Field", default)]
    fields: Vec<FieldXml>,
}

#[derive(Debug, Deserialize)]
struct FieldXml {
    #[serde(rename = "@Name", default)]
    name: String,
    #[serde(rename = "@Type")]
    ty: String,
    #[serde(rename = "@ArraySize", default = "default_array_size")]
    array_size: u32,
    #[serde(rename = "@AutoGenerate", default)]
    auto_generate: bool,
}

fn default_array_size() -> u32 {
    1
}

/// One authoritative table layout for one build.
#[derive(Debug, Clone)]
pub struct CatalogTable {
    /// Uppercased table name (file stem).
    pub name: String,
    pub build: i32,
    fields: Vec<CatalogField>,
}

#[derive(Debug, Clone)]
struct CatalogField {
    name: String,
    ty: FieldType,
    array_size: u32,
}

impl CatalogTable {
    /// Expand the definition into per-column schema fields.
    ///
    /// Array fields become numbered columns (`NAME1`, `NAME2`, ...); names
    /// are uppercased.
    pub fn expand(&self) -> Vec<SchemaField> {
        let mut out = Vec::new();
        for field in &self.fields {
            if field.array_size <= 1 {
                out.push(SchemaField::named(field.name.to_uppercase(), field.ty));
            } else {
                for i in 1..=field.array_size {
                    let name = format!("{}{}", field.name, i).to_uppercase();
                    out.push(SchemaField::named(name, field.ty));
                }
            }
        }
        out
    }
}

/// The loaded set of known table definitions.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: Vec<CatalogTable>,
}

impl Catalog {
    /// Load and union several definition files.
    ///
    /// Tables repeated across files keep their first definition.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut catalog = Self::default();
        for path in paths {
            catalog.merge_str(&fs::read_to_string(path)?)?;
        }
        Ok(catalog)
    }

    /// Parse one definition document and union its tables in.
    pub fn merge_str(&mut self, xml: &str) -> Result<()> {
        let doc: DefinitionXml = quick_xml::de::from_str(xml)?;

        let mut seen: FxHashSet<(String, i32)> = self
            .tables
            .iter()
            .map(|t| (t.name.clone(), t.build))
            .collect();

        for table in doc.tables {
            let name = table.name.to_uppercase();
            if !seen.insert((name.clone(), table.build)) {
                continue;
            }

            let mut fields = Vec::with_capacity(table.fields.len());
            for field in &table.fields {
                // Auto-generated and nameless fields are not real columns.
                if field.auto_generate || field.name.trim().is_empty() {
                    continue;
                }
                fields.push(CatalogField {
                    name: field.name.clone(),
                    ty: parse_type_tag(&field.ty)?,
                    array_size: field.array_size,
                });
            }

            self.tables.push(CatalogTable {
                name,
                build: table.build,
                fields,
            });
        }

        Ok(())
    }

    /// Exact (build, table) lookup.
    pub fn find(&self, build: i32, name: &str) -> Option<&CatalogTable> {
        self.tables
            .iter()
            .find(|t| t.build == build && t.name == name)
    }

    /// First table whose build appears in the given build set.
    pub fn find_for_builds(&self, builds: &[i32], name: &str) -> Option<&CatalogTable> {
        self.tables
            .iter()
            .find(|t| builds.contains(&t.build) && t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Parse a definition type tag.
///
/// Tags are matched case-insensitively with an optional `u` prefix for the
/// aliases that have one; unsigned variants that matter for decoding keep
/// their own type.
fn parse_type_tag(tag: &str) -> Result<FieldType> {
    let norm = tag.trim().to_ascii_lowercase();
    let unsigned = norm.starts_with('u');
    let stripped = norm.strip_prefix('u').unwrap_or(&norm);

    match stripped {
        "loc" => Ok(FieldType::LangStringRef),
        "short" => Ok(FieldType::UShort),
        "byte" => Ok(FieldType::Byte),
        "float" => Ok(FieldType::Float),
        "string" => Ok(FieldType::String),
        "long" => Ok(FieldType::ULong),
        "int" => Ok(if unsigned { FieldType::UInt } else { FieldType::Int }),
        _ => Err(Error::UnknownTypeTag(tag.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        <Definition>
            <Table Name="Spell" Build="3368">
                <Field Name="ID" Type="int"/>
                <Field Name="School" Type="uint"/>
                <Field Name="Name" Type="loc"/>
                <Field Name="Reagent" Type="int" ArraySize="2"/>
                <Field Name="Internal" Type="int" AutoGenerate="true"/>
                <Field Type="int"/>
            </Table>
        </Definition>
    "#;

    #[test]
    fn test_expand_fields() {
        let mut catalog = Catalog::default();
        catalog.merge_str(DOC).unwrap();

        let table = catalog.find(3368, "SPELL").expect("table loaded");
        let fields = table.expand();

        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "SCHOOL", "NAME", "REAGENT1", "REAGENT2"]);
        assert_eq!(fields[1].ty, FieldType::UInt);
        assert_eq!(fields[2].ty, FieldType::LangStringRef);
    }

    #[test]
    fn test_lookup_misses() {
        let mut catalog = Catalog::default();
        catalog.merge_str(DOC).unwrap();

        assert!(catalog.find(3368, "SPELLX").is_none());
        assert!(catalog.find(9999, "SPELL").is_none());
        assert!(catalog.find_for_builds(&[100, 3368], "SPELL").is_some());
        assert!(catalog.find_for_builds(&[100, 200], "SPELL").is_none());
    }

    #[test]
    fn test_first_definition_wins() {
        let mut catalog = Catalog::default();
        catalog.merge_str(DOC).unwrap();
        catalog
            .merge_str(
                r#"<Definition>
                    <Table Name="SPELL" Build="3368">
                        <Field Name="Other" Type="float"/>
                    </Table>
                </Definition>"#,
            )
            .unwrap();

        assert_eq!(catalog.len(), 1);
        let fields = catalog.find(3368, "SPELL").unwrap().expand();
        assert_eq!(fields[0].name, "ID");
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(parse_type_tag(" loc ").unwrap(), FieldType::LangStringRef);
        assert_eq!(parse_type_tag("short").unwrap(), FieldType::UShort);
        assert_eq!(parse_type_tag("ushort").unwrap(), FieldType::UShort);
        assert_eq!(parse_type_tag("uint").unwrap(), FieldType::UInt);
        assert_eq!(parse_type_tag("Int").unwrap(), FieldType::Int);
        assert_eq!(parse_type_tag("long").unwrap(), FieldType::ULong);
        assert_eq!(parse_type_tag("ulong").unwrap(), FieldType::ULong);
        assert!(matches!(
            parse_type_tag("quaternion"),
            Err(Error::UnknownTypeTag(_))
        ));
    }
}
