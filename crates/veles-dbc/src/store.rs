//! Persisted schema store.
//!
//! One XML document per logical table holds every known [`SchemaEntry`] for
//! it. The store is read before and written after each reconciliation pass;
//! entry order carries no meaning but is normalized on every save so diffs
//! between runs stay readable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::schema::{SchemaEntry, SchemaField};
use crate::Result;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Entries")]
struct StoreXml {
    #[serde(rename = "Entry", default)]
    entries: Vec<EntryXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryXml {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "Builds")]
    builds: BuildListXml,
    #[serde(rename = "Fields")]
    fields: FieldListXml,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BuildListXml {
    #[serde(rename = "Build", default)]
    items: Vec<i32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FieldListXml {
    #[serde(rename = "Field", default)]
    items: Vec<SchemaField>,
}

impl From<&SchemaEntry> for EntryXml {
    fn from(entry: &SchemaEntry) -> Self {
        Self {
            name: entry.name.clone(),
            builds: BuildListXml {
                items: entry.builds.clone(),
            },
            fields: FieldListXml {
                items: entry.fields.clone(),
            },
        }
    }
}

impl From<EntryXml> for SchemaEntry {
    fn from(entry: EntryXml) -> Self {
        Self {
            name: entry.name,
            builds: entry.builds.items,
            fields: entry.fields.items,
        }
    }
}

/// Sort builds within each entry and entries by their earliest build.
pub fn normalize(entries: &mut [SchemaEntry]) {
    for entry in entries.iter_mut() {
        entry.builds.sort_unstable();
    }
    entries.sort_by_key(SchemaEntry::min_build);
}

/// Read every entry of one store document.
pub fn read_entries<P: AsRef<Path>>(path: P) -> Result<Vec<SchemaEntry>> {
    let doc: StoreXml = quick_xml::de::from_str(&fs::read_to_string(path)?)?;
    Ok(doc.entries.into_iter().map(SchemaEntry::from).collect())
}

/// Write a store document, normalizing entry order first.
pub fn write_entries<P: AsRef<Path>>(path: P, entries: &mut Vec<SchemaEntry>) -> Result<()> {
    normalize(entries);

    let doc = StoreXml {
        entries: entries.iter().map(EntryXml::from).collect(),
    };

    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    doc.serialize(serializer)?;

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&body);
    out.push('\n');
    fs::write(path, out)?;
    Ok(())
}
