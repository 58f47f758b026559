//! Raw record decoding against a resolved schema.
//!
//! A [`RawTable`] pairs one build's raw bytes with its string table; calling
//! [`RawTable::decode`] against a schema entry turns every row into a flat
//! `f64` value array keyed by row id. The uniform representation is what
//! makes cross-build column correlation cheap: two columns match when their
//! numbers match, whatever their width on disk was.

use std::collections::BTreeMap;
use std::path::Path;

use memmap2::Mmap;
use veles_common::BinaryReader;

use crate::header::Header;
use crate::schema::{FieldType, SchemaEntry, SchemaField};
use crate::strings::StringTable;
use crate::{Error, FxHashSet, Result};

/// Returned for offsets that resolve to nothing. Never equal to a real
/// table entry; two misses compare equal to each other, which is the
/// behavior column correlation wants.
pub const MISSING_STRING: &str = "\u{1}<no-string>";

/// One build's raw bytes plus its string table.
#[derive(Debug)]
pub struct RawTable {
    pub string_table: StringTable,
    pub raw_records: Vec<Vec<u8>>,
}

impl RawTable {
    /// Memory-map and parse a raw file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(&mmap)
    }

    /// Parse a raw file from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let header = Header::parse(&mut reader)?;
        header.validate()?;

        let record_size = header.record_size() as usize;
        let record_bytes = reader.read_bytes(header.record_count() as usize * record_size)?;
        let string_table = StringTable::parse(reader.remaining_bytes());

        Ok(Self {
            string_table,
            raw_records: record_bytes
                .chunks_exact(record_size)
                .map(<[u8]>::to_vec)
                .collect(),
        })
    }

    /// Resolve a string offset, yielding the sentinel for misses.
    pub fn resolve_string(&self, offset: i32) -> &str {
        self.string_table.get(offset).unwrap_or(MISSING_STRING)
    }

    /// Decode every row into the uniform numeric representation.
    ///
    /// The field labelled `ID` keys the rows. When its values are not all
    /// distinct for this build the label is judged wrong: it is blanked on
    /// the entry, id lookup is disabled and synthetic ids take over. The id
    /// field itself is consumed but excluded from the value arrays.
    pub fn decode(&self, entry: &mut SchemaEntry) -> Result<DecodedRecords> {
        let row_len = self.raw_records.first().map_or(0, Vec::len);

        let mut id_index = entry.id_field_index();
        let ids: Vec<u32> = match id_index {
            Some(index) if row_len >= 4 => {
                let offset = index * 4;
                if offset + 4 > row_len {
                    return Err(Error::Decode(veles_common::Error::UnexpectedEof {
                        needed: offset + 4,
                        available: row_len,
                    }));
                }

                let ids: Vec<u32> = self
                    .raw_records
                    .iter()
                    .map(|row| {
                        u32::from_le_bytes([
                            row[offset],
                            row[offset + 1],
                            row[offset + 2],
                            row[offset + 3],
                        ])
                    })
                    .collect();

                let distinct: FxHashSet<u32> = ids.iter().copied().collect();
                if distinct.len() == ids.len() {
                    ids
                } else {
                    entry.fields[index].name.clear();
                    id_index = None;
                    (0..self.raw_records.len() as u32).collect()
                }
            }
            _ => (0..self.raw_records.len() as u32).collect(),
        };

        let mut records = BTreeMap::new();
        for (row, id) in self.raw_records.iter().zip(ids) {
            let values = decode_row(row, &entry.fields, id_index).map_err(Error::Decode)?;
            records.insert(id, values);
        }

        Ok(DecodedRecords { id_index, records })
    }
}

/// Decode one row, one value per non-id field in layout order.
fn decode_row(
    row: &[u8],
    fields: &[SchemaField],
    id_index: Option<usize>,
) -> veles_common::Result<Vec<f64>> {
    let mut reader = BinaryReader::new(row);
    let mut values = Vec::with_capacity(fields.len());

    for (index, field) in fields.iter().enumerate() {
        if Some(index) == id_index {
            reader.advance(4);
            continue;
        }

        match field.ty {
            FieldType::Float => values.push(f64::from(reader.read_f32()?)),
            FieldType::Byte => values.push(f64::from(reader.read_u8()?)),
            FieldType::UShort => values.push(f64::from(reader.read_u16()?)),
            FieldType::ULong => values.push(reader.read_u64()? as f64),
            FieldType::LangStringRef => {
                // Primary locale slot carries the offset; the group's width
                // depends on the layout, so skip zero slots until the
                // populated slot or the trailing mask shows up.
                values.push(f64::from(reader.read_i32()?));
                while reader.read_i32()? == 0 {}
            }
            // INT, UINT, STRING and unresolved placeholders are all plain
            // 4-byte columns.
            _ => values.push(f64::from(reader.read_i32()?)),
        }
    }

    Ok(values)
}

/// Decoded rows of one raw table.
#[derive(Debug)]
pub struct DecodedRecords {
    /// Field index of the trusted id column, when one exists.
    pub id_index: Option<usize>,
    /// Row key (real or synthetic id) to value array.
    pub records: BTreeMap<u32, Vec<f64>>,
}

impl DecodedRecords {
    pub fn has_id(&self) -> bool {
        self.id_index.is_some()
    }

    /// Position of a field's value inside the value arrays.
    pub fn value_index(&self, field_index: usize) -> usize {
        match self.id_index {
            Some(id) if field_index > id => field_index - 1,
            _ => field_index,
        }
    }

    /// Value of one field over one row key.
    pub fn value(&self, key: u32, field_index: usize) -> Option<f64> {
        self.records
            .get(&key)
            .map(|values| values[self.value_index(field_index)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{BaseHeader, Signature};

    fn file(rows: &[Vec<u8>], string_block: &[u8], field_count: u32) -> Vec<u8> {
        let record_size = rows.first().map_or(0, Vec::len);
        let header = Header {
            signature: Signature::Wdbc,
            base: BaseHeader {
                record_count: rows.len() as u32,
                field_count,
                record_size: record_size as u32,
                string_block_size: string_block.len() as u32,
            },
            db2: None,
        };
        let mut out = header.encode();
        for row in rows {
            out.extend_from_slice(row);
        }
        out.extend_from_slice(string_block);
        out
    }

    fn ints(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn entry(fields: Vec<SchemaField>) -> SchemaEntry {
        SchemaEntry {
            name: "TEST.DBC".into(),
            builds: vec![3368],
            fields,
        }
    }

    #[test]
    fn test_decode_keyed_by_id() {
        let data = file(&[ints(&[10, 100]), ints(&[20, 200])], b"\0", 2);
        let raw = RawTable::parse(&data).unwrap();

        let mut entry = entry(vec![
            SchemaField::named("ID", FieldType::Int),
            SchemaField::unresolved(FieldType::Int),
        ]);
        let decoded = raw.decode(&mut entry).unwrap();

        assert_eq!(decoded.id_index, Some(0));
        assert_eq!(decoded.records[&10], vec![100.0]);
        assert_eq!(decoded.records[&20], vec![200.0]);
        assert_eq!(decoded.value(20, 1), Some(200.0));
    }

    #[test]
    fn test_duplicate_ids_disable_id_lookup() {
        let data = file(&[ints(&[5, 100]), ints(&[5, 200])], b"\0", 2);
        let raw = RawTable::parse(&data).unwrap();

        let mut entry = entry(vec![
            SchemaField::named("ID", FieldType::Int),
            SchemaField::named("VALUE", FieldType::Int),
        ]);
        let decoded = raw.decode(&mut entry).unwrap();

        // The label was wrong: blanked, synthetic keys, and the former id
        // column decodes as an ordinary value.
        assert!(!entry.fields[0].is_named());
        assert_eq!(decoded.id_index, None);
        assert_eq!(decoded.records[&0], vec![5.0, 100.0]);
        assert_eq!(decoded.records[&1], vec![5.0, 200.0]);
    }

    #[test]
    fn test_mixed_width_row() {
        // BYTE + USHORT + FLOAT + ULONG + INT = 1 + 2 + 4 + 8 + 4 bytes.
        let mut row = vec![7u8];
        row.extend_from_slice(&513u16.to_le_bytes());
        row.extend_from_slice(&2.5f32.to_le_bytes());
        row.extend_from_slice(&90_000u64.to_le_bytes());
        row.extend_from_slice(&(-3i32).to_le_bytes());

        let data = file(&[row], b"\0", 5);
        let raw = RawTable::parse(&data).unwrap();

        let mut entry = entry(vec![
            SchemaField::unresolved(FieldType::Byte),
            SchemaField::unresolved(FieldType::UShort),
            SchemaField::unresolved(FieldType::Float),
            SchemaField::unresolved(FieldType::ULong),
            SchemaField::unresolved(FieldType::Int),
        ]);
        let decoded = raw.decode(&mut entry).unwrap();

        assert_eq!(
            decoded.records[&0],
            vec![7.0, 513.0, 2.5, 90_000.0, -3.0]
        );
    }

    #[test]
    fn test_locale_group_width_is_layout_dependent() {
        // Offset, 7 unused slots, mask, then a trailing int column.
        let mut row = ints(&[1]);
        row.extend_from_slice(&ints(&[0; 7]));
        row.extend_from_slice(&ints(&[0xFF, 42]));

        let data = file(&[row], b"\0loot\0", 10);
        let raw = RawTable::parse(&data).unwrap();

        let mut entry = entry(vec![
            SchemaField::unresolved(FieldType::LangStringRef),
            SchemaField::unresolved(FieldType::Int),
        ]);
        let decoded = raw.decode(&mut entry).unwrap();

        assert_eq!(decoded.records[&0], vec![1.0, 42.0]);
    }

    #[test]
    fn test_truncated_row_is_decode_failure() {
        let data = file(&[ints(&[1])], b"\0", 1);
        let raw = RawTable::parse(&data).unwrap();

        let mut entry = entry(vec![SchemaField::unresolved(FieldType::ULong)]);
        assert!(matches!(raw.decode(&mut entry), Err(Error::Decode(_))));
    }

    #[test]
    fn test_missing_string_sentinel() {
        let data = file(&[ints(&[1])], b"\0ox\0", 1);
        let raw = RawTable::parse(&data).unwrap();

        assert_eq!(raw.resolve_string(1), "ox");
        assert_eq!(raw.resolve_string(999), MISSING_STRING);
        // Two misses agree, one miss and one hit never do.
        assert_eq!(raw.resolve_string(999), raw.resolve_string(777));
        assert_ne!(raw.resolve_string(1), raw.resolve_string(999));
    }
}
