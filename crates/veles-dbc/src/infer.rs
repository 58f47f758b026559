//! Column type inference for files without a known schema.
//!
//! Nothing inside a record file says what its columns mean. When the
//! catalog has no layout for a (build, table) pair, the only evidence is
//! the bytes themselves: every cell of a column is tested against each
//! remaining candidate type, and whichever candidate survives with the
//! strongest statistics wins. The resulting entry has types but no names;
//! names arrive later through cross-build reconciliation.

use std::path::Path;

use veles_common::BinaryReader;

use crate::catalog::Catalog;
use crate::float::plausible_float;
use crate::header::Header;
use crate::schema::{FieldType, SchemaEntry, SchemaField};
use crate::strings::StringTable;
use crate::{FxHashSet, Result};

/// Fraction of non-zero cells that must pass the float heuristic before a
/// column is declared FLOAT.
pub const FLOAT_FRACTION_THRESHOLD: f64 = 0.85;

/// Locale slots in the narrow (pre-expansion) string group layout.
const NARROW_LOCALE_SLOTS: usize = 8;

/// Locale slots in the wide string group layout.
const WIDE_LOCALE_SLOTS: usize = 16;

/// Diagnostics accumulated by the caller across many scans.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    /// Earliest build observed using the wide 16-slot locale layout.
    pub wide_locale_min_build: Option<i32>,
}

impl ScanStats {
    fn note_wide_locale(&mut self, build: i32) {
        self.wide_locale_min_build = Some(match self.wide_locale_min_build {
            Some(known) => known.min(build),
            None => build,
        });
    }
}

/// Non-fatal condition observed while scanning one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanWarning {
    /// Columns narrower than 4 bytes cannot be classified.
    ByteColumns,
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByteColumns => write!(f, "has byte columns"),
        }
    }
}

/// Result of scanning one file.
#[derive(Debug)]
pub struct ScanOutcome {
    pub entry: SchemaEntry,
    pub warning: Option<ScanWarning>,
}

/// Everything measured about one column before the type decision.
#[derive(Debug)]
struct ColumnProfile {
    /// No cell had a non-zero value.
    empty: bool,
    /// Share of non-zero cells passing the float heuristic.
    float_fraction: f64,
    /// Distinct string values the column's offsets resolved to.
    unique_strings: usize,
    /// STRING survived every cell of the column.
    string_candidate: bool,
}

/// Scan a file and produce a schema entry for it.
///
/// A catalog match with the exact field count takes precedence over
/// anything the bytes suggest. Files whose columns are not 4-byte aligned
/// yield a fieldless placeholder entry with the [`ScanWarning::ByteColumns`]
/// flag instead of a classification attempt.
pub fn scan(
    data: &[u8],
    build: i32,
    file_name: &str,
    catalog: &Catalog,
    stats: &mut ScanStats,
) -> Result<ScanOutcome> {
    let mut reader = BinaryReader::new(data);
    let header = Header::parse(&mut reader)?;
    let name = file_name.to_uppercase();

    if let Some(table) = catalog.find(build, &table_key(file_name)) {
        let fields = table.expand();
        if fields.len() == header.field_count() as usize {
            return Ok(ScanOutcome {
                entry: SchemaEntry {
                    name,
                    builds: vec![build],
                    fields,
                },
                warning: None,
            });
        }
    }

    header.validate()?;

    if !header.has_aligned_columns() {
        return Ok(ScanOutcome {
            entry: SchemaEntry::new(name, build),
            warning: Some(ScanWarning::ByteColumns),
        });
    }

    let record_size = header.record_size() as usize;
    let record_bytes = reader.read_bytes(header.record_count() as usize * record_size)?;
    let rows: Vec<&[u8]> = record_bytes.chunks_exact(record_size).collect();

    let table = StringTable::parse(reader.remaining_bytes());

    let profiles = profile_columns(&rows, header.field_count() as usize, &table);
    let fields = decide_types(&profiles, &table, &header, build, stats);

    Ok(ScanOutcome {
        entry: SchemaEntry {
            name,
            builds: vec![build],
            fields,
        },
        warning: None,
    })
}

/// Uppercased file stem, the key the catalog indexes tables by.
pub fn table_key(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}

fn profile_columns(rows: &[&[u8]], field_count: usize, table: &StringTable) -> Vec<ColumnProfile> {
    let has_strings = table.is_meaningful();

    (0..field_count)
        .map(|column| {
            let mut string_candidate = has_strings;
            let mut strings: FxHashSet<&str> = FxHashSet::default();
            let mut samples = 0usize;
            let mut float_matches = 0usize;

            for row in rows {
                let cell = &row[column * 4..column * 4 + 4];
                // All-zero cells fit any type and carry no signal.
                if cell.iter().all(|&b| b == 0) {
                    continue;
                }
                samples += 1;

                let as_int = i32::from_le_bytes([cell[0], cell[1], cell[2], cell[3]]);

                if string_candidate {
                    match table.get(as_int) {
                        Some(text) => {
                            strings.insert(text);
                        }
                        None => {
                            // One bad offset disqualifies the whole column.
                            string_candidate = false;
                            strings.clear();
                        }
                    }
                }

                if plausible_float(as_int) {
                    float_matches += 1;
                }
            }

            ColumnProfile {
                empty: samples == 0,
                float_fraction: if samples == 0 {
                    0.0
                } else {
                    float_matches as f64 / samples as f64
                },
                unique_strings: strings.len(),
                string_candidate,
            }
        })
        .collect()
}

fn decide_types(
    profiles: &[ColumnProfile],
    table: &StringTable,
    header: &Header,
    build: i32,
    stats: &mut ScanStats,
) -> Vec<SchemaField> {
    let field_count = profiles.len();
    let sparse_table = table.populated_count() < field_count;

    let mut fields = Vec::with_capacity(field_count);
    let mut i = 0;
    while i < field_count {
        let profile = &profiles[i];

        let mut ty = if profile.empty {
            FieldType::Int
        } else if profile.float_fraction > FLOAT_FRACTION_THRESHOLD {
            FieldType::Float
        } else if profile.string_candidate && profile.unique_strings > 0 {
            if sparse_table && header.record_count() == 1 {
                // A single-row file with fewer strings than columns: the
                // leading column is an id that happens to collide with an
                // offset, later columns really are strings.
                if i == 0 {
                    FieldType::Int
                } else {
                    FieldType::String
                }
            } else if profile.unique_strings == 1 {
                // The same string in every row is an offset collision, not
                // a string column.
                FieldType::Int
            } else {
                FieldType::String
            }
        } else {
            FieldType::Int
        };

        let mut absorbed = 0;
        if ty == FieldType::String {
            if let Some(span) = locale_group_span(profiles, i + 1) {
                ty = FieldType::LangStringRef;
                absorbed = span;
                if span == WIDE_LOCALE_SLOTS {
                    stats.note_wide_locale(build);
                }
            }
        }

        fields.push(SchemaField::unresolved(ty));
        i += 1 + absorbed;
    }

    fields
}

/// Detect a locale slot group starting at `start`: all slots empty except a
/// populated trailing mask. Int candidacy is never revoked, so a non-empty
/// mask column is numeric by construction.
fn locale_group_span(profiles: &[ColumnProfile], start: usize) -> Option<usize> {
    [NARROW_LOCALE_SLOTS, WIDE_LOCALE_SLOTS]
        .into_iter()
        .find(|&span| {
            profiles.get(start..start + span).is_some_and(|window| {
                window[..span - 1].iter().all(|p| p.empty) && !window[span - 1].empty
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{BaseHeader, Signature};

    /// Assemble a WDBC file from equal-length rows and a string block.
    fn file(rows: &[Vec<u8>], string_block: &[u8]) -> Vec<u8> {
        let record_size = rows.first().map_or(0, Vec::len);
        let header = Header {
            signature: Signature::Wdbc,
            base: BaseHeader {
                record_count: rows.len() as u32,
                field_count: (record_size / 4) as u32,
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

    fn cells(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn types(outcome: &ScanOutcome) -> Vec<FieldType> {
        outcome.entry.fields.iter().map(|f| f.ty).collect()
    }

    fn scan_plain(data: &[u8]) -> ScanOutcome {
        let mut stats = ScanStats::default();
        scan(data, 3368, "Spell.dbc", &Catalog::default(), &mut stats).unwrap()
    }

    #[test]
    fn test_int_and_float_columns() {
        let rows: Vec<Vec<u8>> = (1..=4)
            .map(|i| {
                let mut row = cells(&[i]);
                row.extend_from_slice(&(i as f32 * 1.5).to_le_bytes());
                row
            })
            .collect();
        let outcome = scan_plain(&file(&rows, b"\0"));

        assert_eq!(types(&outcome), vec![FieldType::Int, FieldType::Float]);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn test_empty_column_defaults_to_int() {
        let rows = vec![cells(&[0, 7]), cells(&[0, 9])];
        let outcome = scan_plain(&file(&rows, b"\0"));

        assert_eq!(types(&outcome), vec![FieldType::Int, FieldType::Int]);
    }

    #[test]
    fn test_string_column() {
        // Offsets 1 and 6 point at distinct strings.
        let rows = vec![cells(&[1, 1]), cells(&[2, 6])];
        let outcome = scan_plain(&file(&rows, b"\0wand\0staff\0"));

        assert_eq!(types(&outcome), vec![FieldType::Int, FieldType::String]);
    }

    #[test]
    fn test_bad_offset_disqualifies_string() {
        // Second row's offset 999 is outside the table.
        let rows = vec![cells(&[1, 1]), cells(&[2, 999])];
        let outcome = scan_plain(&file(&rows, b"\0wand\0staff\0"));

        assert_eq!(types(&outcome), vec![FieldType::Int, FieldType::Int]);
    }

    #[test]
    fn test_single_repeated_string_is_int() {
        let rows = vec![cells(&[1, 1]), cells(&[2, 1]), cells(&[3, 1])];
        let outcome = scan_plain(&file(&rows, b"\0wand\0staff\0"));

        assert_eq!(types(&outcome), vec![FieldType::Int, FieldType::Int]);
    }

    #[test]
    fn test_single_record_leading_id() {
        // One record, one populated string, two columns; both cells hold a
        // valid offset. Column 0 is id-like, column 1 is the real string.
        let rows = vec![cells(&[1, 1])];
        let outcome = scan_plain(&file(&rows, b"\0gold\0"));

        assert_eq!(types(&outcome), vec![FieldType::Int, FieldType::String]);
    }

    #[test]
    fn test_byte_columns_placeholder() {
        let header = Header {
            signature: Signature::Wdbc,
            base: BaseHeader {
                record_count: 2,
                field_count: 3,
                record_size: 6,
                string_block_size: 0,
            },
            db2: None,
        };
        let mut data = header.encode();
        data.extend_from_slice(&[1u8; 12]);

        let outcome = scan_plain(&data);
        assert_eq!(outcome.warning, Some(ScanWarning::ByteColumns));
        assert!(outcome.entry.fields.is_empty());
        assert_eq!(outcome.entry.builds, vec![3368]);
    }

    #[test]
    fn test_narrow_locale_group_absorbed() {
        // Column 0: string, columns 1-7: empty, column 8: mask.
        let rows = vec![
            {
                let mut row = cells(&[1]);
                row.extend_from_slice(&cells(&[0; 7]));
                row.extend_from_slice(&cells(&[0xFF00FF]));
                row
            },
            {
                let mut row = cells(&[6]);
                row.extend_from_slice(&cells(&[0; 7]));
                row.extend_from_slice(&cells(&[0xFF00FF]));
                row
            },
        ];
        let mut stats = ScanStats::default();
        let data = file(&rows, b"\0wand\0staff\0");
        let outcome = scan(&data, 5875, "Item.dbc", &Catalog::default(), &mut stats).unwrap();

        assert_eq!(types(&outcome), vec![FieldType::LangStringRef]);
        // Only the wide layout feeds the tracker.
        assert_eq!(stats.wide_locale_min_build, None);
    }

    #[test]
    fn test_wide_locale_group_absorbed_and_tracked() {
        let make_row = |offset: i32| {
            let mut row = cells(&[offset]);
            row.extend_from_slice(&cells(&[0; 15]));
            row.extend_from_slice(&cells(&[0x1FF01FF]));
            row
        };
        let rows = vec![make_row(1), make_row(6)];
        let data = file(&rows, b"\0wand\0staff\0");

        let mut stats = ScanStats::default();
        let outcome = scan(&data, 12340, "Item.dbc", &Catalog::default(), &mut stats).unwrap();
        assert_eq!(types(&outcome), vec![FieldType::LangStringRef]);
        assert_eq!(stats.wide_locale_min_build, Some(12340));

        // The tracker keeps the minimum across scans.
        scan(&data, 11159, "Item.dbc", &Catalog::default(), &mut stats).unwrap();
        assert_eq!(stats.wide_locale_min_build, Some(11159));
        scan(&data, 13329, "Item.dbc", &Catalog::default(), &mut stats).unwrap();
        assert_eq!(stats.wide_locale_min_build, Some(11159));
    }

    #[test]
    fn test_inference_is_deterministic() {
        // A mixed file scanned repeatedly yields the same sequence.
        let rows: Vec<Vec<u8>> = (1..=5)
            .map(|i| {
                let mut row = cells(&[i, if i % 2 == 0 { 1 } else { 6 }]);
                row.extend_from_slice(&(i as f32 * 0.25).to_le_bytes());
                row.extend_from_slice(&cells(&[0]));
                row
            })
            .collect();
        let data = file(&rows, b"\0wand\0staff\0");

        let first = types(&scan_plain(&data));
        for _ in 0..10 {
            assert_eq!(types(&scan_plain(&data)), first);
        }
    }
}
