//! Byte-level row matching.
//!
//! A coarser merge test than statistical comparison: two entries whose raw
//! files share even one byte-for-byte identical row (at equal row width and
//! field count) are taken to describe the same schema. Useful early on,
//! before enough columns are named for value correlation to work.

use veles_dbc::{BuildDirs, FieldType, RawTable, SchemaEntry};

use crate::compare::closest_builds;
use crate::FxHashMap;

/// Test two entries' nearest builds for a shared raw row; merge on success.
///
/// On a match the first entry absorbs the second: builds are appended and
/// every named field of the second is copied over by position (the second
/// wins conflicts). The second entry's build list is emptied, ending it.
pub fn row_level_match(first: &mut SchemaEntry, second: &mut SchemaEntry, dirs: &BuildDirs) -> bool {
    let Some((first_build, second_build)) = closest_builds(&first.builds, &second.builds) else {
        return false;
    };
    let (Some(first_path), Some(second_path)) = (
        dirs.raw_path(first_build, &first.name),
        dirs.raw_path(second_build, &second.name),
    ) else {
        return false;
    };
    let (Ok(first_raw), Ok(second_raw)) = (RawTable::open(first_path), RawTable::open(second_path))
    else {
        return false;
    };

    let (Some(width_a), Some(width_b)) = (
        first_raw.raw_records.first().map(Vec::len),
        second_raw.raw_records.first().map(Vec::len),
    ) else {
        return false;
    };
    if width_a != width_b {
        return false;
    }
    if first.fields.len() != second.fields.len() {
        return false;
    }

    let mut rows_a = first_raw.raw_records;
    let mut rows_b = second_raw.raw_records;
    rows_a.sort_unstable();
    rows_b.sort_unstable();

    if !any_common_row(&rows_a, &rows_b) {
        return false;
    }

    first.builds.extend_from_slice(&second.builds);
    for (target, source) in first.fields.iter_mut().zip(&second.fields) {
        if source.is_named() {
            *target = source.clone();
        }
    }
    second.builds.clear();

    true
}

/// Walk two sorted row lists for any identical element.
fn any_common_row(a: &[Vec<u8>], b: &[Vec<u8>]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Seed the `ID` label onto every entry whose leading column is an INT,
/// once any entry in the set already carries it. The id column does not
/// move in these formats, so the label transfers across builds for free.
pub fn propagate_id_column(entries: &mut [SchemaEntry]) {
    let id_known = entries
        .iter()
        .any(|entry| entry.fields.first().is_some_and(|field| field.name == "ID"));
    if !id_known {
        return;
    }
    for entry in entries.iter_mut() {
        if let Some(field) = entry.fields.first_mut() {
            if field.ty == FieldType::Int {
                field.name = "ID".into();
            }
        }
    }
}

/// Run pairwise matches backwards over the entry list, so matching entries
/// group down toward the earliest builds.
pub fn match_adjacent(entries: &mut [SchemaEntry], dirs: &BuildDirs) -> usize {
    let mut merges = 0;
    for index in (1..entries.len()).rev() {
        let (first, second) = pair_mut(entries, index - 1, index);
        if !first.builds.is_empty()
            && !second.builds.is_empty()
            && row_level_match(first, second, dirs)
        {
            merges += 1;
        }
    }
    merges
}

/// Like [`match_adjacent`], but only within groups of entries sharing an
/// identical field type sequence, a cheap prefilter when the list is long.
pub fn match_grouped(entries: &mut [SchemaEntry], dirs: &BuildDirs) -> usize {
    let mut groups: FxHashMap<Vec<FieldType>, Vec<usize>> = FxHashMap::default();
    for (index, entry) in entries.iter().enumerate() {
        let signature: Vec<FieldType> = entry.fields.iter().map(|field| field.ty).collect();
        groups.entry(signature).or_default().push(index);
    }

    let mut merges = 0;
    let mut grouped: Vec<Vec<usize>> = groups.into_values().filter(|g| g.len() > 1).collect();
    grouped.sort();

    for group in grouped {
        for pair in (1..group.len()).rev() {
            let (first, second) = pair_mut(entries, group[pair - 1], group[pair]);
            if !first.builds.is_empty()
                && !second.builds.is_empty()
                && row_level_match(first, second, dirs)
            {
                merges += 1;
            }
        }
    }
    merges
}

/// Split-borrow two distinct entries, `a < b`.
fn pair_mut(entries: &mut [SchemaEntry], a: usize, b: usize) -> (&mut SchemaEntry, &mut SchemaEntry) {
    debug_assert!(a < b);
    let (head, tail) = entries.split_at_mut(b);
    (&mut head[a], &mut tail[0])
}
