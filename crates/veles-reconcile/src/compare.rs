//! Statistical cross-build reconciliation.
//!
//! The entries of one logical table arrive as an ordered list, each tagged
//! with the builds it is believed to span. Adjacent entries are compared by
//! decoding a representative raw file from each side (the two closest
//! builds) and correlating column values over the rows both files share:
//! when an already-named column keeps its values across the build gap, its
//! name is carried over to the unnamed side. Entries whose layouts end up
//! identical are the same true schema and are merged.
//!
//! The pair loop is inherently sequential, since every pair sees the merges
//! of the previous one, but the per-column scoring inside a pair is not:
//! phase A scores every candidate pairing in parallel against immutable
//! decoded tables, phase B applies a deterministic tie-break and writes the
//! winners sequentially. No write ever races another.

use rayon::prelude::*;

use veles_dbc::{
    table_key, BuildDirs, Catalog, DecodedRecords, FieldType, RawTable, SchemaEntry, SchemaField,
    INLINE_STRING_BUILD,
};

use crate::{FxHashMap, FxHashSet};

/// Minimum fraction of shared rows that must agree before a numeric column
/// pairing is accepted.
pub const MATCH_THRESHOLD: f64 = 0.95;

/// Acceptance threshold for string columns, slightly looser because both
/// sides go through their own string table.
pub const STRING_MATCH_THRESHOLD: f64 = 0.90;

/// Columns with more than this fraction of zero values are rejected
/// outright; they would match almost anything.
pub const ZERO_REJECT_THRESHOLD: f64 = 0.95;

/// DBC/DB2 hybrid tables from the WoD alpha whose headers misreport their
/// layout; structural comparison is unsafe for them.
const EXCLUDED_TABLES: &[&str] = &["groupfindercategory", "garrplotuicategory"];

/// Whether a table is excluded from structural comparison entirely.
pub fn is_excluded(name: &str) -> bool {
    let lower = name.to_lowercase();
    EXCLUDED_TABLES.iter().any(|skip| lower.contains(skip))
}

/// Counters describing what one reconciliation run did.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    /// Pairs whose decoded tables were actually compared.
    pub pairs_compared: usize,
    /// Pairs skipped over a failed decode, id disagreement or nothing left
    /// to name.
    pub pairs_skipped: usize,
    /// Columns that received a name.
    pub fields_named: usize,
    /// Entries absorbed into an identical neighbor.
    pub merges: usize,
    /// Fields blanked again because a name matched more than one column.
    pub ambiguous_reverts: usize,
}

/// One accepted candidate pairing from scoring phase A.
#[derive(Debug, Clone, Copy)]
struct Score {
    x: usize,
    y: usize,
    fraction: f64,
}

/// Reconciles the entries of one logical table across builds.
pub struct Reconciler<'a> {
    catalog: &'a Catalog,
    dirs: &'a BuildDirs,
}

impl<'a> Reconciler<'a> {
    pub fn new(catalog: &'a Catalog, dirs: &'a BuildDirs) -> Self {
        Self { catalog, dirs }
    }

    /// Run both sweeps over one table's entries, mutating them in place.
    ///
    /// Information learned from a later build must also be allowed to fill
    /// gaps in an earlier one, so the adjacent-pair sweep runs forward and
    /// then again over the reversed list. Entries drained of builds by a
    /// merge are dropped at the end.
    pub fn reconcile(&self, entries: &mut Vec<SchemaEntry>) -> SweepStats {
        let mut stats = SweepStats::default();
        if entries.len() <= 1 {
            return stats;
        }

        for entry in entries.iter_mut() {
            entry.builds.sort_unstable();
        }
        entries.sort_by_key(SchemaEntry::min_build);

        // Catalog knowledge outranks anything inferred or propagated.
        for entry in entries.iter_mut() {
            let key = table_key(&entry.name);
            if let Some(table) = self.catalog.find_for_builds(&entry.builds, &key) {
                entry.fields = table.expand();
            }
        }

        self.sweep(entries, &mut stats);
        entries.reverse();
        self.sweep(entries, &mut stats);
        entries.reverse();

        entries.retain(|entry| !entry.builds.is_empty());
        for entry in entries.iter_mut() {
            entry.builds.sort_unstable();
        }
        entries.sort_by_key(SchemaEntry::min_build);

        stats
    }

    fn sweep(&self, entries: &mut Vec<SchemaEntry>, stats: &mut SweepStats) {
        let mut index = 1;
        while index < entries.len() {
            if self.compare_pair(entries, index, stats) {
                // The absorbed entry leaves the working list; its successor
                // slides in and gets its turn on the opposite sweep.
                entries.remove(index);
            }
            index += 1;
        }
    }

    /// Compare `entries[index - 1]` (prev) against `entries[index]` (cur).
    ///
    /// Returns true when cur was fully absorbed into prev.
    fn compare_pair(
        &self,
        entries: &mut [SchemaEntry],
        index: usize,
        stats: &mut SweepStats,
    ) -> bool {
        let (head, tail) = entries.split_at_mut(index);
        let prev = &mut head[index - 1];
        let cur = &mut tail[0];

        let Some((prev_build, cur_build)) = closest_builds(&prev.builds, &cur.builds) else {
            stats.pairs_skipped += 1;
            return false;
        };

        let decoded = (
            self.open_decoded(prev_build, prev),
            self.open_decoded(cur_build, cur),
        );
        let ((prev_raw, prev_dec), (cur_raw, cur_dec)) = match decoded {
            (Some(prev), Some(cur)) => (prev, cur),
            _ => {
                stats.pairs_skipped += 1;
                return false;
            }
        };

        // Row correspondence is only safe when both sides agree on having
        // an id column.
        if prev_dec.has_id() != cur_dec.has_id() {
            stats.pairs_skipped += 1;
            return false;
        }
        // Nothing left to name on this side.
        if cur.fields.iter().all(SchemaField::is_named) {
            stats.pairs_skipped += 1;
            return false;
        }
        stats.pairs_compared += 1;

        // The comparison population: rows present in both decodes.
        let ids: Vec<u32> = prev_dec
            .records
            .keys()
            .filter(|key| cur_dec.records.contains_key(key))
            .copied()
            .collect();

        let known: FxHashSet<String> = cur
            .fields
            .iter()
            .filter(|field| field.is_named())
            .map(|field| field.name.clone())
            .collect();

        let xs: Vec<usize> = (0..prev.fields.len())
            .filter(|&x| {
                Some(x) != prev_dec.id_index
                    && prev.fields[x].is_named()
                    && !known.contains(&prev.fields[x].name)
            })
            .collect();
        let ys: Vec<usize> = (0..cur.fields.len())
            .filter(|&y| Some(y) != cur_dec.id_index && !cur.fields[y].is_named())
            .collect();

        let tasks: Vec<(usize, usize)> = xs
            .iter()
            .flat_map(|&x| ys.iter().map(move |&y| (x, y)))
            .collect();

        // Phase A: read-only parallel scoring of every candidate pairing.
        let prev_fields = &prev.fields;
        let scores: Vec<Score> = tasks
            .par_iter()
            .filter_map(|&(x, y)| {
                score_pair(prev_fields, &prev_raw, &prev_dec, &cur_raw, &cur_dec, &ids, x, y)
            })
            .collect();

        // Phase B: deterministic tie-break, then sequential writes. The
        // highest fraction wins a column; ties go to the lowest prev index.
        let mut best: std::collections::BTreeMap<usize, Score> = std::collections::BTreeMap::new();
        for score in scores {
            match best.get(&score.y) {
                Some(winner)
                    if winner.fraction > score.fraction
                        || (winner.fraction == score.fraction && winner.x < score.x) => {}
                _ => {
                    best.insert(score.y, score);
                }
            }
        }

        stats.fields_named += best.len();
        for (y, score) in best {
            let mut field = prev.fields[score.x].clone();
            if field.ty == FieldType::LangStringRef
                && cur.builds.iter().any(|&build| build >= INLINE_STRING_BUILD)
            {
                // The multi-slot locale layout died at this build; carry
                // the name over but modernize the type.
                field.ty = FieldType::String;
            }
            cur.fields[y] = field;
        }

        // Identical layouts are the same true schema: absorb cur.
        if prev.layout_matches(cur) {
            let moved = std::mem::take(&mut cur.builds);
            prev.builds.extend(moved);
            stats.merges += 1;
            return true;
        }

        // A name matching more than one column is evidence of nothing;
        // revert every column sharing it rather than keep a guess.
        let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
        for field in cur.fields.iter().filter(|field| field.is_named()) {
            *counts.entry(field.name.as_str()).or_default() += 1;
        }
        let duplicates: FxHashSet<String> = counts
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(name, _)| name.to_string())
            .collect();
        if !duplicates.is_empty() {
            for field in cur.fields.iter_mut() {
                if duplicates.contains(field.name.as_str()) {
                    field.name.clear();
                    stats.ambiguous_reverts += 1;
                }
            }
        }

        false
    }

    fn open_decoded(
        &self,
        build: i32,
        entry: &mut SchemaEntry,
    ) -> Option<(RawTable, DecodedRecords)> {
        let path = self.dirs.raw_path(build, &entry.name)?;
        let raw = RawTable::open(path).ok()?;
        let decoded = raw.decode(entry).ok()?;
        Some((raw, decoded))
    }
}

/// Score one (prev column x, cur column y) pairing over the shared rows.
#[allow(clippy::too_many_arguments)]
fn score_pair(
    prev_fields: &[SchemaField],
    prev_raw: &RawTable,
    prev_dec: &DecodedRecords,
    cur_raw: &RawTable,
    cur_dec: &DecodedRecords,
    ids: &[u32],
    x: usize,
    y: usize,
) -> Option<Score> {
    if ids.is_empty() {
        return None;
    }

    let px = prev_dec.value_index(x);
    let cy = cur_dec.value_index(y);

    let zeros = ids
        .iter()
        .filter(|&&id| cur_dec.records[&id][cy] == 0.0)
        .count();
    if zeros as f64 / ids.len() as f64 > ZERO_REJECT_THRESHOLD {
        return None;
    }

    let is_string = prev_fields[x].ty.is_string();
    let matching = ids
        .iter()
        .filter(|&&id| {
            let prev_value = prev_dec.records[&id][px];
            let cur_value = cur_dec.records[&id][cy];
            if is_string {
                prev_raw.resolve_string(prev_value as i32) == cur_raw.resolve_string(cur_value as i32)
            } else {
                prev_value == cur_value
            }
        })
        .count();

    let threshold = if is_string {
        STRING_MATCH_THRESHOLD
    } else {
        MATCH_THRESHOLD
    };
    let fraction = matching as f64 / ids.len() as f64;

    (matching > 0 && fraction >= threshold).then_some(Score { x, y, fraction })
}

/// The (build, build) pair with the smallest absolute distance, used to
/// pick representative raw files. The first minimal pair wins.
pub(crate) fn closest_builds(a: &[i32], b: &[i32]) -> Option<(i32, i32)> {
    let mut best: Option<(i32, i32, i64)> = None;
    for &x in a {
        for &y in b {
            let distance = (i64::from(x) - i64::from(y)).abs();
            if best.map_or(true, |(_, _, shortest)| distance < shortest) {
                best = Some((x, y, distance));
            }
        }
    }
    best.map(|(x, y, _)| (x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_builds() {
        assert_eq!(closest_builds(&[100, 200], &[260, 210]), Some((200, 210)));
        assert_eq!(closest_builds(&[5], &[5]), Some((5, 5)));
        // First minimal pair wins on ties.
        assert_eq!(closest_builds(&[10, 30], &[20]), Some((10, 20)));
        assert_eq!(closest_builds(&[], &[1]), None);
        assert_eq!(closest_builds(&[1], &[]), None);
    }

    #[test]
    fn test_excluded_tables() {
        assert!(is_excluded("GROUPFINDERCATEGORY.DB2"));
        assert!(is_excluded("GarrPlotUICategory.db2"));
        assert!(!is_excluded("SPELL.DBC"));
    }
}
