//! Cross-build schema reconciliation for client database entries.
//!
//! Scanning produces one [`veles_dbc::SchemaEntry`] per (file, build) with
//! types but mostly no names. This crate is the second stage: it correlates
//! decoded column values across adjacent builds to propagate names, merges
//! entries that turn out to be the same schema, and keeps score of how
//! complete each table is.
//!
//! Two independent passes exist:
//!
//! - [`Reconciler`]: the statistical pass, per-column value correlation
//!   over shared row ids with parallel scoring and a deterministic
//!   tie-break
//! - [`row_level_match`]: the byte-level pass, where one identical raw row
//!   is enough evidence to merge two entries

mod compare;
mod completion;
mod rowmatch;

pub use compare::{
    is_excluded, Reconciler, SweepStats, MATCH_THRESHOLD, STRING_MATCH_THRESHOLD,
    ZERO_REJECT_THRESHOLD,
};
pub use completion::CompletionReport;
pub use rowmatch::{match_adjacent, match_grouped, propagate_id_column, row_level_match};

pub(crate) type FxHashMap<K, V> =
    hashbrown::HashMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
pub(crate) type FxHashSet<T> =
    hashbrown::HashSet<T, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
