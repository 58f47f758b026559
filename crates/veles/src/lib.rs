//! Veles - schema reconstruction for legacy client database files.
//!
//! This crate provides a unified interface to the Veles library ecosystem
//! for rebuilding column-level schemas of WDBC/WDB2 record files.
//!
//! # Crates
//!
//! - [`veles_common`] - Common utilities (binary reading, shared errors)
//! - [`veles_dbc`] - File parsing, type inference, catalog, schema store
//! - [`veles_reconcile`] - Cross-build name propagation and entry merging
//!
//! # Example
//!
//! ```no_run
//! use veles::prelude::*;
//!
//! // Scan one file with no known schema
//! let data = std::fs::read("Spell.dbc")?;
//! let mut stats = ScanStats::default();
//! let outcome = scan(&data, 5875, "Spell.dbc", &Catalog::default(), &mut stats)?;
//!
//! println!("{} columns", outcome.entry.fields.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use veles_common as common;
pub use veles_dbc as dbc;
pub use veles_reconcile as reconcile;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_common::BinaryReader;
    pub use veles_dbc::{
        scan, store, table_key, BuildDirs, Catalog, FieldType, Header, RawTable, ScanOutcome,
        ScanStats, ScanWarning, SchemaEntry, SchemaField, Signature,
    };
    pub use veles_reconcile::{
        is_excluded, match_adjacent, match_grouped, propagate_id_column, row_level_match,
        CompletionReport, Reconciler, SweepStats,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
