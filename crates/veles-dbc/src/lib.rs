//! WDBC/WDB2 client database parsing, type inference and schema catalog.
//!
//! Legacy client builds ship their tables as fixed-width binary record
//! files whose column names and types were never published, and whose
//! layouts drifted across hundreds of builds. This crate provides the
//! pieces needed to reconstruct those layouts:
//!
//! - **Headers** ([`Header`]): both known variants, including the skip
//!   regions late extended files insert before their records
//! - **Inference** ([`scan`]): derive plausible column types for a file
//!   with no known schema, purely from byte content
//! - **Catalog** ([`Catalog`]): authoritative layouts from declarative XML
//!   definitions, when one exists for a (build, table) pair
//! - **Decoding** ([`RawTable`]): raw rows to uniform numeric value arrays
//!   once a layout is known
//! - **Store** ([`store`]): the persisted per-table schema collections
//!
//! # Quick Start
//!
//! ```no_run
//! use veles_dbc::{scan, Catalog, ScanStats};
//!
//! let data = std::fs::read("Spell.dbc")?;
//! let catalog = Catalog::default();
//! let mut stats = ScanStats::default();
//!
//! let outcome = scan(&data, 5875, "Spell.dbc", &catalog, &mut stats)?;
//! for field in &outcome.entry.fields {
//!     println!("{}", field.ty);
//! }
//! # Ok::<(), veles_dbc::Error>(())
//! ```

mod catalog;
mod error;
mod float;
mod header;
mod infer;
mod locate;
mod raw;
mod schema;
mod strings;

pub mod store;

pub use catalog::{Catalog, CatalogTable};
pub use error::{Error, Result};
pub use float::plausible_float;
pub use header::{BaseHeader, Db2Header, Header, Signature};
pub use infer::{
    scan, table_key, ScanOutcome, ScanStats, ScanWarning, FLOAT_FRACTION_THRESHOLD,
};
pub use locate::BuildDirs;
pub use raw::{DecodedRecords, RawTable, MISSING_STRING};
pub use schema::{FieldType, SchemaEntry, SchemaField, INLINE_STRING_BUILD};
pub use strings::StringTable;

pub(crate) type FxHashMap<K, V> =
    hashbrown::HashMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
pub(crate) type FxHashSet<T> =
    hashbrown::HashSet<T, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
