//! Common utilities for Veles.
//!
//! This crate provides the foundational pieces shared by all Veles crates:
//!
//! - [`BinaryReader`] - little-endian reading from byte slices
//! - [`Error`] / [`Result`] - the low-level reading error type

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
