//! Error types for client database parsing.

use thiserror::Error;

/// Errors that can occur when working with client database files.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] veles_common::Error),

    /// Unrecognized or truncated file signature.
    #[error("not a client database (signature {0:02X?})")]
    InvalidFormat(Vec<u8>),

    /// Header declares zero records or a zero record size.
    #[error("no records")]
    EmptyFile,

    /// Raw bytes do not fit the assumed field layout.
    #[error("record layout mismatch: {0}")]
    Decode(#[source] veles_common::Error),

    /// Catalog definition carries a type tag outside the known set.
    #[error("unrecognized field type tag: {0:?}")]
    UnknownTypeTag(String),

    /// XML parse error.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// XML write error.
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
}

/// Result type for client database operations.
pub type Result<T> = std::result::Result<T, Error>;
