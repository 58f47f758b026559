//! WDBC/WDB2 header structures.
//!
//! Both header variants share the same four record counts; WDB2 appends a
//! second block of fields and, on late builds, two post-header arrays that
//! sit between the header and the record data.

use veles_common::{BinaryReader, FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// First signature byte of both variants, used to detect byte-swapped files.
const SIGNATURE_MARKER: u8 = b'W';

/// Earliest WDB2 build whose files carry the post-header index map and
/// string-length table.
const INDEXED_WDB2_BUILD: i32 = 12880;

/// Which of the two known header variants a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// Base variant, magic `WDBC`.
    Wdbc,
    /// Extended variant, magic `WDB2`.
    Wdb2,
}

impl Signature {
    /// The 4-byte magic for this variant.
    pub const fn magic(self) -> [u8; 4] {
        match self {
            Self::Wdbc => *b"WDBC",
            Self::Wdb2 => *b"WDB2",
        }
    }
}

/// Record counts shared by both header variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct BaseHeader {
    /// Number of fixed-width rows.
    pub record_count: u32,
    /// Number of columns per row.
    pub field_count: u32,
    /// Bytes per row.
    pub record_size: u32,
    /// Size of the trailing string block in bytes.
    pub string_block_size: u32,
}

/// Fields appended by the WDB2 variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Db2Header {
    /// Hash of the table name.
    pub table_hash: u32,
    /// Client build the file was generated by.
    pub build: i32,
    /// Generation timestamp.
    pub timestamp: i32,
    /// Lowest row id.
    pub min_id: i32,
    /// Highest row id.
    pub max_id: i32,
    /// Locale flags.
    pub locale: i32,
    /// Size of the copy table appended after the string block.
    pub copy_table_size: i32,
}

/// A parsed file header of either variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub signature: Signature,
    pub base: BaseHeader,
    /// Present only for the extended variant.
    pub db2: Option<Db2Header>,
}

impl Header {
    /// Parse a header, leaving the reader positioned at the first record.
    ///
    /// The signature is byte-reversed before matching when the file was
    /// written with swapped byte order. Files whose signature is neither
    /// known magic yield [`Error::InvalidFormat`].
    pub fn parse(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let bytes = reader
            .read_bytes(4)
            .map_err(|_| Error::InvalidFormat(reader.remaining_bytes().to_vec()))?;

        let mut magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic[0] != SIGNATURE_MARKER {
            magic.reverse();
        }

        let signature = match &magic {
            b"WDBC" => Signature::Wdbc,
            b"WDB2" => Signature::Wdb2,
            _ => return Err(Error::InvalidFormat(magic.to_vec())),
        };

        let base: BaseHeader = reader.read_struct()?;

        let db2 = match signature {
            Signature::Wdbc => None,
            Signature::Wdb2 => {
                let ext: Db2Header = reader.read_struct()?;
                if ext.max_id != 0 && ext.build > INDEXED_WDB2_BUILD {
                    // Index map (i32) and per-row string lengths (u16),
                    // one slot per id in the [min_id, max_id] range.
                    // Skipped, never parsed.
                    let slots = (ext.max_id - ext.min_id + 1) as usize;
                    reader.advance(slots * 4);
                    reader.advance(slots * 2);
                }
                Some(ext)
            }
        };

        Ok(Self { signature, base, db2 })
    }

    /// Reject headers that cannot describe any records.
    pub fn validate(&self) -> Result<()> {
        if self.base.record_count == 0 || self.base.record_size == 0 {
            return Err(Error::EmptyFile);
        }
        Ok(())
    }

    /// Serialize the signature and fixed header fields.
    ///
    /// The post-header arrays of late WDB2 files are not part of the header
    /// proper and are not reproduced.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(48);
        out.extend_from_slice(&self.signature.magic());
        out.extend_from_slice(self.base.as_bytes());
        if let Some(db2) = &self.db2 {
            out.extend_from_slice(db2.as_bytes());
        }
        out
    }

    pub fn record_count(&self) -> u32 {
        self.base.record_count
    }

    pub fn field_count(&self) -> u32 {
        self.base.field_count
    }

    pub fn record_size(&self) -> u32 {
        self.base.record_size
    }

    /// Whether every column can be assumed to span exactly 4 bytes.
    pub fn has_aligned_columns(&self) -> bool {
        self.base.field_count != 0 && self.base.record_size / self.base.field_count == 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wdbc_header(records: u32, fields: u32) -> Header {
        Header {
            signature: Signature::Wdbc,
            base: BaseHeader {
                record_count: records,
                field_count: fields,
                record_size: fields * 4,
                string_block_size: 1,
            },
            db2: None,
        }
    }

    #[test]
    fn test_wdbc_round_trip() {
        let header = wdbc_header(3, 5);
        let bytes = header.encode();
        assert_eq!(bytes.len(), 20);

        let mut reader = BinaryReader::new(&bytes);
        let parsed = Header::parse(&mut reader).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.encode(), bytes);
    }

    #[test]
    fn test_wdb2_round_trip() {
        let header = Header {
            signature: Signature::Wdb2,
            base: BaseHeader {
                record_count: 2,
                field_count: 4,
                record_size: 16,
                string_block_size: 32,
            },
            db2: Some(Db2Header {
                table_hash: 0xDEAD_BEEF,
                build: 12065,
                timestamp: 0,
                min_id: 0,
                max_id: 0,
                locale: -1,
                copy_table_size: 0,
            }),
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), 48);

        let mut reader = BinaryReader::new(&bytes);
        let parsed = Header::parse(&mut reader).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.encode(), bytes);
    }

    #[test]
    fn test_byte_swapped_signature() {
        let mut bytes = wdbc_header(1, 1).encode();
        bytes[..4].reverse();

        let mut reader = BinaryReader::new(&bytes);
        let parsed = Header::parse(&mut reader).unwrap();
        assert_eq!(parsed.signature, Signature::Wdbc);
    }

    #[test]
    fn test_unknown_signature_rejected() {
        let data = *b"MPQ\x1athis is not a database";
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(
            Header::parse(&mut reader),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_header_rejected() {
        let data = b"WD";
        let mut reader = BinaryReader::new(data);
        assert!(matches!(
            Header::parse(&mut reader),
            Err(Error::InvalidFormat(_))
        ));

        // Magic alone is not enough either.
        let data = b"WDBC\x01\x00";
        let mut reader = BinaryReader::new(data);
        assert!(Header::parse(&mut reader).is_err());
    }

    #[test]
    fn test_empty_file_rejected() {
        let header = wdbc_header(0, 5);
        assert!(matches!(header.validate(), Err(Error::EmptyFile)));

        let mut header = wdbc_header(3, 5);
        header.base.record_size = 0;
        assert!(matches!(header.validate(), Err(Error::EmptyFile)));

        assert!(wdbc_header(3, 5).validate().is_ok());
    }

    #[test]
    fn test_indexed_wdb2_skip_arrays() {
        let header = Header {
            signature: Signature::Wdb2,
            base: BaseHeader {
                record_count: 1,
                field_count: 1,
                record_size: 4,
                string_block_size: 1,
            },
            db2: Some(Db2Header {
                table_hash: 1,
                build: 15050,
                timestamp: 0,
                min_id: 10,
                max_id: 13,
                locale: 0,
                copy_table_size: 0,
            }),
        };

        // 4 id slots: 16 bytes of index map, 8 bytes of string lengths.
        let mut bytes = header.encode();
        bytes.extend_from_slice(&[0u8; 24]);
        bytes.extend_from_slice(&0xAABBCCDDu32.to_le_bytes()); // first record

        let mut reader = BinaryReader::new(&bytes);
        let parsed = Header::parse(&mut reader).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(reader.read_u32().unwrap(), 0xAABBCCDD);
    }
}
