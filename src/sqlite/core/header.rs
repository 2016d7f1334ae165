//! The database file header.
//!
//! The first 100 bytes of page 1 describe the whole file. The reader
//! cares about three fields:
//!
//! - Bytes 0-15: magic string "SQLite format 3\0"
//! - Bytes 16-17: page size in bytes (big-endian; the value 1 means 65536)
//! - Bytes 28-31: size of the database file in pages
//! - Bytes 56-59: text encoding (1: UTF-8, 2: UTF-16le, 3: UTF-16be)
//!
//! Only UTF-8 databases are accepted.

use crate::sqlite::error::{Result, SqliteError};
use tracing::debug;

/// Parsed database file header.
#[derive(Debug, Clone)]
pub struct DatabaseHeader {
    /// Page size in bytes, with the on-disk value 1 folded to 65536.
    page_size: u32,
    /// Size of the database file in pages (bytes 28-31).
    pub page_count: u32,
    /// Text encoding word (bytes 56-59).
    pub text_encoding: u32,
}

impl DatabaseHeader {
    /// Size of the file header in bytes.
    pub const SIZE: usize = 100;

    /// Magic string at the start of every SQLite 3 file.
    const MAGIC: &'static [u8] = b"SQLite format 3\0";

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(SqliteError::Corrupt(format!(
                "file header needs {} bytes, have {}",
                Self::SIZE,
                bytes.len()
            )));
        }

        if &bytes[0..16] != Self::MAGIC {
            return Err(SqliteError::Corrupt("bad magic string".into()));
        }

        let raw_page_size = u16::from_be_bytes([bytes[16], bytes[17]]);
        let page_size = match raw_page_size {
            1 => 65536,
            n if n.is_power_of_two() && n >= 512 => n as u32,
            n => {
                return Err(SqliteError::Corrupt(format!("invalid page size: {n}")));
            }
        };

        let header = Self {
            page_size,
            page_count: u32::from_be_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
            text_encoding: u32::from_be_bytes([bytes[56], bytes[57], bytes[58], bytes[59]]),
        };
        debug!(
            page_size = header.page_size,
            page_count = header.page_count,
            "parsed file header"
        );

        if !header.is_utf8() {
            return Err(SqliteError::Corrupt(format!(
                "unsupported text encoding: {}",
                header.text_encoding
            )));
        }

        Ok(header)
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// True if the database stores text as UTF-8.
    pub fn is_utf8(&self) -> bool {
        // A zero encoding word appears in freshly created empty files.
        self.text_encoding == 1 || self.text_encoding == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(page_size: u16, encoding: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; DatabaseHeader::SIZE];
        bytes[0..16].copy_from_slice(b"SQLite format 3\0");
        bytes[16..18].copy_from_slice(&page_size.to_be_bytes());
        bytes[28..32].copy_from_slice(&2u32.to_be_bytes());
        bytes[56..60].copy_from_slice(&encoding.to_be_bytes());
        bytes
    }

    #[test]
    fn parses_page_size_and_page_count() -> Result<()> {
        let header = DatabaseHeader::parse(&header_bytes(4096, 1))?;
        assert_eq!(header.page_size(), 4096);
        assert_eq!(header.page_count, 2);
        Ok(())
    }

    #[test]
    fn page_size_one_means_65536() -> Result<()> {
        let header = DatabaseHeader::parse(&header_bytes(1, 1))?;
        assert_eq!(header.page_size(), 65536);
        Ok(())
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = header_bytes(4096, 1);
        bytes[0] = b'X';
        assert!(DatabaseHeader::parse(&bytes).is_err());
    }

    #[test]
    fn rejects_non_power_of_two_page_size() {
        assert!(DatabaseHeader::parse(&header_bytes(1000, 1)).is_err());
    }

    #[test]
    fn rejects_utf16_databases() {
        assert!(DatabaseHeader::parse(&header_bytes(4096, 2)).is_err());
    }
}
