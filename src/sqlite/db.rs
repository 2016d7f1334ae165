//! Database file handle.
//!
//! `SqliteDatabase` owns the read-only file handle for one invocation,
//! parses the 100-byte file header on open, and hands out whole pages
//! to the B-tree walkers. Pages are read into owned buffers and dropped
//! by the caller; nothing is cached.

use crate::sqlite::btree::BtreePage;
use crate::sqlite::core::header::DatabaseHeader;
use crate::sqlite::core::schema::{Schema, TableSchema};
use crate::sqlite::error::{Result, SqliteError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// A SQLite database opened for reading.
pub struct SqliteDatabase {
    file: File,
    header: DatabaseHeader,
}

/// Summary metadata for the `.dbinfo` command.
#[derive(Debug)]
pub struct DatabaseInfo {
    page_size: u32,
    num_tables: usize,
}

impl DatabaseInfo {
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn num_tables(&self) -> usize {
        self.num_tables
    }
}

impl SqliteDatabase {
    /// Opens a database file and parses its header.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut header_bytes = [0u8; DatabaseHeader::SIZE];
        file.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                SqliteError::Corrupt("file shorter than the 100-byte header".into())
            } else {
                SqliteError::Io(e)
            }
        })?;
        let header = DatabaseHeader::parse(&header_bytes)?;
        debug!(path = %path.display(), "opened database");
        Ok(Self { file, header })
    }

    /// Reads and parses page `number` (1-based).
    pub fn page(&mut self, number: u32) -> Result<BtreePage> {
        if number == 0 {
            return Err(SqliteError::Corrupt("page numbers start at 1".into()));
        }

        let page_size = self.header.page_size() as usize;
        let offset = (number as u64 - 1) * page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; page_size];
        let mut got = 0;
        while got < buf.len() {
            let n = self.file.read(&mut buf[got..])?;
            if n == 0 {
                return Err(SqliteError::ShortRead {
                    page: number,
                    want: page_size,
                    got,
                });
            }
            got += n;
        }

        BtreePage::parse(number, buf)
    }

    /// Loads all table and index descriptors from sqlite_schema.
    ///
    /// Page 1 goes through the generic table scan, so a schema big
    /// enough to need an interior root page still loads.
    pub fn schema(&mut self) -> Result<Schema> {
        let descriptor = TableSchema::sqlite_schema();
        let rows = self.table_scan(&descriptor)?;
        let values: Vec<_> = rows.into_iter().map(|row| row.values).collect();
        Schema::from_rows(&values)
    }

    /// Header summary plus the user table count, for `.dbinfo`.
    pub fn info(&mut self) -> Result<DatabaseInfo> {
        let num_tables = self.schema()?.user_tables().count();
        Ok(DatabaseInfo {
            page_size: self.header.page_size(),
            num_tables,
        })
    }

    /// Sorted user table names, for `.tables`.
    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        let schema = self.schema()?;
        let mut names: Vec<String> = schema.user_tables().map(|t| t.name.clone()).collect();
        names.sort();
        Ok(names)
    }
}
