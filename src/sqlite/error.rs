use thiserror::Error;

/// Errors produced while decoding a database file or running a query.
///
/// Nothing is retried or recovered: every variant bubbles up to the
/// command dispatcher, which prints it and exits non-zero.
#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("file ended before page {page} (read {got} of {want} bytes)")]
    ShortRead { page: u32, want: usize, got: usize },

    #[error("invalid b-tree page type: {0:#04x}")]
    InvalidPageType(u8),

    #[error("varint truncated after {0} bytes")]
    TruncatedVarint(usize),

    #[error("invalid serial type: {0}")]
    InvalidSerialType(u64),

    #[error("invalid schema row type: '{0}'")]
    InvalidSchemaType(String),

    #[error("no such table: {0}")]
    UnknownTable(String),

    #[error("no such column: {0}")]
    UnknownColumn(String),

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("payload of {size} bytes does not fit on page (overflow pages are not supported)")]
    OversizedPayload { size: usize },

    #[error("corrupt database: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SqliteError>;
