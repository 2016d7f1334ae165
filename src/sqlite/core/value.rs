//! Serial types and column values.
//!
//! Every column in a record is described by a serial type code:
//!
//! - 0: NULL
//! - 1-6: big-endian signed integers of 1, 2, 3, 4, 6 and 8 bytes
//! - 7: IEEE 754 64-bit float
//! - 8, 9: the constants 0 and 1
//! - 10, 11: reserved
//! - N >= 12, even: BLOB of (N-12)/2 bytes
//! - N >= 13, odd: UTF-8 text of (N-13)/2 bytes

use crate::sqlite::error::{Result, SqliteError};
use std::cmp::Ordering;
use std::fmt::Display;

/// Decoded serial type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    Null,
    Int8,
    Int16,
    Int24,
    Int32,
    Int48,
    Int64,
    Float64,
    Zero,
    One,
    Blob(usize),
    Text(usize),
}

impl SerialType {
    /// Maps a serial type code to its variant.
    ///
    /// Codes 10 and 11 are reserved by the file format and rejected.
    pub fn from_code(code: u64) -> Result<Self> {
        match code {
            0 => Ok(Self::Null),
            1 => Ok(Self::Int8),
            2 => Ok(Self::Int16),
            3 => Ok(Self::Int24),
            4 => Ok(Self::Int32),
            5 => Ok(Self::Int48),
            6 => Ok(Self::Int64),
            7 => Ok(Self::Float64),
            8 => Ok(Self::Zero),
            9 => Ok(Self::One),
            10 | 11 => Err(SqliteError::InvalidSerialType(code)),
            n if n % 2 == 0 => Ok(Self::Blob(((n - 12) / 2) as usize)),
            n => Ok(Self::Text(((n - 13) / 2) as usize)),
        }
    }

    /// Number of bytes the value occupies in the record body.
    pub fn size(&self) -> usize {
        match *self {
            Self::Null | Self::Zero | Self::One => 0,
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 => 4,
            Self::Int48 => 6,
            Self::Int64 | Self::Float64 => 8,
            Self::Blob(n) | Self::Text(n) => n,
        }
    }
}

/// A single column value as stored in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Blob(Vec<u8>),
    Text(String),
}

impl Value {
    /// Decodes the value described by `serial_type` from the front of `body`.
    pub fn read(serial_type: SerialType, body: &[u8]) -> Result<Self> {
        let size = serial_type.size();
        let bytes = body.get(..size).ok_or_else(|| {
            SqliteError::Corrupt(format!(
                "record body too short: need {size} bytes, have {}",
                body.len()
            ))
        })?;

        let value = match serial_type {
            SerialType::Null => Self::Null,
            SerialType::Zero => Self::Int(0),
            SerialType::One => Self::Int(1),
            SerialType::Int8
            | SerialType::Int16
            | SerialType::Int24
            | SerialType::Int32
            | SerialType::Int48
            | SerialType::Int64 => Self::Int(read_signed_be(bytes)),
            SerialType::Float64 => {
                let raw: [u8; 8] = bytes.try_into().expect("size checked above");
                Self::Float(f64::from_be_bytes(raw))
            }
            SerialType::Blob(_) => Self::Blob(bytes.to_vec()),
            SerialType::Text(_) => Self::Text(
                std::str::from_utf8(bytes)
                    .map_err(|e| SqliteError::Corrupt(format!("invalid UTF-8 in text value: {e}")))?
                    .to_owned(),
            ),
        };

        Ok(value)
    }

    /// Ordering used by the index walkers and the equality filter.
    ///
    /// NULL sorts before everything; integers and floats compare
    /// numerically; text compares as strings; blobs compare bytewise.
    /// A comparison across storage classes is never guessed at.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => Ok((*a as f64).total_cmp(b)),
            (Value::Float(a), Value::Int(b)) => Ok(a.total_cmp(&(*b as f64))),
            (Value::Float(a), Value::Float(b)) => Ok(a.total_cmp(b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.as_str().cmp(b.as_str())),
            (Value::Blob(a), Value::Blob(b)) => Ok(a.cmp(b)),
            (a, b) => Err(SqliteError::UnsupportedQuery(format!(
                "cannot compare {} with {}",
                a.kind(),
                b.kind()
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "REAL",
            Value::Blob(_) => "BLOB",
            Value::Text(_) => "TEXT",
        }
    }
}

/// Big-endian two's-complement integer of 1-8 bytes, sign-extended to i64.
fn read_signed_be(bytes: &[u8]) -> i64 {
    let mut v: i64 = 0;
    for &b in bytes {
        v = (v << 8) | b as i64;
    }
    let shift = (8 - bytes.len()) * 8;
    (v << shift) >> shift
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Blob(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}
