//! Record (row payload) decoding.
//!
//! A record is the payload of a table or index cell:
//!
//! - a varint `header_size`, counting itself
//! - one serial-type varint per column, up to `header_size` bytes
//! - the column bodies, in order
//!
//! Rows written before a later `ALTER TABLE ADD COLUMN` carry fewer
//! columns than the schema declares; the missing trailing columns read
//! as NULL.

use crate::sqlite::core::value::{SerialType, Value};
use crate::sqlite::core::varint::read_varint;
use crate::sqlite::error::{Result, SqliteError};
use tracing::trace;

/// One decoded record: the column values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    /// Decodes every column the record actually stores.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (header_size, size_len) = read_varint(payload)?;
        let header_size = header_size as usize;
        if header_size < size_len || header_size > payload.len() {
            return Err(SqliteError::Corrupt(format!(
                "record header size {header_size} out of bounds for payload of {}",
                payload.len()
            )));
        }

        // Serial types occupy the rest of the header after its own varint.
        let mut serial_types = Vec::new();
        let mut cursor = size_len;
        while cursor < header_size {
            let (code, len) = read_varint(&payload[cursor..header_size])?;
            serial_types.push(SerialType::from_code(code)?);
            cursor += len;
        }
        trace!(?serial_types, "record header");

        let mut values = Vec::with_capacity(serial_types.len());
        let mut body = &payload[header_size..];
        for st in serial_types {
            let value = Value::read(st, body)?;
            body = &body[st.size()..];
            values.push(value);
        }

        Ok(Self { values })
    }

    /// Decodes a record against a table of `column_count` columns,
    /// padding a short record with trailing NULLs.
    pub fn parse_with_columns(payload: &[u8], column_count: usize) -> Result<Self> {
        let mut record = Self::parse(payload)?;
        while record.values.len() < column_count {
            record.values.push(Value::Null);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::core::varint::encode_varint;

    /// Assembles a record payload from serial-type codes and body bytes.
    fn build(serial_codes: &[u64], body: &[u8]) -> Vec<u8> {
        let types: Vec<u8> = serial_codes
            .iter()
            .flat_map(|&c| encode_varint(c))
            .collect();
        let header_size = encode_varint((types.len() + 1) as u64);
        assert_eq!(header_size.len(), 1, "test headers stay below 128 bytes");
        let mut payload = header_size;
        payload.extend_from_slice(&types);
        payload.extend_from_slice(body);
        payload
    }

    #[test]
    fn mixed_text_and_integer_columns() -> Result<()> {
        // ("abc", 7, NULL)
        let payload = build(&[19, 1, 0], &[b'a', b'b', b'c', 7]);
        let record = Record::parse(&payload)?;
        assert_eq!(
            record.values,
            vec![Value::Text("abc".into()), Value::Int(7), Value::Null]
        );
        Ok(())
    }

    #[test]
    fn short_record_pads_with_trailing_nulls() -> Result<()> {
        let payload = build(&[1], &[42]);
        let record = Record::parse_with_columns(&payload, 3)?;
        assert_eq!(
            record.values,
            vec![Value::Int(42), Value::Null, Value::Null]
        );
        Ok(())
    }

    #[test]
    fn reserved_serial_type_in_header_is_rejected() {
        let payload = build(&[10], &[]);
        assert!(matches!(
            Record::parse(&payload),
            Err(SqliteError::InvalidSerialType(10))
        ));
    }

    #[test]
    fn header_size_beyond_payload_is_rejected() {
        // Claims a 100-byte header in a 2-byte payload.
        assert!(matches!(
            Record::parse(&[100, 0]),
            Err(SqliteError::Corrupt(_))
        ));
    }

    #[test]
    fn empty_record_has_no_columns() -> Result<()> {
        // Header of size 1: just the header-size varint, no serial types.
        let record = Record::parse(&[1])?;
        assert!(record.values.is_empty());
        Ok(())
    }
}
