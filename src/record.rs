//! Record frame format implementation.
//!
//! Each record is encoded as a self-delimiting frame:
//! - Record length (4 bytes): total frame length including the header
//! - Data type (1 byte): String or Int64
//! - Key length (4 bytes): length of the key bytes
//! - Value length (4 bytes): length of the value bytes
//! - Key (variable): UTF-8 key, not null-terminated
//! - Value (variable): string bytes, or an 8-byte signed integer
//!
//! All integers are little-endian.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::io::BufRead;

/// Size of the record length field
pub const RECORD_LEN_SIZE: usize = 4;

/// Size of the frame header (record length + data type + key length + value length)
pub const HEADER_SIZE: usize = 13;

/// Width of an encoded Int64 value
pub const INT64_VALUE_SIZE: usize = 8;

/// Data types a record value can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    /// UTF-8 string value
    String = 1,
    /// Signed 64-bit integer value
    Int64 = 2,
}

impl DataType {
    /// Convert from u8 to DataType
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(DataType::String),
            2 => Ok(DataType::Int64),
            _ => Err(Error::Corruption(format!("Invalid data type: {}", value))),
        }
    }
}

/// A typed record value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// UTF-8 string value
    String(String),
    /// Signed 64-bit integer value
    Int64(i64),
}

impl Value {
    /// The data type tag written to the frame header for this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Int64(_) => DataType::Int64,
        }
    }
}

/// A single key-value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: String,
    value: Value,
}

impl Record {
    /// Create a new record
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }

    /// Create a record holding a string value
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::String(value.into()))
    }

    /// Create a record holding an Int64 value
    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Value::Int64(value))
    }

    /// The record key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The record value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the record, returning its value
    pub fn into_value(self) -> Value {
        self.value
    }

    /// The data type of the record value
    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    /// Encode the record into a frame
    ///
    /// Format: [record_len: u32][data_type: u8][key_len: u32][val_len: u32][key][value]
    pub fn encode(&self) -> Vec<u8> {
        let key = self.key.as_bytes();
        let value = match &self.value {
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Int64(v) => v.to_le_bytes().to_vec(),
        };

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + key.len() + value.len());
        buf.put_u32_le((HEADER_SIZE + key.len() + value.len()) as u32);
        buf.put_u8(self.value.data_type() as u8);
        buf.put_u32_le(key.len() as u32);
        buf.put_u32_le(value.len() as u32);
        buf.put_slice(key);
        buf.put_slice(&value);

        buf.to_vec()
    }

    /// The size of the encoded frame
    pub fn encoded_len(&self) -> usize {
        let val_len = match &self.value {
            Value::String(s) => s.len(),
            Value::Int64(_) => INT64_VALUE_SIZE,
        };
        HEADER_SIZE + self.key.len() + val_len
    }

    /// Decode a record from a complete frame
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption(format!("Frame too short: {} bytes", data.len())));
        }

        let mut buf = data;
        let record_len = buf.get_u32_le() as usize;
        let data_type = DataType::from_u8(buf.get_u8())?;
        let key_len = buf.get_u32_le() as usize;
        let val_len = buf.get_u32_le() as usize;

        let expected_len = HEADER_SIZE + key_len + val_len;
        if record_len != expected_len {
            return Err(Error::Corruption(format!(
                "Frame length mismatch: header says {}, expected {}",
                record_len, expected_len
            )));
        }
        if buf.len() < key_len + val_len {
            return Err(Error::Corruption(format!(
                "Incomplete frame: expected {} bytes, got {}",
                expected_len,
                data.len()
            )));
        }

        let key = std::str::from_utf8(&buf[..key_len])
            .map_err(|e| Error::Corruption(format!("Invalid UTF-8 in key: {}", e)))?
            .to_string();
        buf.advance(key_len);

        let value = match data_type {
            DataType::String => {
                let s = std::str::from_utf8(&buf[..val_len])
                    .map_err(|e| Error::Corruption(format!("Invalid UTF-8 in value: {}", e)))?;
                Value::String(s.to_string())
            }
            DataType::Int64 => {
                if val_len != INT64_VALUE_SIZE {
                    return Err(Error::Corruption(format!(
                        "Invalid Int64 value length: expected {}, got {}",
                        INT64_VALUE_SIZE, val_len
                    )));
                }
                Value::Int64(buf.get_i64_le())
            }
        };

        Ok(Record { key, value })
    }

    /// Read exactly one frame from a buffered reader
    ///
    /// Returns the decoded record and the number of bytes consumed, or
    /// `None` at a clean frame boundary. EOF in the middle of a frame is
    /// reported as corruption.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Option<(Self, u64)>> {
        if reader.fill_buf().map_err(Error::Io)?.is_empty() {
            return Ok(None);
        }

        let mut len_buf = [0u8; RECORD_LEN_SIZE];
        reader.read_exact(&mut len_buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Error::corruption("truncated frame header")
            }
            _ => Error::Io(e),
        })?;

        let record_len = u32::from_le_bytes(len_buf) as usize;
        if record_len < HEADER_SIZE {
            return Err(Error::Corruption(format!(
                "Frame length {} smaller than header size {}",
                record_len, HEADER_SIZE
            )));
        }

        let mut frame = vec![0u8; record_len];
        frame[..RECORD_LEN_SIZE].copy_from_slice(&len_buf);
        reader.read_exact(&mut frame[RECORD_LEN_SIZE..]).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Error::corruption("truncated frame body")
            }
            _ => Error::Io(e),
        })?;

        let record = Self::decode(&frame)?;
        Ok(Some((record, record_len as u64)))
    }
}
