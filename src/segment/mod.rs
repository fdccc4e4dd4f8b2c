//! Segment file management.
//!
//! A segment is an append-only file of record frames named
//! `segment-<timestamp>`, where the timestamp is a nanosecond clock value.
//! Numeric order of the timestamps is the chronological order of writes.
//! Files whose names do not match the pattern are ignored by directory
//! enumeration; the compactor's scratch file `segment-tmp` relies on this.

pub mod reader;
pub mod writer;

pub use reader::SegmentReader;
pub use writer::SegmentWriter;

use crate::error::{Error, Result};
use crate::record::Record;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Filename prefix shared by all segment files
pub const SEGMENT_PREFIX: &str = "segment-";

/// Name of the temporary file compaction writes into before renaming
pub const TMP_SEGMENT_NAME: &str = "segment-tmp";

/// A sealed or active segment file, identified by its path.
///
/// Cloning a `Segment` is cheap; equality and hashing follow the path,
/// which is how the index refers back to the file holding a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    path: PathBuf,
}

/// Location of a record: the segment holding it and the byte offset of
/// its first frame byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPosition {
    /// The segment file the record lives in
    pub segment: Segment,
    /// Byte offset of the record's frame within the segment
    pub offset: u64,
}

impl Segment {
    /// Create a segment handle for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the segment file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the segment sequentially and build its key -> offset fragment.
    ///
    /// If a key appears multiple times the later offset wins. A frame cut
    /// short by EOF fails the scan with a corruption error.
    pub fn scan(&self) -> Result<HashMap<String, u64>> {
        let mut reader = SegmentReader::open(&self.path)?;
        let mut fragment = HashMap::new();

        loop {
            let offset = reader.position();
            match reader.read_next() {
                Ok(Some(record)) => {
                    fragment.insert(record.key().to_string(), offset);
                }
                Ok(None) => break,
                Err(Error::Corruption(msg)) => {
                    return Err(Error::Corruption(format!(
                        "corrupted segment file {}: {}",
                        self.path.display(),
                        msg
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(fragment)
    }

    /// Read the single record starting at `offset`.
    ///
    /// Each call opens a fresh handle, so concurrent readers never share
    /// file positions.
    pub fn read_at(&self, offset: u64) -> Result<Record> {
        let mut reader = SegmentReader::open(&self.path)?;
        reader.seek(offset)?;

        match reader.read_next()? {
            Some(record) => Ok(record),
            None => Err(Error::Corruption(format!(
                "no record at offset {} in {}",
                offset,
                self.path.display()
            ))),
        }
    }

    /// On-disk size of the segment file
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }
}

/// Generate a segment filename for a given timestamp
pub fn segment_filename(timestamp: i64) -> String {
    format!("{}{}", SEGMENT_PREFIX, timestamp)
}

/// Parse a segment filename to extract its timestamp.
///
/// Returns `None` for names outside the `segment-<digits>` grammar, which
/// makes enumeration skip foreign files and `segment-tmp`.
pub fn parse_segment_filename(filename: &str) -> Option<i64> {
    let digits = filename.strip_prefix(SEGMENT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
