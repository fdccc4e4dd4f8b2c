//! Append-only writer for the active segment.

use super::{segment_filename, Segment};
use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writer for the one segment currently open for appends.
///
/// The file is opened in append mode, so a pre-existing segment continues
/// at its current end. The writer tracks the offset at which the next
/// frame will land; that offset is what the index stores for a record.
pub struct SegmentWriter {
    segment: Segment,
    file: std::fs::File,
    offset: u64,
}

impl SegmentWriter {
    /// Create (or reopen) the segment named for `timestamp` inside `dir`
    pub fn create(dir: &Path, timestamp: i64) -> Result<Self> {
        Self::open(dir.join(segment_filename(timestamp)))
    }

    /// Open a segment file for appending, creating it if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        let offset = file.metadata().map_err(Error::Io)?.len();

        Ok(Self { segment: Segment::new(path), file, offset })
    }

    /// Append an encoded frame, returning the offset of its first byte
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        self.file.write_all(data).map_err(Error::Io)?;

        let offset = self.offset;
        self.offset += data.len() as u64;
        Ok(offset)
    }

    /// Sync appended data to persistent storage
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().map_err(Error::Io)
    }

    /// Offset at which the next frame will be appended
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The segment this writer appends to
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Close the writer, syncing all data
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }
}
