//! Sequential segment reader used for scans and positioned reads.

use crate::error::{Error, Result};
use crate::record::Record;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

/// Buffered reader over a segment file that tracks the byte position of
/// the next frame.
pub struct SegmentReader {
    reader: BufReader<File>,
    position: u64,
}

impl SegmentReader {
    /// Open a segment file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(Error::Io)?;
        Ok(Self { reader: BufReader::new(file), position: 0 })
    }

    /// Read the next record frame.
    ///
    /// Returns `None` at a clean frame boundary; a partial frame is
    /// reported as corruption.
    pub fn read_next(&mut self) -> Result<Option<Record>> {
        match Record::read_from(&mut self.reader)? {
            Some((record, consumed)) => {
                self.position += consumed;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Byte position of the next frame to be read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Seek to a frame boundary at `pos`
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(pos)).map_err(Error::Io)?;
        self.position = pos;
        Ok(())
    }
}
