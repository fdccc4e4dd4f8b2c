//! Compaction job that rewrites sealed segments into one.
//!
//! The job operates purely on a snapshot of the engine state captured by
//! the caller: the list of sealed segments and the index as they were at
//! dispatch time. Records whose snapshot index entry still points into one
//! of the snapshotted segments are live and get rewritten; everything else
//! is stale history (or was overwritten in the active segment, which the
//! post-swap index rebuild takes care of).
//!
//! ## Process
//!
//! 1. Scan each snapshotted segment oldest-first
//! 2. Append every live record to the scratch file `segment-tmp`
//! 3. Rename the scratch file to its reserved `segment-<timestamp>` name
//!
//! The reserved timestamp was taken before the rotation that dispatched
//! the job, so the replacement sorts older than every segment sealed
//! afterwards and the rebuilt index stays last-write-wins.

use crate::error::{Error, Result};
use crate::segment::{segment_filename, RecordPosition, Segment, TMP_SEGMENT_NAME};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

/// Compaction job that rewrites a snapshot of sealed segments
pub struct CompactionJob {
    /// Snapshotted sealed segments, oldest first
    inputs: Vec<Segment>,
    /// Snapshotted index used to decide which records are live
    index: HashMap<String, RecordPosition>,
    /// Data directory the scratch and replacement files live in
    dir: PathBuf,
    /// Timestamp reserved for the replacement segment's name
    target_timestamp: i64,
}

impl CompactionJob {
    /// Create a new compaction job over a state snapshot
    pub fn new(
        inputs: Vec<Segment>,
        index: HashMap<String, RecordPosition>,
        dir: PathBuf,
        target_timestamp: i64,
    ) -> Self {
        Self { inputs, index, dir, target_timestamp }
    }

    /// Execute the compaction rewrite.
    ///
    /// Returns the published replacement segment, or `None` when no live
    /// record survived (the scratch file is abandoned instead of renaming
    /// an empty segment into place). Any I/O error removes the scratch
    /// file and leaves the directory as it was.
    pub fn run(&self) -> Result<Option<Segment>> {
        log::info!(
            "starting compaction: {} input segments -> segment-{}",
            self.inputs.len(),
            self.target_timestamp
        );

        let tmp_path = self.dir.join(TMP_SEGMENT_NAME);
        let entry_count = match self.rewrite(&tmp_path) {
            Ok(count) => count,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        if entry_count == 0 {
            let _ = fs::remove_file(&tmp_path);
            log::info!("compaction found no live records, skipping replacement");
            return Ok(None);
        }

        let target_path = self.dir.join(segment_filename(self.target_timestamp));
        if let Err(e) = fs::rename(&tmp_path, &target_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Io(e));
        }

        log::info!("compaction wrote {} live records to {}", entry_count, target_path.display());

        Ok(Some(Segment::new(target_path)))
    }

    /// Copy every live record from the inputs into the scratch file,
    /// returning how many were written.
    fn rewrite(&self, tmp_path: &std::path::Path) -> Result<usize> {
        let mut out = File::create(tmp_path).map_err(Error::Io)?;
        let mut entry_count = 0;

        for segment in &self.inputs {
            let fragment = segment.scan()?;

            for (key, offset) in fragment {
                let live = self
                    .index
                    .get(&key)
                    .map_or(false, |pos| pos.segment == *segment && pos.offset == offset);
                if !live {
                    continue;
                }

                let record = segment.read_at(offset)?;
                out.write_all(&record.encode()).map_err(Error::Io)?;
                entry_count += 1;
            }
        }

        out.sync_all().map_err(Error::Io)?;
        Ok(entry_count)
    }
}
