//! The store engine.
//!
//! Owns the data directory, the ordered list of sealed segments, the
//! active segment, and the in-memory index mapping each key to the
//! position of its latest record. Writers append to the active segment;
//! when an append would overflow the size threshold the segment is sealed
//! and a fresh one opened, and once enough sealed segments pile up a
//! background compaction merges them into one.
//!
//! ## Locking
//!
//! A single readers/writer lock guards the segment list, the active
//! writer, and the index. Reads and size queries take a shared hold (kept
//! across the positioned file read, so a compaction swap can never delete
//! a segment underneath a reader); puts, rotation, and the compaction
//! swap take the exclusive hold. The compaction rewrite itself runs
//! without any engine lock, against snapshots.

use crate::compaction::CompactionJob;
use crate::config::Options;
use crate::error::{Error, Result};
use crate::record::{DataType, Record, Value};
use crate::segment::{parse_segment_filename, RecordPosition, Segment, SegmentWriter};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// The store handle.
///
/// `Db` is cheap to clone; clones share the same underlying store and may
/// be used concurrently from many threads. The background compactor holds
/// one such clone for the duration of its run.
///
/// # Example
///
/// ```rust,no_run
/// use segkv::Db;
///
/// # fn main() -> Result<(), segkv::Error> {
/// let db = Db::open("./data")?;
/// db.put("greeting", "hello")?;
/// assert_eq!(db.get("greeting")?, "hello");
/// db.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    dir: PathBuf,
    options: Options,
    state: RwLock<State>,
    /// True while a compaction is running. Claimed permanently by `close`
    /// so no new compaction can start on a closed store.
    compacting: Mutex<bool>,
    compacted: Condvar,
}

struct State {
    /// Sealed segments, oldest first
    segments: Vec<Segment>,
    /// The segment currently open for appends; `None` once closed
    active: Option<SegmentWriter>,
    /// Latest surviving position of every key
    index: HashMap<String, RecordPosition>,
}

impl Db {
    /// Opens the store in `dir` with default options, creating the
    /// directory if it does not exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(dir, Options::default())
    }

    /// Opens the store in `dir` with the given options.
    ///
    /// Existing `segment-<timestamp>` files are enumerated, sorted
    /// chronologically, and scanned oldest-first to rebuild the index;
    /// later writes overwrite earlier index entries. A fresh active
    /// segment is then created for this session. Any other file in the
    /// directory is ignored and never touched.
    ///
    /// # Errors
    ///
    /// Fails with `Corruption` if any segment holds a truncated or
    /// malformed frame, with `InvalidArgument` for unusable options, or
    /// with `Io` on filesystem errors.
    pub fn open_with_options(dir: impl AsRef<Path>, options: Options) -> Result<Self> {
        options.validate()?;

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(Error::Io)?;

        let segments = load_segments(&dir)?;
        let active = SegmentWriter::create(&dir, unix_timestamp_nanos())?;
        let mut state = State { segments, active: Some(active), index: HashMap::new() };
        rebuild_index(&mut state)?;

        Ok(Db {
            inner: Arc::new(DbInner {
                dir,
                options,
                state: RwLock::new(state),
                compacting: Mutex::new(false),
                compacted: Condvar::new(),
            }),
        })
    }

    /// Returns the string value stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is absent, `TypeMismatch` if the stored
    /// value is an Int64.
    pub fn get(&self, key: &str) -> Result<String> {
        match self.get_record(key)?.into_value() {
            Value::String(value) => Ok(value),
            value => Err(Error::TypeMismatch {
                expected: DataType::String,
                actual: value.data_type(),
            }),
        }
    }

    /// Returns the Int64 value stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the key is absent, `TypeMismatch` if the stored
    /// value is a string.
    pub fn get_int64(&self, key: &str) -> Result<i64> {
        match self.get_record(key)?.into_value() {
            Value::Int64(value) => Ok(value),
            value => Err(Error::TypeMismatch {
                expected: DataType::Int64,
                actual: value.data_type(),
            }),
        }
    }

    fn get_record(&self, key: &str) -> Result<Record> {
        let state = self.inner.state.read();

        let position = state.index.get(key).ok_or_else(|| Error::not_found(key))?;
        position.segment.read_at(position.offset)
    }

    /// Stores a string value under `key`, replacing any previous value.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_record(Record::string(key, value))
    }

    /// Stores an Int64 value under `key`, replacing any previous value.
    pub fn put_int64(&self, key: &str, value: i64) -> Result<()> {
        self.put_record(Record::int64(key, value))
    }

    fn put_record(&self, record: Record) -> Result<()> {
        let data = record.encode();
        let mut state = self.inner.state.write();

        let active_offset = match &state.active {
            Some(active) => active.offset(),
            None => return Err(Error::invalid_state("store is closed")),
        };

        if active_offset + data.len() as u64 > self.inner.options.max_segment_size {
            // Reserve the replacement name before rotating so it sorts
            // older than the segment the rotation creates.
            let target_timestamp = unix_timestamp_nanos();
            rotate(&self.inner.dir, &mut state)?;

            if state.segments.len() >= self.inner.options.compaction_threshold {
                let db = self.clone();
                thread::spawn(move || {
                    if let Err(e) = db.compact(target_timestamp) {
                        log::warn!("background compaction failed: {}", e);
                    }
                });
            }
        }

        let active = match state.active.as_mut() {
            Some(active) => active,
            None => return Err(Error::invalid_state("store is closed")),
        };

        let offset = active.append(&data)?;
        if self.inner.options.sync_writes {
            active.sync()?;
        }

        // The index entry becomes visible only after the durable write.
        let position = RecordPosition { segment: active.segment().clone(), offset };
        state.index.insert(record.key().to_string(), position);

        Ok(())
    }

    /// Total on-disk size of all sealed segments plus the active one.
    pub fn size(&self) -> Result<u64> {
        let state = self.inner.state.read();

        let mut total = 0;
        for segment in &state.segments {
            total += segment.size()?;
        }
        if let Some(active) = &state.active {
            total += active.segment().size()?;
        }

        Ok(total)
    }

    /// Closes the store.
    ///
    /// Blocks until any running compaction finishes, then closes the
    /// active segment. No further compaction can start afterwards;
    /// subsequent writes fail with `InvalidState`.
    pub fn close(&self) -> Result<()> {
        let mut compacting = self.inner.compacting.lock();
        loop {
            if !*compacting {
                *compacting = true;
                break;
            }
            if self.inner.state.read().active.is_none() {
                // Already closed; the flag stays claimed from that close.
                return Ok(());
            }
            self.inner.compacted.wait(&mut compacting);
        }
        drop(compacting);

        let result = {
            let mut state = self.inner.state.write();
            match state.active.take() {
                Some(active) => active.close(),
                None => Ok(()),
            }
        };

        // Wake any close() that raced in behind us and parked on the
        // condvar; it will observe the missing active writer and bail.
        // Passing through the mutex orders the wakeup against its
        // check-then-wait.
        drop(self.inner.compacting.lock());
        self.inner.compacted.notify_all();

        result
    }

    /// Merge the sealed segments visible at dispatch time into one
    /// replacement named for the reserved timestamp. At most one
    /// compaction runs at a time; a second dispatch returns immediately.
    fn compact(&self, target_timestamp: i64) -> Result<()> {
        if !self.try_begin_compaction() {
            return Ok(());
        }

        let result = self.run_compaction(target_timestamp);
        self.finish_compaction();
        result
    }

    fn try_begin_compaction(&self) -> bool {
        let mut compacting = self.inner.compacting.lock();
        if *compacting {
            false
        } else {
            *compacting = true;
            true
        }
    }

    fn finish_compaction(&self) {
        let mut compacting = self.inner.compacting.lock();
        *compacting = false;
        drop(compacting);
        self.inner.compacted.notify_all();
    }

    fn run_compaction(&self, target_timestamp: i64) -> Result<()> {
        let (segments_before, index_before) = self.snapshot();
        if segments_before.is_empty() {
            return Ok(());
        }

        // The rewrite runs without any engine lock, against the snapshot.
        let job = CompactionJob::new(
            segments_before.clone(),
            index_before,
            self.inner.dir.clone(),
            target_timestamp,
        );
        let replacement = job.run()?;

        let (segments_after, index_after) = self.snapshot();

        let mut state = self.inner.state.write();

        let mut segments = Vec::with_capacity(state.segments.len() + 1);
        if let Some(segment) = &replacement {
            segments.push(segment.clone());
        }
        segments.extend(state.segments.iter().filter(|s| !segments_before.contains(*s)).cloned());
        state.segments = segments;

        if let Err(e) = rebuild_index(&mut state) {
            state.segments = segments_after;
            state.index = index_after;
            if let Some(segment) = &replacement {
                let _ = fs::remove_file(segment.path());
            }
            log::error!("index rebuild after compaction failed, restoring previous state");
            return Err(e);
        }

        // The index no longer references the snapshotted segments, so
        // their files can go.
        for segment in &segments_before {
            if let Err(e) = fs::remove_file(segment.path()) {
                log::warn!(
                    "failed to remove compacted segment {}: {}",
                    segment.path().display(),
                    e
                );
            }
        }

        Ok(())
    }

    /// Copy of `(segments, index)` taken under a shared hold, for use by
    /// the compactor outside the lock.
    fn snapshot(&self) -> (Vec<Segment>, HashMap<String, RecordPosition>) {
        let state = self.inner.state.read();
        (state.segments.clone(), state.index.clone())
    }
}

/// Seal the active segment and open a fresh one.
///
/// The swap happens only after the new writer exists; if syncing the old
/// segment or creating the new one fails, the error surfaces and the
/// engine keeps appending to the current segment.
fn rotate(dir: &Path, state: &mut State) -> Result<()> {
    let active = match state.active.as_mut() {
        Some(active) => active,
        None => return Err(Error::invalid_state("store is closed")),
    };

    active.sync()?;
    let sealed = active.segment().clone();

    let next = SegmentWriter::create(dir, unix_timestamp_nanos())?;
    // Replacing the writer drops the old one, closing its handle.
    state.active = Some(next);
    state.segments.push(sealed);

    Ok(())
}

/// Enumerate `segment-<timestamp>` files in `dir`, sorted oldest first.
/// Names outside the grammar (including `segment-tmp`) are skipped.
fn load_segments(dir: &Path) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir).map_err(Error::Io)? {
        let entry = entry.map_err(Error::Io)?;
        let name = entry.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            None => continue,
        };
        if let Some(timestamp) = parse_segment_filename(name) {
            segments.push((timestamp, Segment::new(entry.path())));
        }
    }

    segments.sort_by_key(|(timestamp, _)| *timestamp);
    Ok(segments.into_iter().map(|(_, segment)| segment).collect())
}

/// Rebuild the index by scanning every sealed segment oldest-first and
/// then the active segment; later scans overwrite earlier entries.
fn rebuild_index(state: &mut State) -> Result<()> {
    let mut index = HashMap::new();

    for segment in &state.segments {
        merge_fragment(&mut index, segment)?;
    }
    if let Some(active) = &state.active {
        merge_fragment(&mut index, active.segment())?;
    }

    state.index = index;
    Ok(())
}

fn merge_fragment(index: &mut HashMap<String, RecordPosition>, segment: &Segment) -> Result<()> {
    for (key, offset) in segment.scan()? {
        index.insert(key, RecordPosition { segment: segment.clone(), offset });
    }
    Ok(())
}

fn unix_timestamp_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rotate_creates_new_active() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(dir.path()).unwrap();
        db.put("k", "v").unwrap();

        let before = {
            let state = db.inner.state.read();
            assert!(state.segments.is_empty());
            state.active.as_ref().unwrap().segment().clone()
        };

        {
            let mut state = db.inner.state.write();
            rotate(&db.inner.dir, &mut state).unwrap();
        }

        let state = db.inner.state.read();
        assert_eq!(state.segments.len(), 1);
        assert_eq!(state.segments[0], before);
        assert_ne!(state.active.as_ref().unwrap().segment(), &before);
    }

    #[test]
    fn test_compact_merges_sealed_segments() {
        let dir = TempDir::new().unwrap();
        let record_size = Record::string("k", "v").encoded_len() as u64;
        let options = Options::new().max_segment_size(record_size).compaction_threshold(3);
        let db = Db::open_with_options(dir.path(), options).unwrap();

        for _ in 0..3 {
            db.put("k", "v").unwrap();
        }

        // Seal the segment holding the live record, then compact the
        // sealed set into a reserved timestamp.
        let target_timestamp = unix_timestamp_nanos();
        {
            let mut state = db.inner.state.write();
            rotate(&db.inner.dir, &mut state).unwrap();
        }
        db.compact(target_timestamp).unwrap();

        {
            let state = db.inner.state.read();
            assert_eq!(state.segments.len(), 1);
        }
        assert_eq!(db.get("k").unwrap(), "v");
    }

    #[test]
    fn test_compact_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(dir.path()).unwrap();
        db.put("k", "v").unwrap();

        assert!(db.try_begin_compaction());
        // A second dispatch while the flag is held aborts silently.
        db.compact(unix_timestamp_nanos()).unwrap();
        assert_eq!(db.get("k").unwrap(), "v");
        db.finish_compaction();
    }

    #[test]
    fn test_failed_rotation_keeps_engine_usable() {
        let dir = TempDir::new().unwrap();
        let record_size = Record::string("k", "v").encoded_len() as u64;
        let options = Options::new().max_segment_size(record_size).compaction_threshold(100);
        let db = Db::open_with_options(dir.path(), options).unwrap();

        db.put("k", "v").unwrap();

        // Pull the directory out from under the next rotation; creating
        // the new active segment fails with an I/O error.
        fs::remove_dir_all(dir.path()).unwrap();
        assert!(matches!(db.put("k", "v"), Err(Error::Io(_))));

        // The active writer survived the failure, so once the directory
        // is back the engine rotates and keeps going.
        fs::create_dir_all(dir.path()).unwrap();
        db.put("k2", "v2").unwrap();
        assert_eq!(db.get("k2").unwrap(), "v2");
    }

    #[test]
    fn test_concurrent_close() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(dir.path()).unwrap();
        db.put("k", "v").unwrap();

        let other = db.clone();
        let handle = thread::spawn(move || other.close());

        db.close().unwrap();
        handle.join().unwrap().unwrap();

        assert!(matches!(db.put("k", "v2"), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_put_after_close() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(dir.path()).unwrap();
        db.put("k", "v").unwrap();
        db.close().unwrap();

        assert!(matches!(db.put("k", "v2"), Err(Error::InvalidState(_))));
        // Reads keep working against the files on disk.
        assert_eq!(db.get("k").unwrap(), "v");
        // A second close is a no-op.
        db.close().unwrap();
    }
}
