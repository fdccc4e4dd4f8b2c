//! Configuration options for the segkv storage engine.

/// Configuration options for opening a store.
#[derive(Debug, Clone)]
pub struct Options {
    /// Size threshold for sealing the active segment (in bytes).
    /// An append that would push the active segment past this size
    /// triggers a rotation first.
    /// Default: 10MB
    pub max_segment_size: u64,

    /// Number of sealed segments that triggers a background compaction.
    /// Default: 3
    pub compaction_threshold: usize,

    /// Sync every append to disk before it becomes visible in the index.
    /// Disabling reduces durability but increases performance.
    /// Default: true
    pub sync_writes: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_segment_size: 10 * 1024 * 1024, // 10MB
            compaction_threshold: 3,
            sync_writes: true,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the active segment size threshold.
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets the number of sealed segments that triggers compaction.
    pub fn compaction_threshold(mut self, count: usize) -> Self {
        self.compaction_threshold = count;
        self
    }

    /// Enables or disables syncing every append to disk.
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_segment_size == 0 {
            return Err(crate::Error::invalid_argument("max_segment_size must be > 0"));
        }
        if self.compaction_threshold == 0 {
            return Err(crate::Error::invalid_argument("compaction_threshold must be > 0"));
        }
        Ok(())
    }
}
