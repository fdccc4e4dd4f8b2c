//! # segkv - A Segmented Append-Only Storage Engine
//!
//! segkv is a persistent key-value storage engine built on append-only
//! segment files with an in-memory index and background compaction.
//!
//! ## Architecture
//!
//! The storage engine consists of three layers:
//!
//! - **Record codec**: typed key-value pairs framed as self-delimiting
//!   byte sequences
//! - **Segment files**: append-only files of frames, named by the
//!   nanosecond timestamp of their creation
//! - **Store engine**: the active segment, the sealed segment list, the
//!   key index, and the compaction worker that merges sealed segments
//!
//! Writes append to the active segment and are synced before they become
//! visible. Reads consult the in-memory index and fetch the record
//! straight from the referenced file offset. When the active segment
//! fills up it is sealed and a new one opened; once enough sealed
//! segments accumulate, a background task rewrites them into a single
//! segment holding only the latest record per key.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use segkv::{Db, Options};
//!
//! # fn main() -> Result<(), segkv::Error> {
//! // Open or create a store
//! let db = Db::open_with_options("./data", Options::default())?;
//!
//! // Write operations
//! db.put("name", "Alice")?;
//! db.put_int64("visits", 42)?;
//!
//! // Read operations
//! let name = db.get("name")?;
//! let visits = db.get_int64("visits")?;
//! println!("{} visited {} times", name, visits);
//!
//! // Close, waiting out any running compaction
//! db.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod compaction;
pub mod config;
pub mod db;
pub mod error;
pub mod record;
pub mod segment;

// Re-exports
pub use config::Options;
pub use db::Db;
pub use error::{Error, Result};
pub use record::{DataType, Record, Value};
