//! Process-safe shared log buffer.
//!
//! `shmlog` lets multiple independent OS processes on one host append text to
//! a single durable log file without corrupting each other's writes, and
//! without paying for a file write on every message. Pending bytes accumulate
//! in a file-backed shared memory arena; an exclusive advisory lock on the
//! durable file serializes all access; a flush drains the buffer to the file
//! whenever it would overflow or when a caller asks for it.
//!
//! # Key components
//!
//! - **Arena**: a memory-mapped file visible to every attaching process, with
//!   a bump allocator that carves out exactly two regions: the length cursor
//!   and the data buffer.
//! - **Lock**: an exclusive, non-reentrant advisory lock on the durable log
//!   file's descriptor, held for the duration of every append and flush.
//! - **Writer**: the façade composing the two — `init`, `write`, `flush`.
//!
//! # Example
//!
//! ```no_run
//! use shmlog::prelude::*;
//!
//! let config = LogConfig::default()
//!     .with_log_path("/var/log/app/service.log")
//!     .with_arena_path("/var/log/app/service.arena");
//!
//! let writer = LogWriter::init(&config)?;
//! writer.write(b"request handled\n");
//! writer.flush();
//! # Ok::<(), shmlog::ShmLogError>(())
//! ```
//!
//! `write` and `flush` never return errors; internal failures are reported
//! through `tracing` and the writer's failure counter. `init` is the only
//! fallible operation, because a host that cannot provision its logging
//! infrastructure should fail loudly rather than drop messages silently.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod error;
pub mod lock;
pub mod prelude;
pub mod writer;

pub use arena::{ArenaHeader, Region, SharedArena};
pub use error::{Result, ShmLogError};
pub use lock::{FileLock, LockGuard};
pub use writer::{LogConfig, LogWriter, DEFAULT_CHUNK_CAPACITY};
