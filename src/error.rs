//! Error types for shmlog.
//!
//! Errors carry stable `Exxx` codes and the path or counts needed to act on
//! them. Provisioning errors (arena, mmap, durable-file open) are expected to
//! be treated as fatal by the embedder; flush errors are retriable and are
//! normally absorbed by the writer's non-throwing contract.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for shmlog operations.
#[derive(Error, Debug)]
pub enum ShmLogError {
    // =========================================================================
    // Arena Errors (E001-E099)
    // =========================================================================
    /// Failed to create or open the arena file.
    #[error("E001: Failed to create arena at {path}: {cause}")]
    ArenaCreate {
        /// The path where arena creation failed.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// Failed to memory-map the arena file.
    #[error("E002: Failed to mmap arena at {path}: {cause}")]
    ArenaMmap {
        /// The path of the arena file.
        path: PathBuf,
        /// Reason for the mmap failure.
        cause: String,
    },

    /// Arena header or cursor failed validation on attach.
    #[error("E003: Arena corruption at {path}: {cause}")]
    ArenaCorruption {
        /// The path of the arena file.
        path: PathBuf,
        /// Description of the corruption.
        cause: String,
    },

    /// Bump allocator ran out of arena space.
    #[error("E004: Arena exhausted: requested {requested} bytes, available {available} bytes")]
    ArenaExhausted {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// A region access fell outside the arena's mapped range.
    #[error("E005: Region out of bounds: offset {offset} + len {len} exceeds arena size {size}")]
    RegionOutOfBounds {
        /// Start offset of the access.
        offset: usize,
        /// Length of the access.
        len: usize,
        /// Total mapped size of the arena.
        size: usize,
    },

    // =========================================================================
    // Lock Errors (E100-E199)
    // =========================================================================
    /// The OS advisory-lock primitive itself failed.
    ///
    /// Blocking until the lock is granted is not an error; this fires only
    /// when the underlying syscall errors.
    #[error("E101: Advisory lock on {path} failed: {cause}")]
    LockFailed {
        /// The path of the lock file.
        path: PathBuf,
        /// Reason the lock call failed.
        cause: String,
    },

    /// A non-blocking lock attempt found the lock already held.
    #[error("E102: Advisory lock on {path} is held by another process")]
    LockContended {
        /// The path of the lock file.
        path: PathBuf,
    },

    // =========================================================================
    // Durable File Errors (E200-E299)
    // =========================================================================
    /// Failed to open or create the durable log file.
    #[error("E201: Failed to open log file at {path}: {cause}")]
    LogOpen {
        /// The path of the durable log file.
        path: PathBuf,
        /// Reason the open failed.
        cause: String,
    },

    /// A flush write to the durable file failed after exhausting its retries.
    #[error(
        "E202: Flush to {path} failed after {retries} retries: \
         wrote {written} of {total} bytes: {cause}"
    )]
    FlushFailed {
        /// The path of the durable log file.
        path: PathBuf,
        /// Number of retries consumed.
        retries: u32,
        /// Bytes durably written before giving up.
        written: usize,
        /// Bytes that were pending when the flush started.
        total: usize,
        /// The last underlying I/O error.
        cause: String,
    },
}

impl ShmLogError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArenaCreate { .. } => "E001",
            Self::ArenaMmap { .. } => "E002",
            Self::ArenaCorruption { .. } => "E003",
            Self::ArenaExhausted { .. } => "E004",
            Self::RegionOutOfBounds { .. } => "E005",
            Self::LockFailed { .. } => "E101",
            Self::LockContended { .. } => "E102",
            Self::LogOpen { .. } => "E201",
            Self::FlushFailed { .. } => "E202",
        }
    }

    /// Check if this error is retriable.
    ///
    /// Provisioning and corruption errors are not; a later attempt will hit
    /// the same wall. A failed flush may succeed once the disk recovers, and
    /// a contended non-blocking lock succeeds once the holder releases.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::FlushFailed { .. } | Self::LockContended { .. })
    }
}

/// Result type alias using `ShmLogError`.
pub type Result<T> = std::result::Result<T, ShmLogError>;
