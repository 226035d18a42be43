//! Log writer configuration.

use std::path::PathBuf;

/// Default chunk capacity: 32 KiB of buffered bytes per arena.
pub const DEFAULT_CHUNK_CAPACITY: u64 = 32 * 1024;

/// Default bound on flush write retries.
pub const DEFAULT_FLUSH_RETRIES: u32 = 8;

/// Configuration for [`LogWriter`](super::LogWriter) initialization.
///
/// Every process on the host that should share one log buffer must use the
/// same `log_path`, `arena_path`, and `capacity`.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Path of the durable, append-only log file. Also the lock token.
    pub log_path: PathBuf,
    /// Path of the shared arena file backing cursor and buffer.
    pub arena_path: PathBuf,
    /// Chunk capacity in bytes: the buffer flushes before it would exceed this.
    pub capacity: u64,
    /// Maximum number of failed or zero-length writes tolerated per flush.
    ///
    /// `ErrorKind::Interrupted` retries are free and do not count.
    pub max_flush_retries: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("/tmp/shmlog/shmlog.log"),
            arena_path: PathBuf::from("/tmp/shmlog/shmlog.arena"),
            capacity: DEFAULT_CHUNK_CAPACITY,
            max_flush_retries: DEFAULT_FLUSH_RETRIES,
        }
    }
}

impl LogConfig {
    /// Create a configuration rooted in a unique temp directory.
    ///
    /// Each invocation gets its own directory, so tests never share state.
    pub fn for_testing() -> Self {
        let dir = std::env::temp_dir().join(format!("shmlog_{}", uuid::Uuid::new_v4()));
        Self {
            log_path: dir.join("test.log"),
            arena_path: dir.join("test.arena"),
            capacity: DEFAULT_CHUNK_CAPACITY,
            max_flush_retries: DEFAULT_FLUSH_RETRIES,
        }
    }

    /// Set the durable log file path.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Set the arena file path.
    pub fn with_arena_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.arena_path = path.into();
        self
    }

    /// Set the chunk capacity.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the flush retry bound.
    pub fn with_flush_retries(mut self, retries: u32) -> Self {
        self.max_flush_retries = retries;
        self
    }
}
