//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```ignore
//! use shmlog::prelude::*;
//! ```

// Error handling
pub use crate::error::{Result, ShmLogError};

// Arena
pub use crate::arena::{ArenaHeader, BumpAllocator, Region, SharedArena};

// Locking
pub use crate::lock::{FileLock, LockGuard};

// Writer façade
pub use crate::writer::{LogConfig, LogWriter, DEFAULT_CHUNK_CAPACITY, DEFAULT_FLUSH_RETRIES};
