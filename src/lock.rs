//! Cross-process advisory locking with scoped guards.
//!
//! The lock is bound to a file descriptor on the durable log file itself;
//! the log file doubles as the lock token, so there is no separate lock file
//! to provision or clean up. It is advisory: only participants that go
//! through this lock are excluded. If a holder dies, the OS releases the
//! lock when it reclaims the process's descriptors, so a crashed holder
//! cannot wedge the system.
//!
//! The lock is non-reentrant by contract. A caller holding a [`LockGuard`]
//! must not acquire again before dropping it. Note that `flock`-style locks
//! are granted per open file description: two handles opened separately on
//! the same path exclude each other, but re-locking through the same handle
//! would be granted by the OS. [`LogWriter`](crate::writer::LogWriter)
//! serializes in-process threads with a mutex before ever reaching this
//! lock, which restores the non-reentrant discipline inside one process.

use crate::error::{Result, ShmLogError};
use fs2::FileExt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// An exclusive advisory lock on a file descriptor.
///
/// `acquire` blocks indefinitely; there is no timeout and no deadlock
/// detection anywhere in this subsystem.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Wrap an open file handle as a lock token.
    pub fn new(file: File, path: impl Into<PathBuf>) -> Self {
        Self {
            file,
            path: path.into(),
        }
    }

    /// Block until exclusive ownership is granted.
    ///
    /// Blocking is the normal case, not an error; only a failure of the OS
    /// primitive itself errors.
    pub fn acquire(&self) -> Result<LockGuard<'_>> {
        self.file
            .lock_exclusive()
            .map_err(|e| ShmLogError::LockFailed {
                path: self.path.clone(),
                cause: e.to_string(),
            })?;
        Ok(LockGuard { lock: self })
    }

    /// Attempt to acquire without blocking.
    ///
    /// Returns [`ShmLogError::LockContended`] if another holder has the lock.
    pub fn try_acquire(&self) -> Result<LockGuard<'_>> {
        match self.file.try_lock_exclusive() {
            Ok(()) => Ok(LockGuard { lock: self }),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                Err(ShmLogError::LockContended {
                    path: self.path.clone(),
                })
            }
            Err(e) => Err(ShmLogError::LockFailed {
                path: self.path.clone(),
                cause: e.to_string(),
            }),
        }
    }

    /// The locked file handle, for I/O while the lock is held.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Path of the lock token file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Scoped ownership of the exclusive lock.
///
/// Released on drop, on every exit path including panics and early returns.
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a FileLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Release failure leaves the fd locked until process exit, which the
        // OS then reclaims; nothing actionable remains at this point.
        if let Err(e) = fs2::FileExt::unlock(&self.lock.file) {
            tracing::error!(
                path = %self.lock.path.display(),
                error = %e,
                "failed to release advisory lock"
            );
        }
    }
}
