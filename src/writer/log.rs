//! Log writer implementation.

use super::config::LogConfig;
use crate::arena::{Region, SharedArena};
use crate::error::{Result, ShmLogError};
use crate::lock::FileLock;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Internal state of the log writer, guarded by an in-process mutex.
struct WriterInner {
    /// Attached shared arena.
    arena: SharedArena,
    /// 8-byte region holding the buffer's fill level.
    cursor: Region,
    /// Fixed-capacity region holding not-yet-flushed log bytes.
    buffer: Region,
    /// Advisory lock on the durable log file; also the write handle.
    lock: FileLock,
    /// Chunk capacity in bytes.
    capacity: usize,
    /// Bound on failed writes per flush.
    max_flush_retries: u32,
}

/// Multi-process buffered appender to a single durable log file.
///
/// `init` creates or attaches the shared arena and opens the durable file;
/// `write` buffers a message, flushing first if it would overflow; `flush`
/// drains any buffered bytes to the file. Every buffer access, append and
/// flush alike, happens inside one critical section under the cross-process
/// advisory lock, so writes from unrelated processes land contiguously in
/// lock-grant order.
///
/// `write` and `flush` never return errors. Failures are counted in
/// [`failure_count`](Self::failure_count) and logged via `tracing`, keeping
/// the call contract of a logger that must not itself become a source of
/// caller-visible faults.
///
/// Dropping a `LogWriter` does not flush or reset anything: buffered bytes
/// persist in the arena file and are picked up by the next process that
/// attaches. There is no teardown API.
pub struct LogWriter {
    inner: Arc<Mutex<WriterInner>>,
    failures: Arc<AtomicU64>,
}

impl LogWriter {
    /// Create or attach the shared buffer and open the durable log file.
    ///
    /// Idempotent per host: the first caller creates and zero-initializes
    /// the arena, every later caller (same or different process) attaches
    /// without touching buffered state. Provisioning failures propagate;
    /// the embedder is expected to treat them as fatal, because logging
    /// infrastructure that fails silently is worse than a loud crash.
    pub fn init(config: &LogConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(ShmLogError::ArenaCreate {
                path: config.arena_path.clone(),
                cause: "chunk capacity must be non-zero".to_string(),
            });
        }

        if let Some(parent) = config.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ShmLogError::LogOpen {
                path: config.log_path.clone(),
                cause: e.to_string(),
            })?;
        }

        // O_APPEND: every flush write lands at end-of-file, regardless of
        // what other lock holders appended in between.
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&config.log_path)
            .map_err(|e| ShmLogError::LogOpen {
                path: config.log_path.clone(),
                cause: e.to_string(),
            })?;

        let lock = FileLock::new(file, &config.log_path);

        let mut arena = SharedArena::open_or_create(&config.arena_path, config.capacity)?;

        // The arena hosts exactly two allocations, in this order, in every
        // attacher: the length cursor, then the data buffer.
        let cursor = arena.allocate(8)?;
        let buffer = arena.allocate(config.capacity as usize)?;

        // Another attacher may be mid-append or mid-flush right now; even
        // this sanity read of the shared cursor must sit inside the
        // cross-process critical section.
        {
            let _held = lock.acquire()?;
            let fill = arena.read_u64(cursor)?;
            if fill > config.capacity {
                return Err(ShmLogError::ArenaCorruption {
                    path: config.arena_path.clone(),
                    cause: format!("cursor {} exceeds capacity {}", fill, config.capacity),
                });
            }
        }

        let inner = WriterInner {
            arena,
            cursor,
            buffer,
            lock,
            capacity: config.capacity as usize,
            max_flush_retries: config.max_flush_retries,
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
            failures: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Append a message to the shared buffer, flushing first if needed.
    ///
    /// Messages larger than the chunk capacity are split into capacity-sized
    /// chunks under a single lock acquisition, so their bytes still land
    /// contiguously in the durable file.
    pub fn write(&self, message: &[u8]) {
        if message.is_empty() {
            return;
        }
        if let Err(e) = self.write_inner(message) {
            self.report(e);
        }
    }

    /// Force any buffered bytes to the durable file now.
    ///
    /// A no-op when the buffer is empty: no file write, no size change.
    pub fn flush(&self) {
        if let Err(e) = self.flush_inner() {
            self.report(e);
        }
    }

    /// Number of bytes currently buffered but not yet flushed.
    ///
    /// Read under the cross-process lock.
    pub fn pending_bytes(&self) -> u64 {
        match self.pending_inner() {
            Ok(n) => n,
            Err(e) => {
                self.report(e);
                0
            }
        }
    }

    /// Number of internal failures absorbed by `write` and `flush` so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Chunk capacity this writer was initialized with.
    pub fn capacity(&self) -> u64 {
        self.inner.lock().capacity as u64
    }

    fn write_inner(&self, message: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock();
        let WriterInner {
            arena,
            cursor,
            buffer,
            lock,
            capacity,
            max_flush_retries,
        } = &mut *guard;

        let _held = lock.acquire()?;

        for chunk in message.chunks(*capacity) {
            let fill = arena.read_u64(*cursor)? as usize;
            if fill + chunk.len() > *capacity {
                flush_locked(arena, *cursor, *buffer, lock, *max_flush_retries)?;
            }

            let fill = arena.read_u64(*cursor)? as usize;
            let buf = arena.region_mut(*buffer)?;
            buf[fill..fill + chunk.len()].copy_from_slice(chunk);
            arena.write_u64(*cursor, (fill + chunk.len()) as u64)?;
        }

        Ok(())
    }

    fn flush_inner(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let WriterInner {
            arena,
            cursor,
            buffer,
            lock,
            max_flush_retries,
            ..
        } = &mut *guard;

        let _held = lock.acquire()?;
        flush_locked(arena, *cursor, *buffer, lock, *max_flush_retries)
    }

    fn pending_inner(&self) -> Result<u64> {
        let mut guard = self.inner.lock();
        let WriterInner {
            arena, cursor, lock, ..
        } = &mut *guard;

        let _held = lock.acquire()?;
        arena.read_u64(*cursor)
    }

    fn report(&self, error: ShmLogError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            code = error.code(),
            error = %error,
            "shared log buffer operation failed"
        );
    }
}

/// Drain the buffer to the durable file. Caller holds the advisory lock.
///
/// On success the cursor resets to zero; stale bytes past it are left in
/// place. On failure the durably-written prefix is dropped from the buffer
/// (remaining bytes shift to the front, cursor shrinks to match), so flushed
/// bytes are never duplicated and unflushed bytes are never lost.
fn flush_locked(
    arena: &mut SharedArena,
    cursor: Region,
    buffer: Region,
    lock: &FileLock,
    max_retries: u32,
) -> Result<()> {
    let pending = arena.read_u64(cursor)? as usize;
    if pending == 0 {
        return Ok(());
    }

    let result = {
        let data = &arena.region(buffer)?[..pending];
        write_retrying(lock, data, max_retries)
    };

    match result {
        Ok(()) => {
            arena.write_u64(cursor, 0)?;
            Ok(())
        }
        Err(err) => {
            if let ShmLogError::FlushFailed { written, .. } = &err {
                let written = *written;
                if written > 0 {
                    let buf = arena.region_mut(buffer)?;
                    buf.copy_within(written..pending, 0);
                }
                arena.write_u64(cursor, (pending - written) as u64)?;
            }
            Err(err)
        }
    }
}

/// Append `data` to the locked file, retrying short writes.
///
/// A write may legitimately transfer fewer bytes than requested; the
/// remainder is retried with the advanced offset. `Interrupted` results
/// retry for free. Any other error, and a zero-length write, consume one
/// retry from the bounded budget.
fn write_retrying(lock: &FileLock, data: &[u8], max_retries: u32) -> Result<()> {
    let mut handle = lock.file();
    let mut written = 0usize;
    let mut retries = 0u32;

    while written < data.len() {
        match handle.write(&data[written..]) {
            Ok(0) => {
                retries += 1;
                if retries > max_retries {
                    return Err(ShmLogError::FlushFailed {
                        path: lock.path().to_path_buf(),
                        retries,
                        written,
                        total: data.len(),
                        cause: "write returned zero bytes".to_string(),
                    });
                }
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                retries += 1;
                if retries > max_retries {
                    return Err(ShmLogError::FlushFailed {
                        path: lock.path().to_path_buf(),
                        retries,
                        written,
                        total: data.len(),
                        cause: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::config::DEFAULT_CHUNK_CAPACITY;

    fn file_len(config: &LogConfig) -> u64 {
        std::fs::metadata(&config.log_path).map(|m| m.len()).unwrap_or(0)
    }

    #[test]
    fn write_buffers_without_touching_file() {
        let config = LogConfig::for_testing();
        let writer = LogWriter::init(&config).unwrap();

        writer.write(b"hello");
        assert_eq!(writer.pending_bytes(), 5);
        assert_eq!(file_len(&config), 0);
        assert_eq!(writer.failure_count(), 0);
    }

    #[test]
    fn flush_drains_buffer_to_file() {
        let config = LogConfig::for_testing();
        let writer = LogWriter::init(&config).unwrap();

        writer.write(b"hello ");
        writer.write(b"world");
        writer.flush();

        assert_eq!(writer.pending_bytes(), 0);
        assert_eq!(std::fs::read(&config.log_path).unwrap(), b"hello world");
    }

    #[test]
    fn empty_flush_is_a_noop() {
        let config = LogConfig::for_testing();
        let writer = LogWriter::init(&config).unwrap();

        writer.flush();
        assert_eq!(file_len(&config), 0);

        writer.write(b"x");
        writer.flush();
        let len = file_len(&config);
        writer.flush();
        assert_eq!(file_len(&config), len);
    }

    #[test]
    fn empty_write_is_ignored() {
        let config = LogConfig::for_testing();
        let writer = LogWriter::init(&config).unwrap();

        writer.write(b"");
        assert_eq!(writer.pending_bytes(), 0);
    }

    #[test]
    fn threshold_flushes_old_bytes_before_buffering_new() {
        let config = LogConfig::for_testing().with_capacity(16);
        let writer = LogWriter::init(&config).unwrap();

        writer.write(b"aaaaaaaaaa"); // 10 bytes, fits
        assert_eq!(writer.pending_bytes(), 10);
        assert_eq!(file_len(&config), 0);

        writer.write(b"bbbbbbbbbb"); // 10 + 10 > 16: flush the a's first
        assert_eq!(writer.pending_bytes(), 10);
        assert_eq!(std::fs::read(&config.log_path).unwrap(), b"aaaaaaaaaa");

        writer.flush();
        assert_eq!(
            std::fs::read(&config.log_path).unwrap(),
            b"aaaaaaaaaabbbbbbbbbb"
        );
    }

    #[test]
    fn fill_to_exact_capacity_does_not_flush() {
        let config = LogConfig::for_testing().with_capacity(8);
        let writer = LogWriter::init(&config).unwrap();

        writer.write(b"12345678");
        assert_eq!(writer.pending_bytes(), 8);
        assert_eq!(file_len(&config), 0);
    }

    #[test]
    fn oversize_message_is_chunked_contiguously() {
        let config = LogConfig::for_testing().with_capacity(8);
        let writer = LogWriter::init(&config).unwrap();

        let message: Vec<u8> = (0u8..=25).cycle().take(20).collect();
        writer.write(&message);
        writer.flush();

        assert_eq!(std::fs::read(&config.log_path).unwrap(), message);
        assert_eq!(writer.failure_count(), 0);
    }

    #[test]
    fn documented_32k_scenario() {
        let config = LogConfig::for_testing();
        assert_eq!(config.capacity, DEFAULT_CHUNK_CAPACITY);
        let writer = LogWriter::init(&config).unwrap();

        writer.write(&[b'A'; 16000]);
        assert_eq!(writer.pending_bytes(), 16000);
        assert_eq!(file_len(&config), 0);

        writer.write(&[b'B'; 16000]);
        assert_eq!(writer.pending_bytes(), 32000);
        assert_eq!(file_len(&config), 0);

        // 32000 + 1000 > 32768: the buffered 32000 bytes flush first.
        writer.write(&[b'C'; 1000]);
        assert_eq!(writer.pending_bytes(), 1000);
        assert_eq!(file_len(&config), 32000);

        writer.flush();
        assert_eq!(writer.pending_bytes(), 0);

        let contents = std::fs::read(&config.log_path).unwrap();
        assert_eq!(contents.len(), 33000);
        assert!(contents[..16000].iter().all(|&b| b == b'A'));
        assert!(contents[16000..32000].iter().all(|&b| b == b'B'));
        assert!(contents[32000..].iter().all(|&b| b == b'C'));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn exhausted_flush_retries_keep_buffered_bytes() {
        let config = LogConfig::for_testing().with_flush_retries(2);
        // Same arena, but a log file every write to which reports ENOSPC.
        let full = config.clone().with_log_path("/dev/full");

        let writer = LogWriter::init(&full).unwrap();
        writer.write(b"0123456789");
        assert_eq!(writer.pending_bytes(), 10);

        writer.flush();
        assert_eq!(writer.failure_count(), 1);
        // Nothing was durably written, so nothing leaves the buffer.
        assert_eq!(writer.pending_bytes(), 10);

        // A writer pointed at a healthy file drains the same bytes intact.
        let recovered = LogWriter::init(&config).unwrap();
        recovered.flush();
        assert_eq!(recovered.failure_count(), 0);
        assert_eq!(std::fs::read(&config.log_path).unwrap(), b"0123456789");
    }

    #[test]
    fn init_waits_for_the_advisory_lock() {
        let config = LogConfig::for_testing();
        drop(LogWriter::init(&config).unwrap());

        // An independent holder of the cross-process lock on the log file.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.log_path)
            .unwrap();
        let lock = FileLock::new(file, &config.log_path);
        let guard = lock.acquire().unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let blocked = config.clone();
        let handle = std::thread::spawn(move || {
            let _writer = LogWriter::init(&blocked).unwrap();
            tx.send(()).unwrap();
        });

        // init reads the shared cursor, so it must wait for the holder.
        assert!(rx
            .recv_timeout(std::time::Duration::from_millis(200))
            .is_err());

        drop(guard);
        rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn reinit_preserves_buffered_bytes() {
        let config = LogConfig::for_testing();

        {
            let writer = LogWriter::init(&config).unwrap();
            writer.write(b"survives restart");
            // Dropped without flushing: no teardown, bytes stay in the arena.
        }

        let writer = LogWriter::init(&config).unwrap();
        assert_eq!(writer.pending_bytes(), 16);

        writer.flush();
        assert_eq!(
            std::fs::read(&config.log_path).unwrap(),
            b"survives restart"
        );
    }

    #[test]
    fn two_writers_interleave_whole_messages() {
        let config = LogConfig::for_testing().with_capacity(64);
        let a = LogWriter::init(&config).unwrap();
        let b = LogWriter::init(&config).unwrap();

        a.write(b"aaaa");
        b.write(b"bbbb");
        a.write(b"cccc");
        b.flush();

        let contents = std::fs::read(&config.log_path).unwrap();
        assert_eq!(contents, b"aaaabbbbcccc");
    }
}
