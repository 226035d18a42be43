//! Integration tests exercising several writers against one shared buffer.
//!
//! Each writer owns its own file descriptor and its own mapping of the arena
//! file, which is exactly the situation of unrelated processes on one host:
//! coordination happens only through the advisory lock and the shared bytes.

use shmlog::prelude::*;
use std::collections::HashMap;
use std::thread;
use tempfile::tempdir;

const RECORD_LEN: usize = 32;

fn record(tag: u8) -> Vec<u8> {
    let mut rec = vec![tag; RECORD_LEN - 1];
    rec.push(b'\n');
    rec
}

#[test]
fn concurrent_writers_never_tear_or_lose_messages() {
    let dir = tempdir().unwrap();
    let config = LogConfig::default()
        .with_log_path(dir.path().join("shared.log"))
        .with_arena_path(dir.path().join("shared.arena"))
        // Deliberately not a multiple of the record size, so threshold
        // flushes fire mid-stream at awkward fill levels.
        .with_capacity(100);

    const WRITERS: usize = 8;
    const MESSAGES: usize = 50;

    let mut handles = Vec::new();
    for i in 0..WRITERS {
        let config = config.clone();
        handles.push(thread::spawn(move || {
            let writer = LogWriter::init(&config).unwrap();
            let rec = record(b'a' + i as u8);
            for _ in 0..MESSAGES {
                writer.write(&rec);
            }
            assert_eq!(writer.failure_count(), 0);
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Drain whatever the last appenders left buffered.
    let writer = LogWriter::init(&config).unwrap();
    writer.flush();
    assert_eq!(writer.pending_bytes(), 0);

    let contents = std::fs::read(&config.log_path).unwrap();
    assert_eq!(contents.len(), WRITERS * MESSAGES * RECORD_LEN);

    // Every record is whole: each stride is uniform, and per-tag counts add
    // up. A torn message would produce a mixed stride; a lost or duplicated
    // one would skew the counts.
    let mut counts: HashMap<u8, usize> = HashMap::new();
    for stride in contents.chunks(RECORD_LEN) {
        let tag = stride[0];
        assert!(stride[..RECORD_LEN - 1].iter().all(|&b| b == tag));
        assert_eq!(stride[RECORD_LEN - 1], b'\n');
        *counts.entry(tag).or_default() += 1;
    }
    assert_eq!(counts.len(), WRITERS);
    for i in 0..WRITERS {
        assert_eq!(counts[&(b'a' + i as u8)], MESSAGES);
    }
}

#[test]
fn init_is_idempotent_across_handles() {
    let dir = tempdir().unwrap();
    let config = LogConfig::default()
        .with_log_path(dir.path().join("idem.log"))
        .with_arena_path(dir.path().join("idem.arena"))
        .with_capacity(256);

    let first = LogWriter::init(&config).unwrap();
    first.write(b"before second init");

    // A later init must attach, not reset.
    let second = LogWriter::init(&config).unwrap();
    assert_eq!(second.pending_bytes(), 18);

    second.flush();
    assert_eq!(first.pending_bytes(), 0);
    assert_eq!(
        std::fs::read(&config.log_path).unwrap(),
        b"before second init"
    );
}

#[test]
fn racing_first_inits_agree_on_one_arena() {
    let dir = tempdir().unwrap();
    let config = LogConfig::default()
        .with_log_path(dir.path().join("race.log"))
        .with_arena_path(dir.path().join("race.arena"))
        .with_capacity(512);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let config = config.clone();
        handles.push(thread::spawn(move || {
            let writer = LogWriter::init(&config).unwrap();
            writer.write(b"ok");
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let writer = LogWriter::init(&config).unwrap();
    writer.flush();
    assert_eq!(std::fs::read(&config.log_path).unwrap(), b"okokokokokokokok");
}
