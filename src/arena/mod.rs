//! File-backed shared memory arena.
//!
//! The arena is a fixed-size file mapped `MAP_SHARED` into every attaching
//! process. All attachers see the identical byte layout through the page
//! cache, which is what makes a cursor stored here authoritative across
//! unrelated processes.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Header (fixed size: magic, version, capacity, ...)   │
//! ├──────────────────────────────────────────────────────┤
//! │ Data region (bump-allocated, 2 × chunk capacity)     │
//! │ ┌──────────────────────────────────────────────────┐ │
//! │ │ Region 0: length cursor (8 bytes)                │ │
//! │ ├──────────────────────────────────────────────────┤ │
//! │ │ Region 1: data buffer (chunk capacity bytes)     │ │
//! │ └──────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The bump allocator only ever moves forward and is exercised exactly twice
//! per arena lifetime; there is no free, no compaction, no reuse. Attaching
//! to an existing arena re-derives the same two regions deterministically
//! from the header.

mod bump;
mod header;
mod map;

pub use bump::{BumpAllocator, Region, REGION_ALIGNMENT};
pub use header::{ArenaHeader, ARENA_MAGIC, ARENA_VERSION, HEADER_SIZE};
pub use map::SharedArena;
