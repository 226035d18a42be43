//! Shared arena creation, attachment, and bounds-checked access.

use super::bump::{BumpAllocator, Region};
use super::header::{ArenaHeader, HEADER_SIZE};
use crate::error::{Result, ShmLogError};
use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A file-backed memory region shared by every process that attaches to it.
///
/// The backing file is mapped shared, so all attachers observe each other's
/// stores through the page cache without any explicit sync. The arena itself
/// provides no mutual exclusion; callers serialize access with the advisory
/// lock on the durable log file.
#[derive(Debug)]
pub struct SharedArena {
    /// The shared mapping over the whole arena file.
    mmap: MmapMut,
    /// The underlying file handle (kept open for the life of the arena).
    _file: File,
    /// Path to the arena file.
    path: PathBuf,
    /// Parsed header, validated at attach time.
    header: ArenaHeader,
    /// Process-local allocator state over the data region.
    bump: BumpAllocator,
}

impl SharedArena {
    /// Create the arena file or attach to an existing one.
    ///
    /// Idempotent and race-safe: initialization runs under an exclusive
    /// advisory lock on the arena file itself, so of several racing first
    /// callers exactly one writes the header and zeroes the data region;
    /// the rest attach and validate. Attaching never resets existing
    /// contents.
    ///
    /// The file is sized to hold the header plus twice `capacity`, and the
    /// data region is handed to a fresh bump allocator in every attacher;
    /// identical allocation sequences yield identical regions everywhere.
    pub fn open_or_create(path: impl AsRef<Path>, capacity: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ShmLogError::ArenaCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ShmLogError::ArenaCreate {
                path: path.clone(),
                cause: e.to_string(),
            })?;

        // Serialize creation against other racing first callers. The lock is
        // held only for the init critical section, never stored.
        file.lock_exclusive().map_err(|e| ShmLogError::LockFailed {
            path: path.clone(),
            cause: e.to_string(),
        })?;

        let result = Self::init_locked(&file, &path, capacity);

        let _ = fs2::FileExt::unlock(&file);

        let (mmap, header) = result?;

        let data_len = (header.capacity as usize) * 2;
        let bump = BumpAllocator::new(HEADER_SIZE, data_len);

        Ok(Self {
            mmap,
            _file: file,
            path,
            header,
            bump,
        })
    }

    /// Initialization body, called with the arena file exclusively locked.
    fn init_locked(file: &File, path: &Path, capacity: u64) -> Result<(MmapMut, ArenaHeader)> {
        let required = capacity
            .checked_mul(2)
            .and_then(|data| data.checked_add(HEADER_SIZE as u64))
            .ok_or_else(|| ShmLogError::ArenaCreate {
                path: path.to_path_buf(),
                cause: format!("chunk capacity {} overflows the arena size", capacity),
            })?;

        let len = file
            .metadata()
            .map_err(|e| ShmLogError::ArenaCreate {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?
            .len();

        if len < required {
            // Fresh file (or one truncated out from under us): extend with
            // zeroes. Extension zero-fills, which doubles as the one-time
            // zero-initialization of cursor and buffer.
            file.set_len(required).map_err(|e| ShmLogError::ArenaCreate {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;
        }

        let mut mmap = unsafe {
            MmapOptions::new()
                .len(required as usize)
                .map_mut(file)
                .map_err(|e| ShmLogError::ArenaMmap {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                })?
        };

        let magic = LittleEndian::read_u64(&mmap[..8]);

        let header = if magic == 0 {
            // First caller: write the header. Cursor and buffer are already
            // zero from the file extension above.
            let header = ArenaHeader::new(capacity);
            let bytes = header.to_bytes().map_err(|e| ShmLogError::ArenaCreate {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;
            mmap[..HEADER_SIZE].copy_from_slice(&bytes);
            mmap.flush().map_err(|e| ShmLogError::ArenaCreate {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;
            header
        } else {
            let header = ArenaHeader::from_bytes(&mmap[..HEADER_SIZE]).map_err(|e| {
                ShmLogError::ArenaCorruption {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                }
            })?;
            header
                .validate(capacity)
                .map_err(|e| ShmLogError::ArenaCorruption {
                    path: path.to_path_buf(),
                    cause: e.to_string(),
                })?;
            header
        };

        Ok((mmap, header))
    }

    /// Carve the next region out of the data region.
    ///
    /// Allocation order is part of the cross-process layout contract: every
    /// attacher must allocate the same sizes in the same order.
    pub fn allocate(&mut self, len: usize) -> Result<Region> {
        self.bump.allocate(len)
    }

    /// Borrow a region's bytes, bounds-checked against the mapping.
    pub fn region(&self, region: Region) -> Result<&[u8]> {
        self.check(region)?;
        Ok(&self.mmap[region.offset..region.end()])
    }

    /// Mutably borrow a region's bytes, bounds-checked against the mapping.
    pub fn region_mut(&mut self, region: Region) -> Result<&mut [u8]> {
        self.check(region)?;
        Ok(&mut self.mmap[region.offset..region.end()])
    }

    /// Read a little-endian u64 from the start of a region.
    pub fn read_u64(&self, region: Region) -> Result<u64> {
        let bytes = self.region(region)?;
        if bytes.len() < 8 {
            return Err(ShmLogError::RegionOutOfBounds {
                offset: region.offset,
                len: 8,
                size: self.mmap.len(),
            });
        }
        Ok(LittleEndian::read_u64(&bytes[..8]))
    }

    /// Write a little-endian u64 to the start of a region.
    pub fn write_u64(&mut self, region: Region, value: u64) -> Result<()> {
        let size = self.mmap.len();
        let bytes = self.region_mut(region)?;
        if bytes.len() < 8 {
            return Err(ShmLogError::RegionOutOfBounds {
                offset: region.offset,
                len: 8,
                size,
            });
        }
        LittleEndian::write_u64(&mut bytes[..8], value);
        Ok(())
    }

    fn check(&self, region: Region) -> Result<()> {
        let in_bounds = region
            .offset
            .checked_add(region.len)
            .is_some_and(|end| end <= self.mmap.len());
        if !in_bounds {
            return Err(ShmLogError::RegionOutOfBounds {
                offset: region.offset,
                len: region.len,
                size: self.mmap.len(),
            });
        }
        Ok(())
    }

    /// The arena's validated header.
    pub fn header(&self) -> &ArenaHeader {
        &self.header
    }

    /// Chunk capacity recorded in the header.
    pub fn capacity(&self) -> u64 {
        self.header.capacity
    }

    /// Path to the arena file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
