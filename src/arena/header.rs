//! Arena header structure.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Magic number for shmlog arena files ("SHMLOGAR" in hex).
pub const ARENA_MAGIC: u64 = 0x5348_4D4C_4F47_4152;

/// Current arena format version.
pub const ARENA_VERSION: u32 = 1;

/// Fixed size of the arena header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Arena file header.
///
/// Stored at the beginning of every arena file. An attaching process
/// validates it before trusting any byte of the data region: a foreign or
/// half-written file must be rejected rather than interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ArenaHeader {
    /// Magic number for file identification.
    pub magic: u64,
    /// Arena format version.
    pub version: u32,
    /// Flags (reserved for future use).
    pub flags: u32,
    /// Offset to the start of the data region.
    pub data_offset: u64,
    /// Chunk capacity: maximum bytes the data buffer holds before a flush.
    pub capacity: u64,
    /// Creation timestamp (Unix epoch seconds).
    pub created_at: u64,
    /// Reserved for alignment and future use.
    pub _reserved: [u8; 24],
}

impl ArenaHeader {
    /// Create a new arena header for the given chunk capacity.
    pub fn new(capacity: u64) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            magic: ARENA_MAGIC,
            version: ARENA_VERSION,
            flags: 0,
            data_offset: HEADER_SIZE as u64,
            capacity,
            created_at: now,
            _reserved: [0u8; 24],
        }
    }

    /// Validate the header against the capacity this process expects.
    pub fn validate(&self, expected_capacity: u64) -> Result<(), &'static str> {
        if self.magic != ARENA_MAGIC {
            return Err("Invalid magic number");
        }
        if self.version != ARENA_VERSION {
            return Err("Unsupported arena version");
        }
        if self.data_offset != HEADER_SIZE as u64 {
            return Err("Unexpected data region offset");
        }
        if self.capacity != expected_capacity {
            return Err("Capacity does not match existing arena");
        }
        Ok(())
    }

    /// Read header from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Buffer too small for header",
            ));
        }

        let mut cursor = io::Cursor::new(bytes);

        let magic = cursor.read_u64::<LittleEndian>()?;
        let version = cursor.read_u32::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let data_offset = cursor.read_u64::<LittleEndian>()?;
        let capacity = cursor.read_u64::<LittleEndian>()?;
        let created_at = cursor.read_u64::<LittleEndian>()?;

        let mut reserved = [0u8; 24];
        cursor.read_exact(&mut reserved)?;

        Ok(Self {
            magic,
            version,
            flags,
            data_offset,
            capacity,
            created_at,
            _reserved: reserved,
        })
    }

    /// Write header to a byte buffer.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);

        buf.write_u64::<LittleEndian>(self.magic)?;
        buf.write_u32::<LittleEndian>(self.version)?;
        buf.write_u32::<LittleEndian>(self.flags)?;
        buf.write_u64::<LittleEndian>(self.data_offset)?;
        buf.write_u64::<LittleEndian>(self.capacity)?;
        buf.write_u64::<LittleEndian>(self.created_at)?;
        buf.write_all(&self._reserved)?;

        debug_assert_eq!(buf.len(), HEADER_SIZE);

        Ok(buf)
    }
}
