//! # Coordinate Mapping
//!
//! The single place where world cells are split into chunk + local offsets.
//!
//! ```text
//!   world x:  ... -17 -16 | -15 ... -1 | 0 1 ... 15 | 16 ...
//!   chunk  :       -2     |     -1     |     0      |  1
//!   local  :    15   0    |  1  ... 15 | 0 1 ... 15 | 0
//! ```
//!
//! Division floors toward negative infinity and the local offset is never
//! negative, so `x = -1` lives in chunk `-1` at local `15`.

use serde::{Deserialize, Serialize};

use crate::constants::{CHUNK_SIZE, CHUNK_SIZE_I32};

/// Chunk column coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Chunk X coordinate (world X / `CHUNK_SIZE`, floored).
    pub x: i32,
    /// Chunk Z coordinate (world Z / `CHUNK_SIZE`, floored).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given world block column.
    #[inline]
    #[must_use]
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self::new(x.div_euclid(CHUNK_SIZE_I32), z.div_euclid(CHUNK_SIZE_I32))
    }

    /// Chunk containing a world-space position.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_position(x: f32, z: f32) -> Self {
        Self::from_block(x.floor() as i32, z.floor() as i32)
    }

    /// World X coordinate of this chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> i32 {
        self.x * CHUNK_SIZE_I32
    }

    /// World Z coordinate of this chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_z(self) -> i32 {
        self.z * CHUNK_SIZE_I32
    }

    /// Packs both components into one integer key.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn packed(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.z as u32 as u64)
    }

    /// Inverse of [`ChunkCoord::packed`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn from_packed(key: u64) -> Self {
        Self::new((key >> 32) as u32 as i32, key as u32 as i32)
    }

    /// Squared chunk distance (for load prioritization).
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dz = i64::from(self.z) - i64::from(other.z);
        dx * dx + dz * dz
    }

    /// Chebyshev distance: the square-radius ring this chunk sits on.
    #[inline]
    #[must_use]
    pub fn ring_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// The four cardinal neighbors (-X, +X, -Z, +Z).
    #[must_use]
    pub const fn neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x - 1, self.z),
            Self::new(self.x + 1, self.z),
            Self::new(self.x, self.z - 1),
            Self::new(self.x, self.z + 1),
        ]
    }

    /// Key under which this chunk's block buffer is persisted.
    #[must_use]
    pub fn storage_key(self) -> String {
        format!("chunk:{},{}", self.x, self.z)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.z)
    }
}

/// A world cell split into its chunk and in-chunk offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocalPos {
    /// Owning chunk.
    pub chunk: ChunkCoord,
    /// Local X in `0..CHUNK_SIZE`.
    pub lx: usize,
    /// Local Z in `0..CHUNK_SIZE`.
    pub lz: usize,
}

/// Maps a world column to its chunk and local offset.
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn world_to_chunk_local(x: i32, z: i32) -> LocalPos {
    LocalPos {
        chunk: ChunkCoord::from_block(x, z),
        lx: x.rem_euclid(CHUNK_SIZE_I32) as usize,
        lz: z.rem_euclid(CHUNK_SIZE_I32) as usize,
    }
}

/// Reconstructs the world column from a chunk and local offset.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn chunk_local_to_world(chunk: ChunkCoord, lx: usize, lz: usize) -> (i32, i32) {
    (chunk.world_x() + lx as i32, chunk.world_z() + lz as i32)
}

/// True when a local offset touches the chunk's outer ring.
#[inline]
#[must_use]
pub const fn is_border(lx: usize, lz: usize) -> bool {
    lx == 0 || lz == 0 || lx == CHUNK_SIZE - 1 || lz == CHUNK_SIZE - 1
}
