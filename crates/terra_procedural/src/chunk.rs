//! # Chunk System
//!
//! World data is organized into fixed-size chunks for:
//! - Memory efficiency (only load nearby chunks)
//! - Fast streaming (generate/discard on demand)
//! - Compact storage
//!
//! ## Chunk Format
//!
//! Chunks are 16x96x16 blocks (width x height x depth).
//! Each block is stored as a u16 block code, indexed `x + z*16 + y*16*16`.
//!
//! ## Storage
//!
//! The persisted form is the raw little-endian `u16` array, exactly
//! `16*96*16` entries. Anything else is rejected on decode.

use terra_shared::{Block, ChunkCoord, CHUNK_HEIGHT, CHUNK_SIZE, CHUNK_VOLUME};

/// Size in bytes of an encoded chunk buffer.
pub const CHUNK_BYTES: usize = CHUNK_VOLUME * std::mem::size_of::<u16>();

/// A chunk of world data.
///
/// Contains a 16x96x16 grid of block codes plus two transient flags that
/// are never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk position in the world.
    pub coord: ChunkCoord,
    /// Block codes, `x + z*W + y*W*W`.
    blocks: Box<[u16]>,
    /// Unsaved block edits exist.
    pub dirty: bool,
    /// Renderable form is stale.
    pub mesh_dirty: bool,
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("dirty", &self.dirty)
            .field("mesh_dirty", &self.mesh_dirty)
            .finish_non_exhaustive()
    }
}

impl Chunk {
    /// Creates a new all-air chunk at the given coordinates.
    ///
    /// Fresh chunks need meshing but have nothing to save.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![Block::Air.code(); CHUNK_VOLUME].into_boxed_slice(),
            dirty: false,
            mesh_dirty: true,
        }
    }

    /// Flat index of a local cell, `None` when out of range.
    #[inline]
    #[must_use]
    pub const fn index(x: usize, y: usize, z: usize) -> Option<usize> {
        if x < CHUNK_SIZE && y < CHUNK_HEIGHT && z < CHUNK_SIZE {
            Some(x + z * CHUNK_SIZE + y * CHUNK_SIZE * CHUNK_SIZE)
        } else {
            None
        }
    }

    /// Gets a block at local coordinates. Out of range reads are air.
    #[inline]
    #[must_use]
    pub fn get_block(&self, x: usize, y: usize, z: usize) -> Block {
        Self::index(x, y, z)
            .and_then(|i| Block::from_code(self.blocks[i]))
            .unwrap_or(Block::Air)
    }

    /// Sets a block at local coordinates and flags the chunk for save and
    /// remesh. Out of range writes are ignored.
    ///
    /// Returns `true` when the cell actually changed.
    #[inline]
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, block: Block) -> bool {
        let Some(i) = Self::index(x, y, z) else {
            return false;
        };
        if self.blocks[i] == block.code() {
            return false;
        }
        self.blocks[i] = block.code();
        self.dirty = true;
        self.mesh_dirty = true;
        true
    }

    /// Writes a block without touching the flags (generation only).
    #[inline]
    pub(crate) fn put(&mut self, x: usize, y: usize, z: usize, block: Block) {
        if let Some(i) = Self::index(x, y, z) {
            self.blocks[i] = block.code();
        }
    }

    /// Highest solid cell in a local column.
    #[must_use]
    pub fn highest_solid(&self, x: usize, z: usize) -> Option<usize> {
        (0..CHUNK_HEIGHT).rev().find(|&y| self.get_block(x, y, z).is_solid())
    }

    /// Raw block codes.
    #[inline]
    #[must_use]
    pub fn codes(&self) -> &[u16] {
        &self.blocks
    }

    /// Encodes the block array as little-endian `u16`s.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHUNK_BYTES);
        for code in self.blocks.iter() {
            out.extend_from_slice(&code.to_le_bytes());
        }
        out
    }

    /// Decodes a little-endian block buffer.
    ///
    /// Returns `None` for a buffer of the wrong length or one containing
    /// unknown block codes; callers treat that as "no saved chunk".
    #[must_use]
    pub fn decode(coord: ChunkCoord, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != CHUNK_BYTES {
            return None;
        }
        let mut blocks = Vec::with_capacity(CHUNK_VOLUME);
        for pair in bytes.chunks_exact(2) {
            let code = u16::from_le_bytes([pair[0], pair[1]]);
            Block::from_code(code)?;
            blocks.push(code);
        }
        Some(Self {
            coord,
            blocks: blocks.into_boxed_slice(),
            dirty: false,
            mesh_dirty: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_layout() {
        assert_eq!(Chunk::index(0, 0, 0), Some(0));
        assert_eq!(Chunk::index(1, 0, 0), Some(1));
        assert_eq!(Chunk::index(0, 0, 1), Some(16));
        assert_eq!(Chunk::index(0, 1, 0), Some(256));
        assert_eq!(Chunk::index(15, 95, 15), Some(CHUNK_VOLUME - 1));
        assert_eq!(Chunk::index(16, 0, 0), None);
        assert_eq!(Chunk::index(0, 96, 0), None);
    }

    #[test]
    fn test_out_of_range_is_air_and_noop() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert_eq!(chunk.get_block(0, 200, 0), Block::Air);
        assert!(!chunk.set_block(16, 0, 0, Block::Stone));
        assert!(!chunk.dirty);
    }

    #[test]
    fn test_set_block_flags() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.mesh_dirty = false;
        assert!(chunk.set_block(3, 10, 4, Block::Stone));
        assert!(chunk.dirty);
        assert!(chunk.mesh_dirty);
        assert_eq!(chunk.get_block(3, 10, 4), Block::Stone);

        // Writing the same value is not an edit.
        chunk.dirty = false;
        assert!(!chunk.set_block(3, 10, 4, Block::Stone));
        assert!(!chunk.dirty);
    }

    #[test]
    fn test_encode_decode_exact() {
        let mut chunk = Chunk::new(ChunkCoord::new(-2, 5));
        for (i, y) in (0..CHUNK_HEIGHT).step_by(7).enumerate() {
            let block = Block::ALL[i % Block::ALL.len()];
            chunk.put(i % CHUNK_SIZE, y, (i * 3) % CHUNK_SIZE, block);
        }
        let bytes = chunk.encode();
        assert_eq!(bytes.len(), CHUNK_BYTES);

        let back = Chunk::decode(chunk.coord, &bytes).unwrap();
        assert_eq!(back.codes(), chunk.codes());
        assert!(!back.dirty);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        chunk.put(1, 0, 0, Block::Cobblestone);
        let bytes = chunk.encode();
        assert_eq!(&bytes[2..4], &[10, 0]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let coord = ChunkCoord::new(0, 0);
        assert!(Chunk::decode(coord, &[]).is_none());
        assert!(Chunk::decode(coord, &vec![0u8; CHUNK_BYTES - 2]).is_none());
        assert!(Chunk::decode(coord, &vec![0u8; CHUNK_BYTES + 2]).is_none());
    }

    #[test]
    fn test_unknown_code_rejected() {
        let mut bytes = vec![0u8; CHUNK_BYTES];
        bytes[0] = 0xFF;
        assert!(Chunk::decode(ChunkCoord::new(0, 0), &bytes).is_none());
    }
}
