//! # World Store
//!
//! Resident chunks for one session (client or server), keyed by
//! [`ChunkCoord`]. A chunk is present iff it was generated or loaded and not
//! yet evicted.
//!
//! ## Mesh-dirty propagation
//!
//! Visibility at a shared face depends on both chunks, so:
//!
//! ```text
//!   write at lx == 0        -> (cx-1, cz) mesh-dirty
//!   write at lx == W-1      -> (cx+1, cz) mesh-dirty
//!   write at lz == 0 / W-1  -> (cx, cz-1) / (cx, cz+1) mesh-dirty
//!   insert / remove chunk   -> all four cardinal neighbors mesh-dirty
//! ```

use std::collections::HashMap;

use terra_shared::{world_to_chunk_local, Block, ChunkCoord, CHUNK_HEIGHT_I32, CHUNK_SIZE};

use crate::chunk::Chunk;

/// Map of resident chunks.
#[derive(Debug, Default)]
pub struct WorldStore {
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl WorldStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident chunks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when no chunk is resident.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Whether a chunk is resident.
    #[inline]
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Borrow a resident chunk.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Mutably borrow a resident chunk.
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Coordinates of every resident chunk.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Iterates resident chunks.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Iterates resident chunks mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    /// Inserts a chunk, replacing any previous one at the same coordinate,
    /// and flags its neighbors for remesh.
    pub fn insert_chunk(&mut self, mut chunk: Chunk) -> Option<Chunk> {
        let coord = chunk.coord;
        chunk.mesh_dirty = true;
        let previous = self.chunks.insert(coord, chunk);
        self.mark_neighbors(coord);
        previous
    }

    /// Removes a chunk and flags its neighbors for remesh.
    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        let removed = self.chunks.remove(&coord);
        if removed.is_some() {
            self.mark_neighbors(coord);
        }
        removed
    }

    fn mark_neighbors(&mut self, coord: ChunkCoord) {
        for neighbor in coord.neighbors() {
            self.mark_mesh_dirty(neighbor);
        }
    }

    /// Flags a resident chunk for remesh. Missing chunks are ignored.
    pub fn mark_mesh_dirty(&mut self, coord: ChunkCoord) {
        if let Some(chunk) = self.chunks.get_mut(&coord) {
            chunk.mesh_dirty = true;
        }
    }

    /// Block at a world cell. Non-resident chunks and out-of-range heights
    /// read as air.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Block {
        if !(0..CHUNK_HEIGHT_I32).contains(&y) {
            return Block::Air;
        }
        let local = world_to_chunk_local(x, z);
        self.chunks
            .get(&local.chunk)
            .map_or(Block::Air, |chunk| chunk.get_block(local.lx, y as usize, local.lz))
    }

    /// Writes a world cell.
    ///
    /// Returns `false` (and changes nothing) when the owning chunk is not
    /// resident, `y` is out of range, or the cell already holds `block`.
    /// Border writes flag the adjacent chunk for remesh.
    #[allow(clippy::cast_sign_loss)]
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> bool {
        if !(0..CHUNK_HEIGHT_I32).contains(&y) {
            return false;
        }
        let local = world_to_chunk_local(x, z);
        let Some(chunk) = self.chunks.get_mut(&local.chunk) else {
            return false;
        };
        if !chunk.set_block(local.lx, y as usize, local.lz, block) {
            return false;
        }

        let c = local.chunk;
        if local.lx == 0 {
            self.mark_mesh_dirty(ChunkCoord::new(c.x - 1, c.z));
        }
        if local.lx == CHUNK_SIZE - 1 {
            self.mark_mesh_dirty(ChunkCoord::new(c.x + 1, c.z));
        }
        if local.lz == 0 {
            self.mark_mesh_dirty(ChunkCoord::new(c.x, c.z - 1));
        }
        if local.lz == CHUNK_SIZE - 1 {
            self.mark_mesh_dirty(ChunkCoord::new(c.x, c.z + 1));
        }
        true
    }

    /// Highest solid world Y in a column, if its chunk is resident.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn highest_solid_y(&self, x: i32, z: i32) -> Option<i32> {
        let local = world_to_chunk_local(x, z);
        let chunk = self.chunks.get(&local.chunk)?;
        chunk.highest_solid(local.lx, local.lz).map(|y| y as i32)
    }

    /// Returns and clears the set of chunks that need remeshing.
    ///
    /// This is the renderer's hook; order is unspecified.
    pub fn take_mesh_dirty(&mut self) -> Vec<ChunkCoord> {
        self.chunks
            .values_mut()
            .filter(|chunk| chunk.mesh_dirty)
            .map(|chunk| {
                chunk.mesh_dirty = false;
                chunk.coord
            })
            .collect()
    }

    /// Coordinates of chunks with unsaved edits.
    #[must_use]
    pub fn dirty_coords(&self) -> Vec<ChunkCoord> {
        self.chunks.values().filter(|c| c.dirty).map(|c| c.coord).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(coords: &[(i32, i32)]) -> WorldStore {
        let mut store = WorldStore::new();
        for &(x, z) in coords {
            store.insert_chunk(Chunk::new(ChunkCoord::new(x, z)));
        }
        store.take_mesh_dirty();
        store
    }

    #[test]
    fn test_border_write_marks_neighbor() {
        let mut store = store_with(&[(2, 3), (1, 3), (3, 3), (2, 2), (2, 4)]);

        // local (0, y, 5) in chunk (2,3) is world (32, y, 53)
        assert!(store.set_block(32, 40, 53, Block::Stone));

        let mut dirty = store.take_mesh_dirty();
        dirty.sort();
        assert_eq!(dirty, vec![ChunkCoord::new(1, 3), ChunkCoord::new(2, 3)]);
        assert!(!store.chunk(ChunkCoord::new(1, 3)).unwrap().dirty);
    }

    #[test]
    fn test_corner_write_marks_two_neighbors() {
        let mut store = store_with(&[(0, 0), (-1, 0), (0, -1), (1, 0), (0, 1)]);
        assert!(store.set_block(0, 10, 0, Block::Dirt));
        let mut dirty = store.take_mesh_dirty();
        dirty.sort();
        assert_eq!(
            dirty,
            vec![ChunkCoord::new(-1, 0), ChunkCoord::new(0, -1), ChunkCoord::new(0, 0)]
        );
    }

    #[test]
    fn test_interior_write_marks_only_self() {
        let mut store = store_with(&[(0, 0), (-1, 0), (1, 0)]);
        assert!(store.set_block(7, 10, 7, Block::Dirt));
        assert_eq!(store.take_mesh_dirty(), vec![ChunkCoord::new(0, 0)]);
    }

    #[test]
    fn test_insert_and_remove_mark_neighbors() {
        let mut store = store_with(&[(0, 0), (1, 0), (5, 5)]);
        store.insert_chunk(Chunk::new(ChunkCoord::new(0, 1)));
        let mut dirty = store.take_mesh_dirty();
        dirty.sort();
        assert_eq!(dirty, vec![ChunkCoord::new(0, 0), ChunkCoord::new(0, 1)]);

        store.remove_chunk(ChunkCoord::new(0, 0));
        let mut dirty = store.take_mesh_dirty();
        dirty.sort();
        assert_eq!(dirty, vec![ChunkCoord::new(0, 1), ChunkCoord::new(1, 0)]);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut store = store_with(&[(-1, -1)]);
        assert!(store.set_block(-1, 5, -1, Block::Planks));
        assert_eq!(store.get_block(-1, 5, -1), Block::Planks);
        let chunk = store.chunk(ChunkCoord::new(-1, -1)).unwrap();
        assert_eq!(chunk.get_block(15, 5, 15), Block::Planks);
        assert!(chunk.dirty);
    }

    #[test]
    fn test_missing_chunk_and_bad_height() {
        let mut store = store_with(&[(0, 0)]);
        assert!(!store.set_block(100, 5, 100, Block::Stone));
        assert!(!store.set_block(0, -1, 0, Block::Stone));
        assert!(!store.set_block(0, 96, 0, Block::Stone));
        assert_eq!(store.get_block(100, 5, 100), Block::Air);
        assert!(store.dirty_coords().is_empty());
    }

    #[test]
    fn test_highest_solid() {
        let mut store = store_with(&[(0, 0)]);
        store.set_block(3, 12, 3, Block::Stone);
        assert_eq!(store.highest_solid_y(3, 3), Some(12));
        assert_eq!(store.highest_solid_y(4, 4), None);
        assert_eq!(store.highest_solid_y(300, 4), None);
    }
}
