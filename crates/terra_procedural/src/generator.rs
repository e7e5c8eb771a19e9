//! # Terrain Generator
//!
//! `generate(coord)` is a pure function of `(seed, cx, cz)`. A client that
//! regenerates a chunk locally gets byte-identical data to the server.
//!
//! ## Passes
//!
//! ```text
//!   1. columns   height = base(4 oct) + detail(2 oct), clamped
//!                bedrock | stone | 4-cell cap | water to sea level | air
//!   2. caves     3-D noise (3 oct) > threshold, below the cap only
//!   3. trees     hash(x, z) placement on interior columns,
//!                Manhattan-radius canopy, never overwrites
//! ```

use terra_shared::{Block, ChunkCoord, CHUNK_HEIGHT, CHUNK_HEIGHT_I32, CHUNK_SIZE, SEA_LEVEL};

use crate::chunk::Chunk;
use crate::noise::{hash3, NoiseField, ValueNoise, WorldSeed};

/// Chunk generator using procedural noise.
#[derive(Clone, Copy, Debug)]
pub struct TerrainGenerator {
    seed: WorldSeed,
    /// Broad elevation.
    base: ValueNoise,
    /// Fine elevation.
    detail: ValueNoise,
    /// Cave density.
    cave: ValueNoise,
    /// Tree placement hash seed.
    tree_seed: u64,
}

impl TerrainGenerator {
    /// Mean surface height.
    pub const BASE_HEIGHT: f64 = 34.0;
    /// Base field amplitude, in blocks.
    pub const BASE_AMPLITUDE: f64 = 14.0;
    /// Detail field amplitude, in blocks.
    pub const DETAIL_AMPLITUDE: f64 = 4.0;
    /// Lowest allowed surface.
    pub const MIN_SURFACE: i32 = 8;
    /// Highest allowed surface, leaving headroom for trees.
    pub const MAX_SURFACE: i32 = CHUNK_HEIGHT_I32 - 16;
    /// Thickness of the soil/sand cap.
    pub const CAP_DEPTH: i32 = 4;
    /// Caves never reach at or below this height.
    pub const MIN_CAVE_Y: i32 = 4;
    /// Cave density above which a cell is carved.
    pub const CAVE_THRESHOLD: f64 = 0.68;
    /// Tree chance per interior grass column, in thousandths.
    pub const TREE_CHANCE_PER_MILLE: u64 = 8;
    /// Minimum trunk height.
    pub const TREE_MIN_HEIGHT: i32 = 4;
    /// Canopy Manhattan radius around the crown.
    pub const CANOPY_RADIUS: i32 = 2;

    /// Creates a new chunk generator.
    #[must_use]
    pub const fn new(seed: WorldSeed) -> Self {
        Self {
            seed,
            base: ValueNoise::for_field(seed, NoiseField::Base),
            detail: ValueNoise::for_field(seed, NoiseField::Detail),
            cave: ValueNoise::for_field(seed, NoiseField::Cave),
            tree_seed: seed.field(NoiseField::Tree),
        }
    }

    /// World seed this generator was built from.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// Surface height of a world column, before caves and trees.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let fx = f64::from(x);
        let fz = f64::from(z);
        let base = self.base.fractal2(fx / 96.0, fz / 96.0, 4, 0.5, 2.0);
        let detail = self.detail.fractal2(fx / 24.0, fz / 24.0, 2, 0.5, 2.0);
        let height = Self::BASE_HEIGHT + base * Self::BASE_AMPLITUDE + detail * Self::DETAIL_AMPLITUDE;
        (height.round() as i32).clamp(Self::MIN_SURFACE, Self::MAX_SURFACE)
    }

    /// Generates a chunk at the given coordinates.
    #[must_use]
    pub fn generate(&self, coord: ChunkCoord) -> Chunk {
        let mut chunk = Chunk::new(coord);
        let mut heights = [[0i32; CHUNK_SIZE]; CHUNK_SIZE];

        for (lz, row) in heights.iter_mut().enumerate() {
            for (lx, height) in row.iter_mut().enumerate() {
                let (wx, wz) = terra_shared::chunk_local_to_world(coord, lx, lz);
                *height = self.surface_height(wx, wz);
                self.generate_column(&mut chunk, lx, lz, *height);
                self.carve_caves(&mut chunk, lx, lz, wx, wz, *height);
            }
        }

        self.generate_trees(&mut chunk, &heights);
        chunk
    }

    /// Fills one column from bedrock to sky.
    #[allow(clippy::unused_self, clippy::cast_sign_loss)]
    fn generate_column(&self, chunk: &mut Chunk, lx: usize, lz: usize, height: i32) {
        let sandy = height <= SEA_LEVEL + 1;
        for y in 0..CHUNK_HEIGHT_I32 {
            let block = if y == 0 {
                Block::Bedrock
            } else if y <= height - Self::CAP_DEPTH {
                Block::Stone
            } else if y <= height {
                if sandy {
                    Block::Sand
                } else if y == height {
                    Block::Grass
                } else {
                    Block::Dirt
                }
            } else if y <= SEA_LEVEL {
                Block::Water
            } else {
                break;
            };
            chunk.put(lx, y as usize, lz, block);
        }
    }

    /// Carves caves between the minimum depth and the soil cap.
    #[allow(clippy::cast_sign_loss)]
    fn carve_caves(&self, chunk: &mut Chunk, lx: usize, lz: usize, wx: i32, wz: i32, height: i32) {
        let fx = f64::from(wx) / 16.0;
        let fz = f64::from(wz) / 16.0;
        for y in (Self::MIN_CAVE_Y + 1)..(height - Self::CAP_DEPTH) {
            let density = (self.cave.fractal3(fx, f64::from(y) / 16.0, fz, 3) + 1.0) * 0.5;
            if density > Self::CAVE_THRESHOLD {
                chunk.put(lx, y as usize, lz, Block::Air);
            }
        }
    }

    /// Places trees on interior columns so canopies stay inside the chunk.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn generate_trees(&self, chunk: &mut Chunk, heights: &[[i32; CHUNK_SIZE]; CHUNK_SIZE]) {
        let margin = Self::CANOPY_RADIUS as usize;
        for lz in margin..CHUNK_SIZE - margin {
            for lx in margin..CHUNK_SIZE - margin {
                let height = heights[lz][lx];
                if height <= SEA_LEVEL
                    || chunk.get_block(lx, height as usize, lz) != Block::Grass
                {
                    continue;
                }

                let (wx, wz) = terra_shared::chunk_local_to_world(chunk.coord, lx, lz);
                let hash = hash3(self.tree_seed, wx, 0, wz);
                if hash % 1000 >= Self::TREE_CHANCE_PER_MILLE {
                    continue;
                }

                let trunk = Self::TREE_MIN_HEIGHT + ((hash >> 16) % 3) as i32;
                if height + trunk + Self::CANOPY_RADIUS >= CHUNK_HEIGHT_I32 {
                    continue;
                }
                Self::place_tree(chunk, lx as i32, height + 1, lz as i32, trunk);
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn place_tree(chunk: &mut Chunk, x: i32, base_y: i32, z: i32, trunk: i32) {
        for y in base_y..base_y + trunk {
            if chunk.get_block(x as usize, y as usize, z as usize) == Block::Air {
                chunk.put(x as usize, y as usize, z as usize, Block::Log);
            }
        }

        let crown = base_y + trunk - 1;
        let r = Self::CANOPY_RADIUS;
        for dy in -r..=r {
            for dz in -r..=r {
                for dx in -r..=r {
                    if dx.abs() + dy.abs() + dz.abs() > r {
                        continue;
                    }
                    let (cx, cy, cz) = (x + dx, crown + dy, z + dz);
                    if cx < 0 || cy < 0 || cz < 0 {
                        continue;
                    }
                    let (cx, cy, cz) = (cx as usize, cy as usize, cz as usize);
                    if Chunk::index(cx, cy, cz).is_some() && chunk.get_block(cx, cy, cz) == Block::Air {
                        chunk.put(cx, cy, cz, Block::Leaves);
                    }
                }
            }
        }
    }
}
