//! Chunk payload encoding for `chunk_data`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use terra_procedural::Chunk;
use terra_shared::ChunkCoord;

/// Base64 of the chunk's little-endian `u16` block buffer.
#[must_use]
pub fn encode_chunk_blocks(chunk: &Chunk) -> String {
    STANDARD.encode(chunk.encode())
}

/// Inverse of [`encode_chunk_blocks`]. `None` on bad base64, wrong length or
/// unknown block codes.
#[must_use]
pub fn decode_chunk_blocks(coord: ChunkCoord, encoded: &str) -> Option<Chunk> {
    let bytes = STANDARD.decode(encoded).ok()?;
    Chunk::decode(coord, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_procedural::{TerrainGenerator, WorldSeed};
    use terra_shared::Block;

    #[test]
    fn test_generated_chunk_survives_the_wire() {
        let generator = TerrainGenerator::new(WorldSeed::new(42));
        let mut chunk = generator.generate(ChunkCoord::new(-3, 5));
        chunk.set_block(7, 90, 7, Block::Planks);

        let encoded = encode_chunk_blocks(&chunk);
        let decoded = decode_chunk_blocks(chunk.coord, &encoded).unwrap();
        assert_eq!(decoded.codes(), chunk.codes());
        assert!(!decoded.dirty);
    }

    #[test]
    fn test_rejects_garbage() {
        let coord = ChunkCoord::new(0, 0);
        assert!(decode_chunk_blocks(coord, "not base64!").is_none());
        assert!(decode_chunk_blocks(coord, &STANDARD.encode([0u8; 10])).is_none());

        let mut bytes = Chunk::new(coord).encode();
        bytes[0] = 0xFF;
        assert!(decode_chunk_blocks(coord, &STANDARD.encode(bytes)).is_none());
    }
}
