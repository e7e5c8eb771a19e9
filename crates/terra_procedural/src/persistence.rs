//! # Chunk Persistence
//!
//! Durable storage is an external collaborator reached through the
//! [`KeyValueStore`] trait: `get`/`put` of byte blobs by string key.
//!
//! ## Keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `chunk:<cx>,<cz>` | raw LE `u16` block buffer |
//! | `player:<nickname>` | JSON player record |
//! | `world:meta` | JSON world metadata |
//!
//! ## Failure policy
//!
//! A blob that is present but malformed (wrong length, unknown codes, bad
//! compression) is reported as absent so the chunk is regenerated. A store
//! that cannot be *read* at all is an error and the load fails.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

use terra_shared::ChunkCoord;

use crate::chunk::Chunk;

/// Storage failure.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying I/O failed.
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Cause.
        #[source]
        source: std::io::Error,
    },
    /// Stored bytes could not be decoded.
    #[error("stored value for {key} is corrupt: {reason}")]
    Corrupt {
        /// Key being accessed.
        key: String,
        /// What was wrong.
        reason: String,
    },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte-blob store addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. `Ok(None)` when the key was never written.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error when the value could not be stored.
    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;
}

/// In-process store, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.entries.write().insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

/// One LZ4-compressed file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Directory holding the files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a key. Anything outside `[A-Za-z0-9_-]` is hex-escaped
    /// so distinct keys never collide.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 4);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        name.push_str(".lz4");
        self.root.join(name)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let compressed = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Io { key: key.to_owned(), source });
            }
        };
        decompress_size_prepended(&compressed)
            .map(Some)
            .map_err(|e| StorageError::Corrupt { key: key.to_owned(), reason: e.to_string() })
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("lz4.tmp");
        let io = |source| StorageError::Io { key: key.to_owned(), source };
        fs::write(&tmp, compress_prepend_size(value)).map_err(io)?;
        fs::rename(&tmp, &path).map_err(io)
    }
}

/// Persists a chunk's block buffer.
///
/// # Errors
///
/// Returns an error if the store rejects the write.
pub fn save_chunk(store: &dyn KeyValueStore, chunk: &Chunk) -> StorageResult<()> {
    store.put(&chunk.coord.storage_key(), &chunk.encode())
}

/// Loads a persisted chunk.
///
/// `Ok(None)` means "generate it": nothing stored, or what is stored is
/// malformed.
///
/// # Errors
///
/// Returns an error only when the store itself cannot be read.
pub fn load_chunk(store: &dyn KeyValueStore, coord: ChunkCoord) -> StorageResult<Option<Chunk>> {
    let key = coord.storage_key();
    let bytes = match store.get(&key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Ok(None),
        Err(StorageError::Corrupt { reason, .. }) => {
            warn!(%coord, %reason, "discarding corrupt chunk blob");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let chunk = Chunk::decode(coord, &bytes);
    if chunk.is_none() {
        warn!(%coord, len = bytes.len(), "discarding malformed chunk buffer");
    }
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use terra_shared::Block;

    fn scratch_dir() -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("terra_store_{}_{id}", std::process::id()))
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());
        store.put("a", b"hello").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_chunk_round_trip() {
        let store = MemoryStore::new();
        let mut chunk = Chunk::new(ChunkCoord::new(4, -9));
        chunk.set_block(1, 2, 3, Block::Planks);
        save_chunk(&store, &chunk).unwrap();

        let loaded = load_chunk(&store, chunk.coord).unwrap().unwrap();
        assert_eq!(loaded.get_block(1, 2, 3), Block::Planks);
        assert!(!loaded.dirty);
    }

    #[test]
    fn test_wrong_size_is_absent() {
        let store = MemoryStore::new();
        let coord = ChunkCoord::new(0, 0);
        store.put(&coord.storage_key(), &[1, 2, 3]).unwrap();
        assert!(load_chunk(&store, coord).unwrap().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = scratch_dir();
        let store = FileStore::open(&dir).unwrap();

        let mut chunk = Chunk::new(ChunkCoord::new(-1, 2));
        chunk.set_block(0, 0, 0, Block::Bedrock);
        save_chunk(&store, &chunk).unwrap();
        store.put("player:alice", b"{}").unwrap();

        let reopened = FileStore::open(&dir).unwrap();
        let loaded = load_chunk(&reopened, chunk.coord).unwrap().unwrap();
        assert_eq!(loaded.codes(), chunk.codes());
        assert_eq!(reopened.get("player:alice").unwrap().as_deref(), Some(&b"{}"[..]));
        assert!(reopened.get("player:bob").unwrap().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_store_corrupt_file_is_absent_chunk() {
        let dir = scratch_dir();
        let store = FileStore::open(&dir).unwrap();
        let coord = ChunkCoord::new(9, 9);
        fs::write(store.path_for(&coord.storage_key()), b"\x10\x00\x00\x00\x00\x05\x00").unwrap();

        assert!(matches!(store.get(&coord.storage_key()), Err(StorageError::Corrupt { .. })));
        assert!(load_chunk(&store, coord).unwrap().is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_names_do_not_collide() {
        let store = FileStore { root: PathBuf::from("/data") };
        assert_ne!(store.path_for("chunk:1,2"), store.path_for("chunk_1_2"));
        assert_ne!(store.path_for("a%3A"), store.path_for("a:"));
    }
}
