//! # Player & World Records
//!
//! JSON documents stored next to chunk buffers in the same
//! [`KeyValueStore`]. Unreadable or malformed records are logged and
//! treated as absent; the caller falls back to a fresh spawn or the
//! configured seed.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use terra_economy::Hotbar;
use terra_procedural::{KeyValueStore, StorageError, StorageResult};
use terra_shared::{Vec3, MAX_HEALTH};

/// Key of the world metadata record.
pub const WORLD_META_KEY: &str = "world:meta";

/// Storage key for a player's record.
#[must_use]
pub fn player_key(nickname: &str) -> String {
    format!("player:{nickname}")
}

/// A player's persisted state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Sanitized nickname (also the key).
    pub nickname: String,
    /// Feet position.
    pub position: Vec3,
    /// Velocity at save time.
    #[serde(default)]
    pub velocity: Vec3,
    /// Heading in degrees.
    pub yaw: f32,
    /// Look pitch in degrees.
    pub pitch: f32,
    /// Health at save time.
    pub health: f32,
    /// Hotbar contents.
    pub hotbar: Hotbar,
}

impl PlayerRecord {
    /// Checks the record can be restored as-is.
    fn is_sane(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.yaw.is_finite()
            && self.pitch.is_finite()
            && self.health.is_finite()
            && Hotbar::from_slots(*self.hotbar.slots(), self.hotbar.selected()).is_ok()
    }

    /// Health to restore with: dead records come back at full health.
    #[must_use]
    pub fn restored_health(&self) -> f32 {
        if self.health <= 0.0 {
            MAX_HEALTH
        } else {
            self.health.min(MAX_HEALTH)
        }
    }
}

/// World-level metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldMeta {
    /// Seed the saved chunks were generated with.
    pub seed: u64,
}

fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let bytes = match store.get(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "record unreadable, treating as absent");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "record corrupt, treating as absent");
            None
        }
    }
}

fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| StorageError::Corrupt {
        key: key.to_owned(),
        reason: e.to_string(),
    })?;
    store.put(key, &bytes)
}

/// Loads a player's record, if a usable one exists.
#[must_use]
pub fn load_player(store: &dyn KeyValueStore, nickname: &str) -> Option<PlayerRecord> {
    let key = player_key(nickname);
    let record: PlayerRecord = load_json(store, &key)?;
    if record.is_sane() {
        Some(record)
    } else {
        warn!(%key, "player record out of range, treating as absent");
        None
    }
}

/// Saves a player's record under its nickname.
///
/// # Errors
///
/// Returns an error if the store rejects the write.
pub fn save_player(store: &dyn KeyValueStore, record: &PlayerRecord) -> StorageResult<()> {
    save_json(store, &player_key(&record.nickname), record)
}

/// Loads the world metadata, if a usable record exists.
#[must_use]
pub fn load_world_meta(store: &dyn KeyValueStore) -> Option<WorldMeta> {
    load_json(store, WORLD_META_KEY)
}

/// Saves the world metadata.
///
/// # Errors
///
/// Returns an error if the store rejects the write.
pub fn save_world_meta(store: &dyn KeyValueStore, meta: &WorldMeta) -> StorageResult<()> {
    save_json(store, WORLD_META_KEY, meta)
}
