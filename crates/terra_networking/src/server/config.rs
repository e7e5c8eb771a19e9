//! # Server Configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then `TERRA_*`
//! environment variables. The result is validated once at startup.
//!
//! ```toml
//! port = 7777
//! room_code = "lobby"
//! max_players = 8
//! seed = 42
//! data_dir = "data"
//! view_distance = 4
//! recipes = "recipes.toml"  # optional, replaces the builtin table
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use terra_economy::{EconomyError, RecipeBook};
use terra_shared::{MAX_PLAYERS, SERVER_PORT, TICK_RATE};

use crate::protocol::{MAX_ROOM_CODE_CHARS, MAX_VIEW_DISTANCE};

/// Configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Cause.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`ServerConfig`].
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    Env {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
    /// The recipe table could not be loaded.
    #[error("invalid recipe table {path}: {source}")]
    Recipes {
        /// File path.
        path: PathBuf,
        /// Cause.
        #[source]
        source: EconomyError,
    },
    /// A value is out of its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why.
        reason: &'static str,
    },
}

/// Server settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub port: u16,
    /// Room code clients must present.
    pub room_code: String,
    /// Player cap.
    pub max_players: usize,
    /// World seed for a fresh data directory.
    pub seed: u64,
    /// Directory of the file store.
    pub data_dir: PathBuf,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Broadcast a snapshot every this many ticks.
    pub snapshot_divisor: u32,
    /// Chunk radius streamed to each player.
    pub view_distance: i32,
    /// Seconds between autosaves.
    pub autosave_secs: u32,
    /// TOML recipe table; the builtin recipes when unset.
    pub recipes: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: SERVER_PORT,
            room_code: "lobby".to_owned(),
            max_players: MAX_PLAYERS,
            seed: 42,
            data_dir: PathBuf::from("data"),
            tick_rate: TICK_RATE,
            snapshot_divisor: 2,
            view_distance: 4,
            autosave_secs: 30,
            recipes: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env { key, value })
}

impl ServerConfig {
    /// Defaults, then `path` (if any), then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error for an unreadable or invalid file, a malformed
    /// environment override, or an out-of-range value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `TERRA_*` overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Env` for a value that does not parse.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("TERRA_PORT") {
            self.port = parse_env("TERRA_PORT", v)?;
        }
        if let Some(v) = lookup("TERRA_ROOM_CODE") {
            self.room_code = v;
        }
        if let Some(v) = lookup("TERRA_MAX_PLAYERS") {
            self.max_players = parse_env("TERRA_MAX_PLAYERS", v)?;
        }
        if let Some(v) = lookup("TERRA_SEED") {
            self.seed = parse_env("TERRA_SEED", v)?;
        }
        if let Some(v) = lookup("TERRA_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TERRA_RECIPES") {
            self.recipes = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for the first out-of-range field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.room_code.chars().count() > MAX_ROOM_CODE_CHARS {
            return invalid("room_code", "longer than 32 characters");
        }
        if self.max_players == 0 {
            return invalid("max_players", "must be at least 1");
        }
        if !(1..=1000).contains(&self.tick_rate) {
            return invalid("tick_rate", "must be 1..=1000");
        }
        if self.snapshot_divisor == 0 {
            return invalid("snapshot_divisor", "must be at least 1");
        }
        if !(1..=MAX_VIEW_DISTANCE).contains(&self.view_distance) {
            return invalid("view_distance", "must be 1..=16");
        }
        if self.autosave_secs == 0 {
            return invalid("autosave_secs", "must be at least 1");
        }
        Ok(())
    }

    /// Loads the configured recipe table, or the builtin one.
    ///
    /// # Errors
    ///
    /// Returns `Io` for an unreadable file and `Recipes` for an invalid or
    /// cyclic table.
    pub fn recipe_book(&self) -> Result<RecipeBook, ConfigError> {
        let Some(path) = &self.recipes else {
            return Ok(RecipeBook::builtin());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        RecipeBook::from_toml_str(&text).map_err(|source| ConfigError::Recipes {
            path: path.clone(),
            source,
        })
    }

    /// Seconds of one tick.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Ticks between autosaves.
    #[must_use]
    pub fn autosave_ticks(&self) -> u64 {
        (u64::from(self.autosave_secs) * u64::from(self.tick_rate)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 7777);
        assert_eq!(config.room_code, "lobby");
        assert_eq!(config.max_players, 8);
        assert_eq!(config.autosave_ticks(), 600);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml_str("seed = 7\nroom_code = \"cave\"\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.room_code, "cave");
        assert_eq!(config.port, 7777);
        assert!(ServerConfig::from_toml_str("colour = \"red\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [("TERRA_PORT", "9000"), ("TERRA_SEED", "123"), ("TERRA_DATA_DIR", "/srv/terra")]
                .into_iter()
                .collect();
        let mut config = ServerConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_owned())).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.seed, 123);
        assert_eq!(config.data_dir, PathBuf::from("/srv/terra"));

        let err = config
            .apply_overrides(|k| (k == "TERRA_MAX_PLAYERS").then(|| "many".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key: "TERRA_MAX_PLAYERS", .. }));
    }

    fn scratch_file(name: &str, text: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("terra_{}_{name}", std::process::id()));
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_recipe_table_from_config() {
        assert_eq!(
            ServerConfig::default().recipe_book().unwrap().len(),
            RecipeBook::builtin().len()
        );

        let path = scratch_file(
            "recipes.toml",
            "[[recipe]]\nid = \"cobble_to_stone\"\ninputs = [{ item = \"cobblestone\", count = 2 }]\noutputs = [{ item = \"stone\", count = 1 }]\n",
        );
        let config = ServerConfig { recipes: Some(path.clone()), ..ServerConfig::default() };
        let book = config.recipe_book().unwrap();
        assert_eq!(book.len(), 1);
        assert!(book.get("cobble_to_stone").is_some());
        fs::remove_file(&path).unwrap();

        let broken = scratch_file("broken.toml", "[[recipe]]\nid = 3\n");
        let config = ServerConfig { recipes: Some(broken.clone()), ..ServerConfig::default() };
        assert!(matches!(config.recipe_book(), Err(ConfigError::Recipes { .. })));
        fs::remove_file(&broken).unwrap();

        let missing = ServerConfig::from_toml_str("recipes = \"/nonexistent/terra_recipes.toml\"").unwrap();
        assert!(matches!(missing.recipe_book(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validation() {
        let config = ServerConfig { max_players: 0, ..ServerConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "max_players", .. })));
        let config = ServerConfig { view_distance: 40, ..ServerConfig::default() };
        assert!(config.validate().is_err());
    }
}
