// Configuration management for plaque
// Handles loading/saving settings, with sensible defaults when config is missing.
// A loaded Config is validated once at startup and then passed around by value;
// nothing reads it from a global.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::library::Library;
use crate::queue::QueueStore;

const APP_DIR: &str = "plaque";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("library root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("queue file could not be created at {path}: {source}")]
    Queue {
        path: PathBuf,
        #[source]
        source: crate::queue::QueueError,
    },
    #[error("discogs key looks invalid (entropy score {score} < 200)")]
    SuspiciousKey { score: usize },
    #[error("sample size must be positive")]
    EmptySample,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub library: LibraryConfig,
    pub player: PlayerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub discogs: DiscogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub root: PathBuf,
    pub queue: PathBuf,
    #[serde(default = "default_sample")]
    pub sample: usize,
    #[serde(default = "default_seed")]
    pub seed: usize, // entries written when the queue file has to be created
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub command: String,
    pub args: String,
    pub watch_later_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>, // run (and waited for) before every playback
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub bigram_threshold: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscogsConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub max_results: usize,
    #[serde(default)]
    pub prune_on_lowest_rating: bool,
}

fn default_sample() -> usize {
    5
}

fn default_seed() -> usize {
    1000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bigram_threshold: 10_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let state_dir = dirs::state_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            library: LibraryConfig {
                root: dirs::audio_dir().unwrap_or_else(|| PathBuf::from("~/Music")),
                queue: PathBuf::from("queue.txt"),
                sample: default_sample(),
                seed: default_seed(),
            },
            player: PlayerConfig {
                command: "mpv".to_string(),
                args: "--mute=no --no-audio-display --pause=no --start=0%".to_string(),
                // https://mpv.io/manual/master/#options-watch-later-dir
                watch_later_dir: state_dir.join("mpv").join("watch_later"),
                before: None,
            },
            search: SearchConfig::default(),
            discogs: DiscogsConfig {
                max_results: 10,
                ..DiscogsConfig::default()
            },
        }
    }
}

impl Config {
    /// Load the config from `path` (or the default location), writing the
    /// defaults first if nothing exists yet.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("failed to parse {}", config_path.display()))?;
            config.anchor(config_path.parent());
            Ok(config)
        } else {
            let mut config = Config::default();
            config.save_to(&config_path)?;
            info!("Wrote default config to {}", config_path.display());
            config.anchor(config_path.parent());
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join(APP_DIR);

        Ok(config_dir.join(CONFIG_FILE))
    }

    // `~` expansion, and relative queue paths live next to the config file
    fn anchor(&mut self, base: Option<&Path>) {
        self.library.root = expand_home(&self.library.root);
        self.library.queue = expand_home(&self.library.queue);
        self.player.watch_later_dir = expand_home(&self.player.watch_later_dir);

        if self.library.queue.is_relative() {
            if let Some(base) = base {
                self.library.queue = base.join(&self.library.queue);
            }
        }
    }

    /// Startup checks. Anything that fails here is fatal; no partial
    /// operation is attempted with a broken configuration.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if !self.library.root.is_dir() {
            return Err(ConfigError::InvalidRoot(self.library.root));
        }
        if self.library.sample == 0 {
            return Err(ConfigError::EmptySample);
        }

        if !self.library.queue.exists() {
            let store = QueueStore::new(self.library.queue.clone());
            let library = Library::new(self.library.root.clone());
            let written = store
                .seed(&library, self.library.seed)
                .map_err(|source| ConfigError::Queue {
                    path: self.library.queue.clone(),
                    source,
                })?;
            warn!(
                "Queue file missing, seeded {} with {} albums",
                self.library.queue.display(),
                written
            );
        }

        if self.discogs.max_results == 0 {
            self.discogs.max_results = 10;
        }

        if !self.discogs.key.is_empty() {
            let score = key_entropy_score(&self.discogs.key);
            if score < 200 {
                return Err(ConfigError::SuspiciousKey { score });
            }
        }

        Ok(self)
    }

    pub fn discogs_enabled(&self) -> bool {
        !self.discogs.key.is_empty() && !self.discogs.username.is_empty()
    }

    /// Name the player process shows up as in the process table.
    pub fn player_process_name(&self) -> String {
        Path::new(&self.player.command)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.player.command.clone())
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

// Shannon entropy (bits per char, rounded up) times length. A real token is
// 40 random characters; a placeholder like "changeme" scores far lower.
fn key_entropy_score(key: &str) -> usize {
    let len = key.chars().count();
    let mut freq = std::collections::HashMap::new();
    for c in key.chars() {
        *freq.entry(c).or_insert(0usize) += 1;
    }

    let entropy: f64 = freq
        .values()
        .map(|&count| {
            let f = count as f64 / len as f64;
            -f * f.log2()
        })
        .sum();

    entropy.ceil() as usize * len
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_writes_defaults_when_missing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let config = Config::load(Some(&path)).expect("load");
        assert!(path.exists());
        assert_eq!(config.player.command, "mpv");
        // relative queue path is anchored next to the config file
        assert_eq!(config.library.queue, dir.path().join("queue.txt"));
    }

    #[test]
    fn validate_rejects_missing_root() {
        let dir = tempdir().expect("tempdir");
        let mut config = Config::default();
        config.library.root = dir.path().join("nope");
        config.library.queue = dir.path().join("queue.txt");

        assert!(matches!(config.validate(), Err(ConfigError::InvalidRoot(_))));
    }

    #[test]
    fn validate_seeds_missing_queue() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("lib");
        fs::create_dir_all(root.join("A").join("One (1999)")).unwrap();
        fs::create_dir_all(root.join("B").join("Two")).unwrap();

        let mut config = Config::default();
        config.library.root = root;
        config.library.queue = dir.path().join("queue.txt");

        let config = config.validate().expect("valid");
        let content = fs::read_to_string(&config.library.queue).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn placeholder_key_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let mut config = Config::default();
        config.library.root = dir.path().to_path_buf();
        config.library.queue = dir.path().join("queue.txt");
        fs::write(&config.library.queue, "").unwrap();
        config.discogs.key = "changeme".to_string();

        assert!(matches!(config.validate(), Err(ConfigError::SuspiciousKey { .. })));
    }

    #[test]
    fn random_looking_key_passes_entropy_check() {
        let key = "qWeRtYuIoPaSdFgHjKlZxCvBnM1234567890abcd";
        assert!(key_entropy_score(key) >= 200);
    }
}
