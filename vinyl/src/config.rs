//! App configuration, one small JSON file read and written wholesale.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vinylcore::theme::DEFAULT_THEME;

fn default_theme() -> String {
    DEFAULT_THEME.to_string()
}

fn default_volume() -> f32 {
    1.0
}

fn default_download_covers() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_download_covers")]
    pub download_covers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            volume: default_volume(),
            download_covers: default_download_covers(),
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        vinylcore::storage::config_dir("vinyl").join("config.json")
    }

    pub fn load_from(path: &Path) -> Self {
        vinylcore::storage::load_json(path).unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) {
        if let Err(e) = vinylcore::storage::save_json(path, self) {
            log::error!("failed to save config: {e}");
        }
    }

    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn save(&self) {
        self.save_to(&Self::path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("vinyl-config-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("config.json")
    }

    #[test]
    fn test_round_trip() {
        let path = scratch_file("roundtrip");
        let config = Config {
            theme: "X".to_string(),
            volume: 0.7,
            download_covers: false,
        };
        config.save_to(&path);
        assert_eq!(Config::load_from(&path), config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = scratch_file("missing");
        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert_eq!(config.theme, DEFAULT_THEME);
        assert_eq!(config.volume, 1.0);
        assert!(config.download_covers);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_keys_backfilled() {
        let path = scratch_file("partial");
        std::fs::write(&path, r#"{ "volume": 0.25 }"#).unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.volume, 0.25);
        assert_eq!(config.theme, DEFAULT_THEME);
        assert!(config.download_covers);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
