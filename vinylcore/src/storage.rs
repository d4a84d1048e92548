//! Storage utilities for the vinyl player
//!
//! Data paths, wholesale JSON load/save, and the file browser state used
//! by the add-tracks dialog.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Config directory for the player (playlist, config and themes files).
pub fn config_dir(app_name: &str) -> PathBuf {
    directories::ProjectDirs::from("io", "vinylplayer", app_name)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Directory where downloaded tracks are stored.
pub fn downloads_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.audio_dir().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| config_dir("vinyl"))
        .join("vinyl")
}

/// Starting directory for the file browser.
pub fn music_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| {
            dirs.audio_dir()
                .or_else(|| Some(dirs.home_dir()))
                .map(|p| p.to_path_buf())
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Read an entire JSON file into a value.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Write a value to disk as pretty-printed UTF-8 JSON, creating parent
/// directories as needed. The file is rewritten wholesale.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
}

/// Simple file browser state for open dialogs.
#[derive(Debug, Clone)]
pub struct FileBrowser {
    pub current_dir: PathBuf,
    pub entries: Vec<FileEntry>,
    pub selected_index: Option<usize>,
    pub filter_extensions: Vec<String>,
}

impl FileBrowser {
    pub fn new(start_dir: PathBuf) -> Self {
        let mut browser = Self {
            current_dir: start_dir,
            entries: Vec::new(),
            selected_index: None,
            filter_extensions: Vec::new(),
        };
        browser.refresh();
        browser
    }

    pub fn with_filter(mut self, extensions: Vec<String>) -> Self {
        self.filter_extensions = extensions;
        self.refresh();
        self
    }

    /// Re-read the current directory. Hidden files are skipped, the
    /// extension filter applies to files only, and directories sort first.
    pub fn refresh(&mut self) {
        self.entries.clear();
        self.selected_index = None;

        if let Some(parent) = self.current_dir.parent() {
            self.entries.push(FileEntry {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                is_directory: true,
            });
        }

        let Ok(read_dir) = std::fs::read_dir(&self.current_dir) else {
            return;
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let is_directory = path.is_dir();
            if !is_directory && !self.matches_filter(&path) {
                continue;
            }
            let entry = FileEntry { name, path, is_directory };
            if is_directory {
                dirs.push(entry);
            } else {
                files.push(entry);
            }
        }

        dirs.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        files.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        self.entries.extend(dirs);
        self.entries.extend(files);
    }

    fn matches_filter(&self, path: &Path) -> bool {
        if self.filter_extensions.is_empty() {
            return true;
        }
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.filter_extensions.iter().any(|f| f.to_lowercase() == ext)
    }

    pub fn navigate_to(&mut self, path: PathBuf) {
        if path.is_dir() {
            self.current_dir = path;
            self.refresh();
        }
    }

    pub fn selected_entry(&self) -> Option<&FileEntry> {
        self.selected_index.and_then(|i| self.entries.get(i))
    }

    /// All non-directory entries in the current view.
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter().filter(|e| !e.is_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vinylcore-storage-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_json_round_trip() {
        let dir = scratch_dir("roundtrip");
        let path = dir.join("nested").join("sample.json");
        let value = Sample { name: "night".into(), count: 7 };

        save_json(&path, &value).unwrap();
        let loaded: Sample = load_json(&path).unwrap();
        assert_eq!(loaded, value);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let path = std::env::temp_dir().join("vinylcore-no-such-file.json");
        let result: Result<Sample> = load_json(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_browser_filters_and_sorts() {
        let dir = scratch_dir("browser");
        std::fs::create_dir(dir.join("b_dir")).unwrap();
        std::fs::create_dir(dir.join("a_dir")).unwrap();
        std::fs::write(dir.join("song.mp3"), b"x").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.join(".hidden.mp3"), b"x").unwrap();

        let browser = FileBrowser::new(dir.clone()).with_filter(vec!["mp3".into()]);
        let names: Vec<&str> = browser.entries.iter().map(|e| e.name.as_str()).collect();
        // Parent entry, directories sorted, then the one matching file.
        assert_eq!(names, vec!["..", "a_dir", "b_dir", "song.mp3"]);
        assert_eq!(browser.files().count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
