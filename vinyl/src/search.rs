//! Online search, preview and download via the yt-dlp subprocess.
//!
//! Every network-bound operation runs on a fire-and-forget worker
//! thread and reports back through an mpsc channel that the UI thread
//! drains once per frame. There is no cancellation; a started download
//! runs to completion or failure.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::Sender;

/// Search prefixes handed to yt-dlp, seven results per source.
const SOURCES: [(&str, SearchSource); 2] = [
    ("ytsearch7", SearchSource::YouTube),
    ("scsearch7", SearchSource::SoundCloud),
];

const COVER_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

fn ytdlp_binary() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchSource {
    YouTube,
    SoundCloud,
}

impl SearchSource {
    pub fn label(&self) -> &'static str {
        match self {
            SearchSource::YouTube => "YouTube",
            SearchSource::SoundCloud => "SoundCloud",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub duration: f64,
    pub uploader: String,
    pub thumbnail: Option<String>,
    pub source: SearchSource,
}

/// Everything the workers report back to the UI thread.
pub enum SearchEvent {
    Results(Vec<SearchResult>),
    SearchFailed(String),
    Thumbnail { url: String, bytes: Vec<u8> },
    PreviewReady { result: SearchResult, path: PathBuf },
    PreviewFailed(String),
    Downloaded { url: String, path: PathBuf, cover: Option<PathBuf> },
    DownloadFailed { url: String, error: String },
}

/// Parse one `--dump-json` line from a flat search. Entries without a
/// title or URL are dropped. YouTube entries often lack a thumbnail in
/// flat mode, so one is derived from the video id.
pub fn parse_entry(value: &Value, source: SearchSource) -> Option<SearchResult> {
    let title = value.get("title").and_then(Value::as_str)?.trim();
    if title.is_empty() {
        return None;
    }
    let url = value
        .get("url")
        .or_else(|| value.get("webpage_url"))
        .and_then(Value::as_str)?
        .to_string();

    let duration = value.get("duration").and_then(Value::as_f64).unwrap_or(0.0);
    let uploader = value
        .get("uploader")
        .or_else(|| value.get("channel"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let mut thumbnail = value
        .get("thumbnail")
        .and_then(Value::as_str)
        .map(str::to_string);
    if thumbnail.is_none() && source == SearchSource::YouTube {
        if let Some(id) = value.get("id").and_then(Value::as_str) {
            thumbnail = Some(format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg"));
        }
    }

    Some(SearchResult {
        title: title.to_string(),
        url,
        duration,
        uploader,
        thumbnail,
        source,
    })
}

fn search_one_source(query: &str, prefix: &str, source: SearchSource) -> Vec<SearchResult> {
    let output = Command::new(ytdlp_binary())
        .arg("--dump-json")
        .arg("--flat-playlist")
        .arg("--skip-download")
        .arg(format!("{prefix}:{query}"))
        .output();

    let output = match output {
        Ok(out) => out,
        Err(e) => {
            log::warn!("yt-dlp not runnable: {e}");
            return Vec::new();
        }
    };
    if !output.status.success() {
        log::warn!(
            "{} search failed: {}",
            source.label(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Vec::new();
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|value| parse_entry(&value, source))
        .collect()
}

/// Query both sources in parallel and send the combined result list.
pub fn spawn_search(query: String, tx: Sender<SearchEvent>) {
    std::thread::spawn(move || {
        let handles: Vec<_> = SOURCES
            .iter()
            .map(|&(prefix, source)| {
                let query = query.clone();
                std::thread::spawn(move || search_one_source(&query, prefix, source))
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            if let Ok(mut part) = handle.join() {
                results.append(&mut part);
            }
        }
        let event = if results.is_empty() {
            SearchEvent::SearchFailed("no results".to_string())
        } else {
            SearchEvent::Results(results)
        };
        let _ = tx.send(event);
    });
}

/// Fetch a thumbnail image for display next to a search result.
pub fn spawn_thumbnail(url: String, tx: Sender<SearchEvent>) {
    std::thread::spawn(move || {
        let fetched = reqwest::blocking::get(&url).and_then(|r| r.error_for_status());
        match fetched.and_then(|r| r.bytes()) {
            Ok(bytes) => {
                let _ = tx.send(SearchEvent::Thumbnail { url, bytes: bytes.to_vec() });
            }
            Err(e) => log::warn!("thumbnail fetch failed: {e}"),
        }
    });
}

/// Download the best audio stream to a temp file for preview playback.
pub fn spawn_preview(result: SearchResult, tx: Sender<SearchEvent>) {
    std::thread::spawn(move || {
        let dir = std::env::temp_dir().join("vinyl-preview");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            let _ = tx.send(SearchEvent::PreviewFailed(format!("temp dir: {e}")));
            return;
        }
        let template = dir.join("%(id)s.%(ext)s");

        let output = Command::new(ytdlp_binary())
            .arg("-f")
            .arg("bestaudio/best")
            .arg("--no-playlist")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(&template)
            .arg(&result.url)
            .output();

        let event = match output {
            Ok(out) if out.status.success() => {
                let path = last_stdout_path(&out.stdout);
                match path {
                    Some(path) => SearchEvent::PreviewReady { result, path },
                    None => SearchEvent::PreviewFailed("no file produced".to_string()),
                }
            }
            Ok(out) => SearchEvent::PreviewFailed(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ),
            Err(e) => SearchEvent::PreviewFailed(format!("yt-dlp: {e}")),
        };
        let _ = tx.send(event);
    });
}

/// Download a track as a 192K mp3 into `dest_dir`, optionally with its
/// thumbnail saved alongside for use as a cover image.
pub fn spawn_download(
    result: SearchResult,
    dest_dir: PathBuf,
    download_cover: bool,
    tx: Sender<SearchEvent>,
) {
    std::thread::spawn(move || {
        if let Err(e) = std::fs::create_dir_all(&dest_dir) {
            let _ = tx.send(SearchEvent::DownloadFailed {
                url: result.url,
                error: format!("downloads dir: {e}"),
            });
            return;
        }
        let template = dest_dir.join("%(title)s.%(ext)s");

        let mut command = Command::new(ytdlp_binary());
        command
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--audio-quality")
            .arg("192K")
            .arg("--no-playlist")
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("-o")
            .arg(&template);
        if download_cover {
            command.arg("--write-thumbnail");
        }
        command.arg(&result.url);

        let event = match command.output() {
            Ok(out) if out.status.success() => match last_stdout_path(&out.stdout) {
                Some(path) if path.exists() => {
                    let cover = if download_cover { find_cover_for(&path) } else { None };
                    SearchEvent::Downloaded { url: result.url, path, cover }
                }
                _ => SearchEvent::DownloadFailed {
                    url: result.url,
                    error: "file missing after conversion".to_string(),
                },
            },
            Ok(out) => SearchEvent::DownloadFailed {
                url: result.url,
                error: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            },
            Err(e) => SearchEvent::DownloadFailed {
                url: result.url,
                error: format!("yt-dlp: {e}"),
            },
        };
        let _ = tx.send(event);
    });
}

fn last_stdout_path(stdout: &[u8]) -> Option<PathBuf> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(PathBuf::from)
}

/// Look for an image written next to the audio file, same stem.
pub fn find_cover_for(audio_path: &Path) -> Option<PathBuf> {
    for ext in COVER_EXTENSIONS {
        let candidate = audio_path.with_extension(ext);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_entry() {
        let value = json!({
            "title": "Some Song",
            "url": "https://soundcloud.com/a/b",
            "duration": 215.0,
            "uploader": "someone",
            "thumbnail": "https://img.example/t.jpg"
        });
        let result = parse_entry(&value, SearchSource::SoundCloud).unwrap();
        assert_eq!(result.title, "Some Song");
        assert_eq!(result.duration, 215.0);
        assert_eq!(result.uploader, "someone");
        assert_eq!(result.thumbnail.as_deref(), Some("https://img.example/t.jpg"));
    }

    #[test]
    fn test_parse_requires_title_and_url() {
        let no_title = json!({ "url": "https://x" });
        assert!(parse_entry(&no_title, SearchSource::YouTube).is_none());

        let blank_title = json!({ "title": "  ", "url": "https://x" });
        assert!(parse_entry(&blank_title, SearchSource::YouTube).is_none());

        let no_url = json!({ "title": "t" });
        assert!(parse_entry(&no_url, SearchSource::YouTube).is_none());
    }

    #[test]
    fn test_youtube_thumbnail_derived_from_id() {
        let value = json!({
            "title": "clip",
            "url": "https://youtube.com/watch?v=abc123",
            "id": "abc123"
        });
        let result = parse_entry(&value, SearchSource::YouTube).unwrap();
        assert_eq!(
            result.thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/abc123/mqdefault.jpg")
        );

        // SoundCloud entries get no derived thumbnail.
        let result = parse_entry(&value, SearchSource::SoundCloud).unwrap();
        assert!(result.thumbnail.is_none());
    }

    #[test]
    fn test_missing_fields_defaulted() {
        let value = json!({ "title": "t", "url": "https://x" });
        let result = parse_entry(&value, SearchSource::SoundCloud).unwrap();
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.uploader, "unknown");
    }

    #[test]
    fn test_find_cover_prefers_listed_extension_order() {
        let dir = std::env::temp_dir().join(format!("vinyl-cover-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let audio = dir.join("song.mp3");
        std::fs::write(&audio, b"x").unwrap();

        assert_eq!(find_cover_for(&audio), None);

        std::fs::write(dir.join("song.webp"), b"x").unwrap();
        assert_eq!(find_cover_for(&audio), Some(dir.join("song.webp")));

        std::fs::write(dir.join("song.jpg"), b"x").unwrap();
        assert_eq!(find_cover_for(&audio), Some(dir.join("song.jpg")));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_last_stdout_path() {
        let stdout = b"warning: something\n/tmp/music/Title.mp3\n";
        assert_eq!(
            last_stdout_path(stdout),
            Some(PathBuf::from("/tmp/music/Title.mp3"))
        );
        assert_eq!(last_stdout_path(b"\n  \n"), None);
    }
}
