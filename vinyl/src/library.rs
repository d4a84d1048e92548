//! Track library: categories of tracks persisted wholesale as JSON.
//!
//! Tracks are plain values. The same path may appear in several
//! categories as independent copies, so mutations keyed on a path
//! (rating, play counts, gain) fan out across every category.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ALL_TRACKS: &str = "All tracks";
pub const DOWNLOADED: &str = "Downloaded";
pub const FAVORITES: &str = "Favorites";

/// Always present, cannot be deleted.
pub const SYSTEM_CATEGORIES: [&str; 3] = [ALL_TRACKS, DOWNLOADED, FAVORITES];

/// Recommendation weight is `max(WEIGHT_FLOOR, WEIGHT_BASE + score)`.
const WEIGHT_BASE: i64 = 10;
const WEIGHT_FLOOR: i64 = 1;

fn default_album() -> String {
    "Unknown album".to_string()
}

fn default_artist() -> String {
    "Unknown artist".to_string()
}

fn default_gain() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub play_count: u32,
    #[serde(default = "default_album")]
    pub album: String,
    #[serde(default = "default_artist")]
    pub artist: String,
    /// Seconds; 0.0 when unknown.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub cover_path: Option<PathBuf>,
    /// Unix seconds at the time the track entered the library.
    #[serde(default)]
    pub date_added: f64,
    /// Per-track gain applied on top of the master volume.
    #[serde(default = "default_gain")]
    pub volume_multiplier: f32,
}

impl Track {
    /// Build a track from a local audio file, reading what metadata the
    /// tags offer. Missing tags fall back to the file stem and the
    /// "Unknown" placeholders.
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".into());

        let mut name = stem;
        let mut album = default_album();
        let mut artist = default_artist();
        let mut duration = 0.0;

        if let Ok(tagged) = lofty::read_from_path(path) {
            duration = tagged.properties().duration().as_secs_f64();
            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(title) = tag.title() {
                    if !title.trim().is_empty() {
                        name = title.to_string();
                    }
                }
                if let Some(value) = tag.album() {
                    if !value.trim().is_empty() {
                        album = value.to_string();
                    }
                }
                if let Some(value) = tag.artist() {
                    if !value.trim().is_empty() {
                        artist = value.to_string();
                    }
                }
            }
        }

        Self {
            name,
            path: path.to_path_buf(),
            score: 0,
            play_count: 0,
            album,
            artist,
            duration,
            cover_path: None,
            date_added: unix_now(),
            volume_multiplier: 1.0,
        }
    }
}

fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Category-name to track-list mapping, stored as one JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Library {
    pub categories: BTreeMap<String, Vec<Track>>,
}

impl Library {
    /// Load the library, starting empty on a missing or corrupt file.
    /// The system categories always exist afterwards.
    pub fn load(path: &Path) -> Self {
        let mut library: Library = vinylcore::storage::load_json(path).unwrap_or_default();
        library.ensure_system_categories();
        library
    }

    pub fn save(&self, path: &Path) {
        if let Err(e) = vinylcore::storage::save_json(path, self) {
            log::error!("failed to save library: {e}");
        }
    }

    pub fn ensure_system_categories(&mut self) {
        for name in SYSTEM_CATEGORIES {
            self.categories.entry(name.to_string()).or_default();
        }
    }

    pub fn is_system(name: &str) -> bool {
        SYSTEM_CATEGORIES.contains(&name)
    }

    /// Where manually added tracks land: the selected category when it
    /// is a user playlist, otherwise "All tracks". "Favorites" and
    /// "Downloaded" only gain tracks through their own operations.
    pub fn add_destination(selected: &str) -> &str {
        if Self::is_system(selected) {
            ALL_TRACKS
        } else {
            selected
        }
    }

    pub fn tracks(&self, category: &str) -> &[Track] {
        self.categories.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_category(&mut self, name: &str) -> Result<(), String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("playlist name cannot be empty".into());
        }
        if self.categories.contains_key(name) {
            return Err(format!("playlist \"{name}\" already exists"));
        }
        self.categories.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub fn delete_category(&mut self, name: &str) -> Result<(), String> {
        if Self::is_system(name) {
            return Err(format!("\"{name}\" is a built-in playlist"));
        }
        if self.categories.remove(name).is_none() {
            return Err(format!("no playlist named \"{name}\""));
        }
        Ok(())
    }

    /// Add a track to a category, skipping paths already present there.
    /// Everything also lands in "All tracks". Returns true if anything
    /// changed.
    pub fn add_track(&mut self, category: &str, track: Track) -> bool {
        let mut changed = false;
        for target in [category, ALL_TRACKS] {
            let list = self.categories.entry(target.to_string()).or_default();
            if !list.iter().any(|t| t.path == track.path) {
                list.push(track.clone());
                changed = true;
            }
            if category == ALL_TRACKS {
                break;
            }
        }
        changed
    }

    /// A finished download goes into "Downloaded" (and "All tracks").
    pub fn add_downloaded(&mut self, track: Track) {
        self.add_track(DOWNLOADED, track);
    }

    /// Remove a track from a category. Removing from "All tracks"
    /// removes the path from every category.
    pub fn remove_track(&mut self, category: &str, path: &Path) {
        if category == ALL_TRACKS {
            for list in self.categories.values_mut() {
                list.retain(|t| t.path != path);
            }
        } else if let Some(list) = self.categories.get_mut(category) {
            list.retain(|t| t.path != path);
        }
    }

    /// Apply a rating delta to every copy of the track.
    pub fn rate(&mut self, path: &Path, delta: i32) {
        self.for_each_copy(path, |t| t.score = t.score.saturating_add(delta));
    }

    pub fn record_play(&mut self, path: &Path) {
        self.for_each_copy(path, |t| t.play_count = t.play_count.saturating_add(1));
    }

    pub fn set_gain(&mut self, path: &Path, gain: f32) {
        self.for_each_copy(path, |t| t.volume_multiplier = gain);
    }

    pub fn set_cover(&mut self, path: &Path, cover: PathBuf) {
        self.for_each_copy(path, |t| t.cover_path = Some(cover.clone()));
    }

    fn for_each_copy(&mut self, path: &Path, mut apply: impl FnMut(&mut Track)) {
        for list in self.categories.values_mut() {
            for track in list.iter_mut().filter(|t| t.path == path) {
                apply(track);
            }
        }
    }

    pub fn is_favorite(&self, path: &Path) -> bool {
        self.tracks(FAVORITES).iter().any(|t| t.path == path)
    }

    pub fn toggle_favorite(&mut self, track: &Track) {
        if self.is_favorite(&track.path) {
            if let Some(list) = self.categories.get_mut(FAVORITES) {
                list.retain(|t| t.path != track.path);
            }
        } else {
            self.categories
                .entry(FAVORITES.to_string())
                .or_default()
                .push(track.clone());
        }
    }

    /// First copy of a path anywhere in the library.
    pub fn find(&self, path: &Path) -> Option<&Track> {
        self.categories
            .values()
            .flat_map(|list| list.iter())
            .find(|t| t.path == path)
    }
}

/// Pick the next track index by weighted random choice. Higher-rated
/// tracks are proportionally more likely, but every track keeps a
/// minimum weight so nothing is ever starved.
pub fn recommend_index<R: Rng>(tracks: &[Track], rng: &mut R) -> Option<usize> {
    if tracks.is_empty() {
        return None;
    }
    let weights: Vec<i64> = tracks
        .iter()
        .map(|t| (WEIGHT_BASE + t.score as i64).max(WEIGHT_FLOOR))
        .collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(name: &str, score: i32) -> Track {
        Track {
            name: name.to_string(),
            path: PathBuf::from(format!("/music/{name}.mp3")),
            score,
            play_count: 0,
            album: default_album(),
            artist: default_artist(),
            duration: 0.0,
            cover_path: None,
            date_added: 0.0,
            volume_multiplier: 1.0,
        }
    }

    fn scratch_file(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("vinyl-library-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("playlists.json")
    }

    #[test]
    fn test_old_files_backfill_defaults() {
        let json = r#"{ "All tracks": [ { "name": "song", "path": "/music/song.mp3" } ] }"#;
        let library: Library = serde_json::from_str(json).unwrap();
        let t = &library.tracks(ALL_TRACKS)[0];
        assert_eq!(t.score, 0);
        assert_eq!(t.album, "Unknown album");
        assert_eq!(t.artist, "Unknown artist");
        assert_eq!(t.volume_multiplier, 1.0);
        assert!(t.cover_path.is_none());
    }

    #[test]
    fn test_load_save_load_is_idempotent() {
        let path = scratch_file("idempotent");
        std::fs::write(
            &path,
            r#"{ "All tracks": [ { "name": "a", "path": "/m/a.mp3", "score": 3 } ],
                 "Mix": [ { "name": "a", "path": "/m/a.mp3", "score": 3 } ] }"#,
        )
        .unwrap();

        let first = Library::load(&path);
        first.save(&path);
        let second = Library::load(&path);
        assert_eq!(first, second);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_system_categories_always_exist() {
        let path = scratch_file("system");
        let library = Library::load(&path);
        for name in SYSTEM_CATEGORIES {
            assert!(library.categories.contains_key(name), "missing {name}");
        }
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_system_categories_cannot_be_deleted() {
        let mut library = Library::default();
        library.ensure_system_categories();
        assert!(library.delete_category(FAVORITES).is_err());
        assert!(library.categories.contains_key(FAVORITES));

        library.add_category("Workout").unwrap();
        assert!(library.delete_category("Workout").is_ok());
    }

    #[test]
    fn test_duplicate_and_empty_category_names_rejected() {
        let mut library = Library::default();
        library.ensure_system_categories();
        assert!(library.add_category("  ").is_err());
        assert!(library.add_category("Mix").is_ok());
        assert!(library.add_category("Mix").is_err());
    }

    #[test]
    fn test_add_track_lands_in_all_tracks_once() {
        let mut library = Library::default();
        library.ensure_system_categories();
        library.add_category("Mix").unwrap();

        let t = track("a", 0);
        assert!(library.add_track("Mix", t.clone()));
        assert!(!library.add_track("Mix", t.clone()));
        assert_eq!(library.tracks("Mix").len(), 1);
        assert_eq!(library.tracks(ALL_TRACKS).len(), 1);

        // Same path into another category does not duplicate All tracks.
        library.add_category("Other").unwrap();
        library.add_track("Other", t);
        assert_eq!(library.tracks(ALL_TRACKS).len(), 1);
    }

    #[test]
    fn test_add_destination_skips_system_categories() {
        assert_eq!(Library::add_destination("Mix"), "Mix");
        for name in SYSTEM_CATEGORIES {
            assert_eq!(Library::add_destination(name), ALL_TRACKS);
        }
    }

    #[test]
    fn test_adding_while_favorites_selected_does_not_favorite() {
        let mut library = Library::default();
        library.ensure_system_categories();

        let t = track("a", 0);
        let dest = Library::add_destination(FAVORITES).to_string();
        library.add_track(&dest, t.clone());

        assert!(!library.is_favorite(&t.path));
        assert_eq!(library.tracks(ALL_TRACKS).len(), 1);
        assert!(library.tracks(FAVORITES).is_empty());
        assert!(library.tracks(DOWNLOADED).is_empty());
    }

    #[test]
    fn test_rating_fans_out_across_copies() {
        let mut library = Library::default();
        library.ensure_system_categories();
        library.add_category("Mix").unwrap();
        let t = track("a", 0);
        library.add_track("Mix", t.clone());
        library.toggle_favorite(&t);

        library.rate(&t.path, 1);
        library.rate(&t.path, 1);
        library.rate(&t.path, -1);

        for cat in ["Mix", ALL_TRACKS, FAVORITES] {
            assert_eq!(library.tracks(cat)[0].score, 1, "category {cat}");
        }
    }

    #[test]
    fn test_remove_from_all_tracks_is_global() {
        let mut library = Library::default();
        library.ensure_system_categories();
        library.add_category("Mix").unwrap();
        let t = track("a", 0);
        library.add_track("Mix", t.clone());

        library.remove_track(ALL_TRACKS, &t.path);
        assert!(library.tracks("Mix").is_empty());
        assert!(library.tracks(ALL_TRACKS).is_empty());
    }

    #[test]
    fn test_remove_from_one_category_is_local() {
        let mut library = Library::default();
        library.ensure_system_categories();
        library.add_category("Mix").unwrap();
        let t = track("a", 0);
        library.add_track("Mix", t.clone());

        library.remove_track("Mix", &t.path);
        assert!(library.tracks("Mix").is_empty());
        assert_eq!(library.tracks(ALL_TRACKS).len(), 1);
    }

    #[test]
    fn test_favorite_toggle() {
        let mut library = Library::default();
        library.ensure_system_categories();
        let t = track("a", 0);

        library.toggle_favorite(&t);
        assert!(library.is_favorite(&t.path));
        library.toggle_favorite(&t);
        assert!(!library.is_favorite(&t.path));
    }

    #[test]
    fn test_recommend_weight_floor() {
        // A deeply downrated track still has weight 1, never 0.
        let tracks = vec![track("bad", -50)];
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(recommend_index(&tracks, &mut rng), Some(0));
        assert_eq!(recommend_index(&[], &mut rng), None);
    }

    #[test]
    fn test_recommend_follows_score_weights() {
        // Scores [10, -5, 0] give weights [20, 5, 10].
        let tracks = vec![track("a", 10), track("b", -5), track("c", 0)];
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0u32; 3];
        let trials = 35_000;
        for _ in 0..trials {
            counts[recommend_index(&tracks, &mut rng).unwrap()] += 1;
        }
        let expected = [20.0 / 35.0, 5.0 / 35.0, 10.0 / 35.0];
        for i in 0..3 {
            let observed = counts[i] as f64 / trials as f64;
            assert!(
                (observed - expected[i]).abs() < 0.02,
                "track {i}: observed {observed}, expected {}",
                expected[i]
            );
        }
    }
}
