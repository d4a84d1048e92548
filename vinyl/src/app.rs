//! vinyl - themeable music player with playlists, online search and
//! self-update.

use crate::config::Config;
use crate::library::{self, Library, Track, ALL_TRACKS};
use crate::playback::Player;
use crate::search::{self, SearchEvent, SearchResult};
use crate::updater::{self, UpdateEvent, UpdateManifest};
use egui::{ColorImage, Context, Key, TextureHandle, TextureOptions};
use id3::TagLike;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;
use vinylcore::storage::{config_dir, downloads_dir, music_dir, FileBrowser};
use vinylcore::theme::{ThemeColors, ThemeSet};
use vinylcore::widgets::{
    status_bar, vertical_gradient, AccentButton, BarSlider, FileListItem, IconButton,
    view_heading,
};

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "flac", "ogg", "m4a", "aac"];

#[derive(Clone, Copy, PartialEq)]
enum View {
    Playlists,
    Search,
    Themes,
}

/// What is currently loaded into the player.
#[derive(Clone)]
enum NowPlaying {
    /// A library track, addressed by category and path.
    Track {
        category: String,
        path: PathBuf,
        name: String,
        artist: String,
        duration: f64,
    },
    /// A temp-file preview of a search result.
    Preview { title: String, path: PathBuf },
}

/// In-progress edit of one theme.
struct ThemeEditor {
    name: String,
    colors: ThemeColors,
}

/// Destructive action waiting for the user to confirm it.
enum Confirm {
    DeletePlaylist(String),
    RemoveFromLibrary { path: PathBuf, name: String },
}

pub struct VinylApp {
    config: Config,
    library: Library,
    themes: ThemeSet,
    player: Player,

    library_path: PathBuf,
    themes_path: PathBuf,

    view: View,
    selected_category: String,
    now_playing: Option<NowPlaying>,
    shuffle: bool,
    repeat: bool,
    recommend: bool,
    /// Scrubber position while the user is dragging it, committed on release.
    pending_seek: Option<f32>,
    status: Option<String>,

    search_query: String,
    searching: bool,
    search_results: Vec<SearchResult>,
    search_tx: Sender<SearchEvent>,
    search_rx: Receiver<SearchEvent>,
    thumbnails: HashMap<String, TextureHandle>,
    thumbnails_requested: HashSet<String>,
    downloads_in_flight: HashSet<String>,
    downloads_done: HashSet<String>,
    preview_in_flight: Option<String>,

    update_tx: Sender<UpdateEvent>,
    update_rx: Receiver<UpdateEvent>,
    update_available: Option<UpdateManifest>,
    show_update_dialog: bool,
    installing_update: bool,

    show_add_tracks: bool,
    file_browser: FileBrowser,
    show_new_playlist: bool,
    new_playlist_name: String,
    theme_editor: Option<ThemeEditor>,
    confirm: Option<Confirm>,
    show_about: bool,

    cover_texture: Option<TextureHandle>,
    cover_loaded_for: Option<PathBuf>,
}

impl VinylApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let dir = config_dir("vinyl");
        let library_path = dir.join("playlists.json");
        let themes_path = dir.join("themes.json");

        let config = Config::load();
        let library = Library::load(&library_path);
        let themes = ThemeSet::load(&themes_path);
        themes.get(&config.theme).apply(&cc.egui_ctx);

        let player = Player::new(config.volume);

        let (search_tx, search_rx) = channel();
        let (update_tx, update_rx) = channel();
        updater::spawn_check(update_tx.clone());

        Self {
            selected_category: ALL_TRACKS.to_string(),
            config,
            library,
            themes,
            player,
            library_path,
            themes_path,
            view: View::Playlists,
            now_playing: None,
            shuffle: false,
            repeat: false,
            recommend: false,
            pending_seek: None,
            status: None,
            search_query: String::new(),
            searching: false,
            search_results: Vec::new(),
            search_tx,
            search_rx,
            thumbnails: HashMap::new(),
            thumbnails_requested: HashSet::new(),
            downloads_in_flight: HashSet::new(),
            downloads_done: HashSet::new(),
            preview_in_flight: None,
            update_tx,
            update_rx,
            update_available: None,
            show_update_dialog: false,
            installing_update: false,
            show_add_tracks: false,
            file_browser: FileBrowser::new(music_dir())
                .with_filter(AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect()),
            show_new_playlist: false,
            new_playlist_name: String::new(),
            theme_editor: None,
            confirm: None,
            show_about: false,
            cover_texture: None,
            cover_loaded_for: None,
        }
    }

    fn theme(&self) -> ThemeColors {
        self.themes.get(&self.config.theme).clone()
    }

    fn set_theme(&mut self, ctx: &Context, name: &str) {
        self.config.theme = name.to_string();
        self.themes.get(name).apply(ctx);
        self.config.save();
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    fn save_library(&self) {
        self.library.save(&self.library_path);
    }

    // ---- playback ----

    fn play_track(&mut self, category: &str, index: usize) {
        let Some(track) = self.library.tracks(category).get(index).cloned() else {
            return;
        };
        remove_preview_file(&self.now_playing);
        match self.player.play_file(&track.path, Duration::ZERO) {
            Ok(()) => {
                self.player.set_track_gain(track.volume_multiplier);
                if track.duration > 0.0 {
                    self.player
                        .set_duration_hint(Some(Duration::from_secs_f64(track.duration)));
                }
                self.library.record_play(&track.path);
                self.save_library();
                self.now_playing = Some(NowPlaying::Track {
                    category: category.to_string(),
                    path: track.path,
                    name: track.name,
                    artist: track.artist,
                    duration: track.duration,
                });
                self.status = None;
            }
            Err(e) => {
                self.now_playing = None;
                self.set_status(e);
            }
        }
    }

    fn toggle_play(&mut self) {
        if self.player.has_track() {
            self.player.toggle_pause();
        } else if !self.library.tracks(&self.selected_category).is_empty() {
            let category = self.selected_category.clone();
            self.play_track(&category, 0);
        }
    }

    fn stop(&mut self) {
        self.player.stop();
        remove_preview_file(&self.now_playing);
        self.now_playing = None;
        self.cover_texture = None;
        self.cover_loaded_for = None;
    }

    /// Restart the current track from `fraction` of its duration.
    fn seek_to(&mut self, fraction: f32) {
        let Some(NowPlaying::Track { path, duration, .. }) = self.now_playing.clone() else {
            return;
        };
        let total = self.duration_secs().unwrap_or(duration).max(0.0);
        if total <= 0.0 {
            return;
        }
        let offset = Duration::from_secs_f64(total * fraction as f64);
        if let Err(e) = self.player.play_file(&path, offset) {
            self.set_status(e);
            return;
        }
        if duration > 0.0 {
            self.player
                .set_duration_hint(Some(Duration::from_secs_f64(duration)));
        }
    }

    fn duration_secs(&self) -> Option<f64> {
        self.player
            .duration()
            .map(|d| d.as_secs_f64())
            .or(match &self.now_playing {
                Some(NowPlaying::Track { duration, .. }) if *duration > 0.0 => Some(*duration),
                _ => None,
            })
    }

    fn current_index(&self) -> Option<(String, usize)> {
        let NowPlaying::Track { category, path, .. } = self.now_playing.as_ref()? else {
            return None;
        };
        let index = self
            .library
            .tracks(category)
            .iter()
            .position(|t| &t.path == path)?;
        Some((category.clone(), index))
    }

    /// Choose the next index according to the active mode. Repeat wins,
    /// then recommend (score-weighted), then shuffle, then sequential
    /// with wraparound.
    fn pick_next(&self, category: &str, current: usize) -> Option<usize> {
        let tracks = self.library.tracks(category);
        if tracks.is_empty() {
            return None;
        }
        if self.repeat {
            return Some(current);
        }
        let mut rng = rand::thread_rng();
        if self.recommend {
            return library::recommend_index(tracks, &mut rng);
        }
        if self.shuffle {
            return Some(rng.gen_range(0..tracks.len()));
        }
        Some((current + 1) % tracks.len())
    }

    fn next_track(&mut self) {
        if let Some((category, current)) = self.current_index() {
            if let Some(next) = self.pick_next(&category, current) {
                self.play_track(&category, next);
            }
        } else if !self.library.tracks(&self.selected_category).is_empty() {
            let category = self.selected_category.clone();
            self.play_track(&category, 0);
        }
    }

    fn prev_track(&mut self) {
        if let Some((category, current)) = self.current_index() {
            let len = self.library.tracks(&category).len();
            if len > 0 {
                let prev = if current == 0 { len - 1 } else { current - 1 };
                self.play_track(&category, prev);
            }
        }
    }

    fn check_track_end(&mut self) {
        if !self.player.finished() {
            return;
        }
        match &self.now_playing {
            Some(NowPlaying::Track { .. }) => self.next_track(),
            _ => self.stop(),
        }
    }

    // ---- background events ----

    fn drain_search_events(&mut self, ctx: &Context) {
        while let Ok(event) = self.search_rx.try_recv() {
            match event {
                SearchEvent::Results(results) => {
                    self.searching = false;
                    for result in &results {
                        if let Some(url) = &result.thumbnail {
                            if self.thumbnails_requested.insert(url.clone()) {
                                search::spawn_thumbnail(url.clone(), self.search_tx.clone());
                            }
                        }
                    }
                    self.set_status(format!("{} results", results.len()));
                    self.search_results = results;
                }
                SearchEvent::SearchFailed(e) => {
                    self.searching = false;
                    self.set_status(format!("search failed: {e}"));
                }
                SearchEvent::Thumbnail { url, bytes } => {
                    if let Ok(img) = image::load_from_memory(&bytes) {
                        let rgba = img
                            .resize(96, 96, image::imageops::FilterType::Triangle)
                            .to_rgba8();
                        let (w, h) = rgba.dimensions();
                        let color_image = ColorImage::from_rgba_unmultiplied(
                            [w as usize, h as usize],
                            rgba.as_raw(),
                        );
                        let texture =
                            ctx.load_texture(&url, color_image, TextureOptions::LINEAR);
                        self.thumbnails.insert(url, texture);
                    }
                }
                SearchEvent::PreviewReady { result, path } => {
                    self.preview_in_flight = None;
                    match self.player.play_file(&path, Duration::ZERO) {
                        Ok(()) => {
                            self.player.set_track_gain(1.0);
                            remove_preview_file(&self.now_playing);
                            self.now_playing = Some(NowPlaying::Preview {
                                title: result.title,
                                path,
                            });
                        }
                        Err(e) => {
                            let _ = std::fs::remove_file(&path);
                            self.set_status(format!("preview failed: {e}"));
                        }
                    }
                }
                SearchEvent::PreviewFailed(e) => {
                    self.preview_in_flight = None;
                    self.set_status(format!("preview failed: {e}"));
                }
                SearchEvent::Downloaded { url, path, cover } => {
                    self.downloads_in_flight.remove(&url);
                    self.downloads_done.insert(url);
                    let mut track = Track::from_path(&path);
                    track.cover_path = cover;
                    let name = track.name.clone();
                    self.library.add_downloaded(track);
                    self.save_library();
                    self.set_status(format!("downloaded: {name}"));
                }
                SearchEvent::DownloadFailed { url, error } => {
                    self.downloads_in_flight.remove(&url);
                    self.set_status(format!("download failed: {error}"));
                }
            }
        }
    }

    fn drain_update_events(&mut self, ctx: &Context) {
        while let Ok(event) = self.update_rx.try_recv() {
            match event {
                UpdateEvent::Available(manifest) => {
                    self.update_available = Some(manifest);
                    self.show_update_dialog = true;
                }
                UpdateEvent::UpToDate => {}
                UpdateEvent::CheckFailed(e) => log::warn!("update check failed: {e}"),
                UpdateEvent::Restarting => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                UpdateEvent::InstallFailed(e) => {
                    self.installing_update = false;
                    self.set_status(format!("update failed: {e}"));
                }
            }
        }
    }

    // ---- input ----

    fn handle_keys(&mut self, ctx: &Context) {
        if ctx.memory(|mem| mem.focused().is_some()) {
            return;
        }
        ctx.input(|i| {
            if i.key_pressed(Key::Space) {
                self.toggle_play();
            }
            if i.key_pressed(Key::ArrowRight) {
                self.next_track();
            }
            if i.key_pressed(Key::ArrowLeft) {
                self.prev_track();
            }
        });
    }

    fn handle_dropped_files(&mut self, ctx: &Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if dropped.is_empty() {
            return;
        }

        let mut audio_files = Vec::new();
        for path in dropped {
            if path.is_dir() {
                collect_audio_files_recursive(&path, &mut audio_files);
            } else if is_audio_file(&path) {
                audio_files.push(path);
            }
        }
        audio_files.sort();

        let category = Library::add_destination(&self.selected_category).to_string();
        let mut added = 0;
        for path in audio_files {
            if self.library.add_track(&category, Track::from_path(&path)) {
                added += 1;
            }
        }
        if added > 0 {
            self.save_library();
            self.set_status(format!("added {added} tracks"));
        }
    }

    /// Cover art for the playing track, loaded once per track change.
    /// Prefers the sidecar cover file, falls back to embedded ID3 art.
    fn load_cover(&mut self, ctx: &Context) {
        let Some(NowPlaying::Track { path, .. }) = self.now_playing.clone() else {
            return;
        };
        if self.cover_loaded_for.as_ref() == Some(&path) {
            return;
        }
        self.cover_loaded_for = Some(path.clone());
        self.cover_texture = None;

        let cover_file = self.library.find(&path).and_then(|t| t.cover_path.clone());
        let img = match cover_file {
            Some(file) => image::open(file).ok(),
            None => id3::Tag::read_from_path(&path)
                .ok()
                .and_then(|tag| tag.pictures().next().map(|p| p.data.clone()))
                .and_then(|data| image::load_from_memory(&data).ok()),
        };

        if let Some(img) = img {
            let rgba = img
                .resize(96, 96, image::imageops::FilterType::Triangle)
                .to_rgba8();
            let (w, h) = rgba.dimensions();
            let color_image =
                ColorImage::from_rgba_unmultiplied([w as usize, h as usize], rgba.as_raw());
            self.cover_texture =
                Some(ctx.load_texture("cover", color_image, TextureOptions::LINEAR));
        }
    }

    // ---- views ----

    fn render_sidebar(&mut self, ui: &mut egui::Ui) {
        let theme = self.theme();
        ui.add_space(10.0);
        ui.horizontal(|ui| {
            ui.add_space(6.0);
            ui.label(
                egui::RichText::new("vinyl")
                    .color(theme.accent())
                    .size(24.0)
                    .strong(),
            );
        });
        ui.add_space(12.0);

        for (view, label) in [
            (View::Playlists, "playlists"),
            (View::Search, "search"),
            (View::Themes, "themes"),
        ] {
            if ui.selectable_label(self.view == view, label).clicked() {
                self.view = view;
            }
        }

        ui.add_space(12.0);
        ui.separator();
        ui.label(egui::RichText::new("playlists").color(theme.text_dim()).size(12.0));
        ui.add_space(4.0);

        let mut delete_request: Option<String> = None;
        let names: Vec<String> = {
            let mut names: Vec<String> =
                library::SYSTEM_CATEGORIES.iter().map(|s| s.to_string()).collect();
            let mut user: Vec<String> = self
                .library
                .categories
                .keys()
                .filter(|n| !Library::is_system(n))
                .cloned()
                .collect();
            user.sort();
            names.extend(user);
            names
        };
        egui::ScrollArea::vertical()
            .id_source("sidebar_playlists")
            .show(ui, |ui| {
                for name in names {
                    let selected = self.selected_category == name;
                    let count = self.library.tracks(&name).len();
                    let response =
                        ui.selectable_label(selected, format!("{name}  ({count})"));
                    if response.clicked() {
                        self.selected_category = name.clone();
                        self.view = View::Playlists;
                    }
                    if !Library::is_system(&name) {
                        response.context_menu(|ui| {
                            if ui.button("delete playlist").clicked() {
                                delete_request = Some(name.clone());
                                ui.close_menu();
                            }
                        });
                    }
                }
            });

        if let Some(name) = delete_request {
            self.confirm = Some(Confirm::DeletePlaylist(name));
        }

        ui.add_space(6.0);
        if ui.add(AccentButton::new("new playlist", &theme).small()).clicked() {
            self.show_new_playlist = true;
            self.new_playlist_name.clear();
        }

        ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
            ui.add_space(8.0);
            if ui
                .label(
                    egui::RichText::new(format!("v{}", env!("CARGO_PKG_VERSION")))
                        .color(theme.text_dim())
                        .size(11.0),
                )
                .on_hover_text("about vinyl")
                .clicked()
            {
                self.show_about = true;
            }
        });
    }

    fn render_playlist_view(&mut self, ui: &mut egui::Ui) {
        let theme = self.theme();
        let category = self.selected_category.clone();
        view_heading(ui, &theme, &category);

        ui.horizontal(|ui| {
            if ui.add(AccentButton::new("add tracks", &theme).small()).clicked() {
                self.file_browser.refresh();
                self.show_add_tracks = true;
            }
            ui.label(
                egui::RichText::new("or drop audio files anywhere in the window")
                    .color(theme.text_dim())
                    .size(12.0),
            );
        });
        ui.add_space(8.0);

        let tracks = self.library.tracks(&category).to_vec();
        if tracks.is_empty() {
            ui.add_space(30.0);
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new("nothing here yet").color(theme.text_dim()));
            });
            return;
        }

        enum RowAction {
            Play(usize),
            Rate(PathBuf, i32),
            ToggleFavorite(usize),
            Remove(PathBuf),
            RemoveEverywhere(PathBuf, String),
            AddTo(String, usize),
        }
        let mut action: Option<RowAction> = None;

        let playing_path = match &self.now_playing {
            Some(NowPlaying::Track { path, .. }) => Some(path.clone()),
            _ => None,
        };
        let user_playlists: Vec<String> = self
            .library
            .categories
            .keys()
            .filter(|n| !Library::is_system(n) && **n != category)
            .cloned()
            .collect();

        egui::ScrollArea::vertical()
            .id_source("playlist_rows")
            .show(ui, |ui| {
                for (index, track) in tracks.iter().enumerate() {
                    let current = playing_path.as_ref() == Some(&track.path);
                    let response = ui
                        .horizontal(|ui| {
                            let marker = if current { "♪" } else { "" };
                            ui.add_sized(
                                [18.0, 18.0],
                                egui::Label::new(
                                    egui::RichText::new(marker).color(theme.accent()),
                                ),
                            );
                            let name_color = if current {
                                theme.accent()
                            } else {
                                theme.text()
                            };
                            let label = ui.selectable_label(
                                current,
                                egui::RichText::new(&track.name).color(name_color),
                            );
                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    ui.label(
                                        egui::RichText::new(format_time(track.duration))
                                            .color(theme.text_dim())
                                            .size(12.0),
                                    );
                                    ui.label(
                                        egui::RichText::new(format!(
                                            "score {}  ·  {} plays",
                                            track.score, track.play_count
                                        ))
                                        .color(theme.text_dim())
                                        .size(12.0),
                                    );
                                    ui.label(
                                        egui::RichText::new(&track.artist)
                                            .color(theme.text_dim())
                                            .size(12.0),
                                    );
                                },
                            );
                            label
                        })
                        .inner;

                    if response.double_clicked() {
                        action = Some(RowAction::Play(index));
                    }
                    response.context_menu(|ui| {
                        if ui.button("play").clicked() {
                            action = Some(RowAction::Play(index));
                            ui.close_menu();
                        }
                        let fav_label = if self.library.is_favorite(&track.path) {
                            "remove from favorites"
                        } else {
                            "add to favorites"
                        };
                        if ui.button(fav_label).clicked() {
                            action = Some(RowAction::ToggleFavorite(index));
                            ui.close_menu();
                        }
                        if ui.button("rate up").clicked() {
                            action = Some(RowAction::Rate(track.path.clone(), 1));
                            ui.close_menu();
                        }
                        if ui.button("rate down").clicked() {
                            action = Some(RowAction::Rate(track.path.clone(), -1));
                            ui.close_menu();
                        }
                        if !user_playlists.is_empty() {
                            ui.menu_button("add to playlist", |ui| {
                                for target in &user_playlists {
                                    if ui.button(target).clicked() {
                                        action =
                                            Some(RowAction::AddTo(target.clone(), index));
                                        ui.close_menu();
                                    }
                                }
                            });
                        }
                        ui.separator();
                        if category != ALL_TRACKS {
                            if ui.button("remove from playlist").clicked() {
                                action = Some(RowAction::Remove(track.path.clone()));
                                ui.close_menu();
                            }
                        }
                        if ui.button("remove from library").clicked() {
                            action = Some(RowAction::RemoveEverywhere(
                                track.path.clone(),
                                track.name.clone(),
                            ));
                            ui.close_menu();
                        }
                    });
                }
            });

        match action {
            Some(RowAction::Play(index)) => self.play_track(&category, index),
            Some(RowAction::Rate(path, delta)) => {
                self.library.rate(&path, delta);
                self.save_library();
            }
            Some(RowAction::ToggleFavorite(index)) => {
                if let Some(track) = tracks.get(index) {
                    self.library.toggle_favorite(track);
                    self.save_library();
                }
            }
            Some(RowAction::Remove(path)) => {
                self.library.remove_track(&category, &path);
                self.save_library();
            }
            Some(RowAction::RemoveEverywhere(path, name)) => {
                self.confirm = Some(Confirm::RemoveFromLibrary { path, name });
            }
            Some(RowAction::AddTo(target, index)) => {
                if let Some(track) = tracks.get(index) {
                    self.library.add_track(&target, track.clone());
                    self.save_library();
                }
            }
            None => {}
        }
    }

    fn render_search_view(&mut self, ui: &mut egui::Ui) {
        let theme = self.theme();
        view_heading(ui, &theme, "search");

        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut self.search_query)
                .hint_text("song or artist")
                .desired_width(320.0);
            let response = ui.add(edit);
            let submitted =
                response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
            let clicked = ui
                .add_enabled(!self.searching, AccentButton::new("search", &theme).small())
                .clicked();
            if (submitted || clicked) && !self.search_query.trim().is_empty() {
                self.searching = true;
                self.search_results.clear();
                search::spawn_search(self.search_query.clone(), self.search_tx.clone());
            }
            ui.checkbox(&mut self.config.download_covers, "download covers");
        });
        ui.add_space(8.0);

        if self.searching {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(egui::RichText::new("searching...").color(theme.text_dim()));
            });
            return;
        }

        let results = self.search_results.clone();
        let mut preview_request: Option<SearchResult> = None;
        let mut download_request: Option<SearchResult> = None;

        egui::ScrollArea::vertical()
            .id_source("search_results")
            .show(ui, |ui| {
                for result in &results {
                    ui.horizontal(|ui| {
                        let thumb = result
                            .thumbnail
                            .as_ref()
                            .and_then(|url| self.thumbnails.get(url));
                        match thumb {
                            Some(texture) => {
                                ui.image(egui::load::SizedTexture::new(
                                    texture.id(),
                                    egui::vec2(48.0, 48.0),
                                ));
                            }
                            None => {
                                let (rect, _) = ui.allocate_exact_size(
                                    egui::vec2(48.0, 48.0),
                                    egui::Sense::hover(),
                                );
                                ui.painter().rect_filled(
                                    rect,
                                    egui::Rounding::same(4.0),
                                    theme.frame_secondary(),
                                );
                            }
                        }
                        ui.vertical(|ui| {
                            ui.label(
                                egui::RichText::new(&result.title)
                                    .color(theme.text_bright()),
                            );
                            ui.label(
                                egui::RichText::new(format!(
                                    "{}  ·  {}  ·  {}",
                                    result.uploader,
                                    format_time(result.duration),
                                    result.source.label()
                                ))
                                .color(theme.text_dim())
                                .size(12.0),
                            );
                        });
                        ui.with_layout(
                            egui::Layout::right_to_left(egui::Align::Center),
                            |ui| {
                                let downloading =
                                    self.downloads_in_flight.contains(&result.url);
                                let done = self.downloads_done.contains(&result.url);
                                let label = if done {
                                    "✓"
                                } else if downloading {
                                    "..."
                                } else {
                                    "download"
                                };
                                if ui
                                    .add_enabled(
                                        !downloading && !done,
                                        AccentButton::new(label, &theme).small(),
                                    )
                                    .clicked()
                                {
                                    download_request = Some(result.clone());
                                }
                                let previewing = self.preview_in_flight.is_some();
                                if ui
                                    .add_enabled(
                                        !previewing,
                                        egui::Button::new("preview"),
                                    )
                                    .clicked()
                                {
                                    preview_request = Some(result.clone());
                                }
                            },
                        );
                    });
                    ui.separator();
                }
            });

        if let Some(result) = preview_request {
            self.stop();
            self.preview_in_flight = Some(result.url.clone());
            self.set_status(format!("loading preview: {}", result.title));
            search::spawn_preview(result, self.search_tx.clone());
        }
        if let Some(result) = download_request {
            self.downloads_in_flight.insert(result.url.clone());
            search::spawn_download(
                result,
                downloads_dir(),
                self.config.download_covers,
                self.search_tx.clone(),
            );
        }
    }

    fn render_themes_view(&mut self, ctx: &Context, ui: &mut egui::Ui) {
        let theme = self.theme();
        view_heading(ui, &theme, "themes");

        let mut apply_request: Option<String> = None;
        let mut edit_request: Option<String> = None;
        let mut delete_request: Option<String> = None;

        egui::ScrollArea::vertical()
            .id_source("themes_list")
            .show(ui, |ui| {
                for name in self.themes.names_ordered() {
                    let colors = self.themes.get(&name).clone();
                    let active = self.config.theme == name;
                    ui.horizontal(|ui| {
                        for role in ["bg", "frame", "accent", "text"] {
                            let (rect, _) = ui.allocate_exact_size(
                                egui::vec2(18.0, 18.0),
                                egui::Sense::hover(),
                            );
                            ui.painter().rect_filled(
                                rect,
                                egui::Rounding::same(4.0),
                                colors.color(role),
                            );
                        }
                        let label = if active {
                            format!("{name}  (active)")
                        } else {
                            name.clone()
                        };
                        if ui.selectable_label(active, label).clicked() {
                            apply_request = Some(name.clone());
                        }
                        ui.with_layout(
                            egui::Layout::right_to_left(egui::Align::Center),
                            |ui| {
                                if !ThemeSet::is_builtin(&name) {
                                    if ui.small_button("delete").clicked() {
                                        delete_request = Some(name.clone());
                                    }
                                }
                                let edit_label = if ThemeSet::is_builtin(&name) {
                                    "copy and edit"
                                } else {
                                    "edit"
                                };
                                if ui.small_button(edit_label).clicked() {
                                    edit_request = Some(name.clone());
                                }
                            },
                        );
                    });
                    ui.add_space(2.0);
                }
            });

        ui.add_space(6.0);
        if ui.add(AccentButton::new("new theme", &theme).small()).clicked() {
            self.theme_editor = Some(ThemeEditor {
                name: String::new(),
                colors: theme.clone(),
            });
        }

        if let Some(name) = apply_request {
            self.set_theme(ctx, &name);
        }
        if let Some(name) = edit_request {
            let colors = self.themes.get(&name).clone();
            let editor_name = if ThemeSet::is_builtin(&name) {
                format!("{name} copy")
            } else {
                name
            };
            self.theme_editor = Some(ThemeEditor { name: editor_name, colors });
        }
        if let Some(name) = delete_request {
            if self.themes.remove(&name) {
                if self.config.theme == name {
                    self.set_theme(ctx, vinylcore::theme::DEFAULT_THEME);
                }
                if let Err(e) = self.themes.save(&self.themes_path) {
                    log::error!("failed to save themes: {e}");
                }
            }
        }
    }

    fn render_player_bar(&mut self, ui: &mut egui::Ui) {
        let theme = self.theme();
        ui.add_space(6.0);

        // Track identity line: cover, title, artist, rating controls.
        ui.horizontal(|ui| {
            if let Some(texture) = &self.cover_texture {
                ui.image(egui::load::SizedTexture::new(
                    texture.id(),
                    egui::vec2(44.0, 44.0),
                ));
            }
            match self.now_playing.clone() {
                Some(NowPlaying::Track { name, artist, path, .. }) => {
                    ui.vertical(|ui| {
                        ui.label(egui::RichText::new(&name).color(theme.text_bright()));
                        ui.label(
                            egui::RichText::new(&artist).color(theme.text_dim()).size(12.0),
                        );
                    });
                    let score = self.library.find(&path).map(|t| t.score).unwrap_or(0);
                    if ui.add(IconButton::new("－", &theme).size(22.0)).on_hover_text("rate down").clicked() {
                        self.library.rate(&path, -1);
                        self.save_library();
                    }
                    ui.label(egui::RichText::new(score.to_string()).color(theme.text_dim()));
                    if ui.add(IconButton::new("＋", &theme).size(22.0)).on_hover_text("rate up").clicked() {
                        self.library.rate(&path, 1);
                        self.save_library();
                    }
                    let favorite = self.library.is_favorite(&path);
                    if ui
                        .add(IconButton::new("♥", &theme).size(22.0).active(favorite))
                        .on_hover_text("favorite")
                        .clicked()
                    {
                        if let Some(track) = self.library.find(&path).cloned() {
                            self.library.toggle_favorite(&track);
                            self.save_library();
                        }
                    }
                }
                Some(NowPlaying::Preview { title, .. }) => {
                    ui.label(
                        egui::RichText::new(format!("preview: {title}"))
                            .color(theme.text_bright()),
                    );
                }
                None => {
                    ui.label(egui::RichText::new("nothing playing").color(theme.text_dim()));
                }
            }
        });

        ui.add_space(4.0);

        // Transport and scrubber.
        ui.horizontal(|ui| {
            if ui
                .add(IconButton::new("🔀", &theme).active(self.shuffle))
                .on_hover_text("shuffle")
                .clicked()
            {
                self.shuffle = !self.shuffle;
                if self.shuffle {
                    self.recommend = false;
                }
            }
            if ui.add(IconButton::new("⏮", &theme)).clicked() {
                self.prev_track();
            }
            let play_icon = if self.player.is_playing() { "⏸" } else { "▶" };
            if ui.add(IconButton::new(play_icon, &theme).size(36.0).filled(true)).clicked() {
                self.toggle_play();
            }
            if ui.add(IconButton::new("⏭", &theme)).clicked() {
                self.next_track();
            }
            if ui
                .add(IconButton::new("🔁", &theme).active(self.repeat))
                .on_hover_text("repeat one")
                .clicked()
            {
                self.repeat = !self.repeat;
            }
            if ui
                .add(IconButton::new("★", &theme).active(self.recommend))
                .on_hover_text("recommend by rating")
                .clicked()
            {
                self.recommend = !self.recommend;
                if self.recommend {
                    self.shuffle = false;
                }
            }

            let position = self.player.position().as_secs_f64();
            let total = self.duration_secs().unwrap_or(0.0);
            let shown = self
                .pending_seek
                .map(|f| f as f64 * total)
                .unwrap_or(position);
            ui.label(
                egui::RichText::new(format_time(shown))
                    .color(theme.text_dim())
                    .size(12.0),
            );

            let fraction = if total > 0.0 {
                (position / total).min(1.0) as f32
            } else {
                0.0
            };
            let bar_width = (ui.available_width() - 160.0).max(120.0);
            let bar = BarSlider::new(self.pending_seek.unwrap_or(fraction), &theme)
                .width(bar_width)
                .show(ui);
            if let Some(value) = bar.value {
                self.pending_seek = Some(value);
            } else if let Some(value) = self.pending_seek.take() {
                // Pointer released: commit the seek.
                if matches!(self.now_playing, Some(NowPlaying::Track { .. })) {
                    self.seek_to(value);
                }
            }

            ui.label(
                egui::RichText::new(format_time(total))
                    .color(theme.text_dim())
                    .size(12.0),
            );

            // Volume cluster on the right.
            let mute_icon = if self.player.is_muted() { "🔇" } else { "🔊" };
            if ui.add(IconButton::new(mute_icon, &theme).size(22.0)).clicked() {
                self.player.toggle_mute();
            }
            let volume_bar = BarSlider::new(self.player.master_volume(), &theme)
                .width(90.0)
                .show(ui);
            if let Some(value) = volume_bar.value {
                self.player.set_master_volume(value);
                self.config.volume = value;
            }
            if let Some(NowPlaying::Track { path, .. }) = self.now_playing.clone() {
                ui.menu_button("gain", |ui| {
                    let mut gain = self.player.track_gain();
                    if ui
                        .add(egui::Slider::new(&mut gain, 0.0..=2.0).text("track gain"))
                        .changed()
                    {
                        self.player.set_track_gain(gain);
                        self.library.set_gain(&path, gain);
                    }
                    if ui.button("reset").clicked() {
                        self.player.set_track_gain(1.0);
                        self.library.set_gain(&path, 1.0);
                        ui.close_menu();
                    }
                });
            }
        });
        ui.add_space(6.0);
    }

    // ---- dialogs ----

    fn render_add_tracks_dialog(&mut self, ctx: &Context) {
        let theme = self.theme();
        let mut added: Vec<PathBuf> = Vec::new();
        let mut close = false;

        egui::Window::new("add tracks")
            .collapsible(false)
            .resizable(false)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.label(
                    egui::RichText::new(self.file_browser.current_dir.to_string_lossy())
                        .color(theme.text_dim())
                        .size(12.0),
                );
                ui.separator();
                egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
                    let entries = self.file_browser.entries.clone();
                    for (idx, entry) in entries.iter().enumerate() {
                        let selected = self.file_browser.selected_index == Some(idx);
                        let response = ui.add(
                            FileListItem::new(&entry.name, entry.is_directory, &theme)
                                .selected(selected),
                        );
                        if response.clicked() {
                            self.file_browser.selected_index = Some(idx);
                        }
                        if response.double_clicked() {
                            if entry.is_directory {
                                self.file_browser.navigate_to(entry.path.clone());
                            } else {
                                added.push(entry.path.clone());
                                close = true;
                            }
                        }
                    }
                });
                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("cancel").clicked() {
                        close = true;
                    }
                    if ui.add(AccentButton::new("add selected", &theme).small()).clicked() {
                        if let Some(entry) = self.file_browser.selected_entry() {
                            if !entry.is_directory {
                                added.push(entry.path.clone());
                                close = true;
                            }
                        }
                    }
                    if ui.add(AccentButton::new("add all", &theme).small()).clicked() {
                        added.extend(self.file_browser.files().map(|e| e.path.clone()));
                        close = true;
                    }
                });
            });

        if !added.is_empty() {
            let category = Library::add_destination(&self.selected_category).to_string();
            for path in added {
                self.library.add_track(&category, Track::from_path(&path));
            }
            self.save_library();
        }
        if close {
            self.show_add_tracks = false;
        }
    }

    fn render_new_playlist_dialog(&mut self, ctx: &Context) {
        let theme = self.theme();
        let mut close = false;
        let mut create = false;

        egui::Window::new("new playlist")
            .collapsible(false)
            .resizable(false)
            .default_width(280.0)
            .show(ctx, |ui| {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.new_playlist_name)
                        .hint_text("playlist name"),
                );
                if response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
                    create = true;
                }
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("cancel").clicked() {
                        close = true;
                    }
                    if ui.add(AccentButton::new("create", &theme).small()).clicked() {
                        create = true;
                    }
                });
            });

        if create {
            let name = self.new_playlist_name.clone();
            match self.library.add_category(&name) {
                Ok(()) => {
                    self.selected_category = name.trim().to_string();
                    self.save_library();
                    close = true;
                }
                Err(e) => self.set_status(e),
            }
        }
        if close {
            self.show_new_playlist = false;
        }
    }

    fn render_confirm_dialog(&mut self, ctx: &Context) {
        let theme = self.theme();
        let Some(confirm) = &self.confirm else {
            return;
        };
        let message = match confirm {
            Confirm::DeletePlaylist(name) => format!("Delete the playlist \"{name}\"?"),
            Confirm::RemoveFromLibrary { name, .. } => {
                format!("Remove \"{name}\" from every playlist?")
            }
        };
        let mut close = false;
        let mut accepted = false;

        egui::Window::new("are you sure?")
            .collapsible(false)
            .resizable(false)
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(message).color(theme.text()));
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("cancel").clicked() {
                        close = true;
                    }
                    if ui.add(AccentButton::new("delete", &theme).small()).clicked() {
                        accepted = true;
                    }
                });
            });

        if accepted {
            match self.confirm.take() {
                Some(Confirm::DeletePlaylist(name)) => {
                    match self.library.delete_category(&name) {
                        Ok(()) => {
                            if self.selected_category == name {
                                self.selected_category = ALL_TRACKS.to_string();
                            }
                            self.save_library();
                        }
                        Err(e) => self.set_status(e),
                    }
                }
                Some(Confirm::RemoveFromLibrary { path, .. }) => {
                    let playing = matches!(
                        &self.now_playing,
                        Some(NowPlaying::Track { path: p, .. }) if *p == path
                    );
                    if playing {
                        self.stop();
                    }
                    self.library.remove_track(ALL_TRACKS, &path);
                    self.save_library();
                }
                None => {}
            }
        } else if close {
            self.confirm = None;
        }
    }

    fn render_theme_editor(&mut self, ctx: &Context) {
        let theme = self.theme();
        let Some(editor) = &mut self.theme_editor else {
            return;
        };
        let mut close = false;
        let mut save = false;

        egui::Window::new("theme editor")
            .collapsible(false)
            .resizable(false)
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("name:");
                    ui.text_edit_singleline(&mut editor.name);
                });
                ui.add_space(6.0);
                egui::Grid::new("theme_roles").num_columns(2).show(ui, |ui| {
                    for role in vinylcore::theme::ROLES {
                        ui.label(role.replace('_', " "));
                        let mut color = editor.colors.color(role);
                        if ui.color_edit_button_srgba(&mut color).changed() {
                            editor.colors.set(role, vinylcore::theme::to_hex(color));
                        }
                        ui.end_row();
                    }
                });
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("cancel").clicked() {
                        close = true;
                    }
                    if ui.add(AccentButton::new("save theme", &theme).small()).clicked() {
                        save = true;
                    }
                });
            });

        if save {
            let editor = match self.theme_editor.take() {
                Some(editor) => editor,
                None => return,
            };
            let name = editor.name.trim().to_string();
            if name.is_empty() {
                self.set_status("theme name cannot be empty");
                self.theme_editor = Some(editor);
                return;
            }
            if ThemeSet::is_builtin(&name) {
                self.set_status(format!("\"{name}\" is a built-in theme"));
                self.theme_editor = Some(editor);
                return;
            }
            self.themes.insert(name.clone(), editor.colors);
            if let Err(e) = self.themes.save(&self.themes_path) {
                log::error!("failed to save themes: {e}");
            }
            self.set_theme(ctx, &name);
        } else if close {
            self.theme_editor = None;
        }
    }

    fn render_update_dialog(&mut self, ctx: &Context) {
        let theme = self.theme();
        let Some(manifest) = self.update_available.clone() else {
            self.show_update_dialog = false;
            return;
        };
        let mut close = false;
        let mut install = false;

        egui::Window::new("update available")
            .collapsible(false)
            .resizable(false)
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.label(format!(
                    "version {} is available (you have {})",
                    manifest.latest_version,
                    env!("CARGO_PKG_VERSION")
                ));
                if !manifest.changelog.is_empty() {
                    ui.add_space(4.0);
                    ui.label(egui::RichText::new("what's new:").color(theme.text_dim()));
                    for item in &manifest.changelog {
                        ui.label(format!("· {item}"));
                    }
                }
                ui.add_space(8.0);
                if self.installing_update {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("downloading update...");
                    });
                } else {
                    ui.horizontal(|ui| {
                        if ui.button("later").clicked() {
                            close = true;
                        }
                        if ui
                            .add(AccentButton::new("install and restart", &theme).small())
                            .clicked()
                        {
                            install = true;
                        }
                    });
                }
            });

        if install {
            self.installing_update = true;
            updater::spawn_install(manifest, self.update_tx.clone());
        }
        if close {
            self.show_update_dialog = false;
        }
    }

    fn render_about_dialog(&mut self, ctx: &Context) {
        let mut close = false;
        egui::Window::new("about vinyl")
            .collapsible(false)
            .resizable(false)
            .default_width(300.0)
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("vinyl");
                    ui.label(format!("version {}", env!("CARGO_PKG_VERSION")));
                });
                ui.add_space(8.0);
                ui.separator();
                ui.add_space(4.0);
                ui.label("supported formats:");
                ui.label("  MP3, WAV, FLAC, OGG, AAC");
                ui.add_space(4.0);
                ui.label("features:");
                ui.label("  playlists, ratings, recommendations");
                ui.label("  online search and download (yt-dlp)");
                ui.label("  custom themes");
                ui.add_space(8.0);
                ui.vertical_centered(|ui| {
                    if ui.button("ok").clicked() {
                        close = true;
                    }
                });
            });
        if close {
            self.show_about = false;
        }
    }
}

impl eframe::App for VinylApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.handle_keys(ctx);
        self.check_track_end();
        self.drain_search_events(ctx);
        self.drain_update_events(ctx);
        self.load_cover(ctx);

        // The scrubber and end-of-track poll need steady repaints while
        // audio is running.
        if self.player.is_playing() {
            ctx.request_repaint_after(Duration::from_millis(100));
        } else {
            ctx.request_repaint_after(Duration::from_millis(500));
        }

        let theme = self.theme();

        egui::TopBottomPanel::bottom("status")
            .frame(egui::Frame::none().fill(theme.frame_secondary()))
            .show(ctx, |ui| {
                let total = self.library.tracks(ALL_TRACKS).len();
                let message = self.status.as_deref().unwrap_or("");
                status_bar(
                    ui,
                    &theme,
                    &format!(
                        "{} tracks  |  volume {}%  {}",
                        total,
                        (self.player.master_volume() * 100.0) as i32,
                        message
                    ),
                );
            });

        egui::TopBottomPanel::bottom("player")
            .frame(
                egui::Frame::none()
                    .fill(theme.frame())
                    .inner_margin(egui::Margin::symmetric(10.0, 4.0)),
            )
            .show(ctx, |ui| self.render_player_bar(ui));

        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(200.0)
            .frame(
                egui::Frame::none()
                    .fill(theme.frame())
                    .inner_margin(egui::Margin::same(8.0)),
            )
            .show(ctx, |ui| self.render_sidebar(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                vertical_gradient(
                    ui,
                    ui.max_rect(),
                    theme.gradient_top(),
                    theme.gradient_bottom(),
                );
                egui::Frame::none()
                    .inner_margin(egui::Margin::same(14.0))
                    .show(ui, |ui| match self.view {
                        View::Playlists => self.render_playlist_view(ui),
                        View::Search => self.render_search_view(ui),
                        View::Themes => self.render_themes_view(ctx, ui),
                    });
            });

        if self.show_add_tracks {
            self.render_add_tracks_dialog(ctx);
        }
        if self.show_new_playlist {
            self.render_new_playlist_dialog(ctx);
        }
        if self.theme_editor.is_some() {
            self.render_theme_editor(ctx);
        }
        if self.confirm.is_some() {
            self.render_confirm_dialog(ctx);
        }
        if self.show_update_dialog {
            self.render_update_dialog(ctx);
        }
        if self.show_about {
            self.render_about_dialog(ctx);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.stop();
        self.save_library();
        self.config.save();
    }
}

/// Previews play from temp files; remove the file whenever the preview
/// is stopped or replaced by something else.
fn remove_preview_file(now_playing: &Option<NowPlaying>) {
    if let Some(NowPlaying::Preview { path, .. }) = now_playing {
        let _ = std::fs::remove_file(path);
    }
}

/// "m:ss" for the scrubber and track rows.
fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn is_audio_file(path: &std::path::Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    AUDIO_EXTENSIONS.contains(&ext.as_str())
}

fn collect_audio_files_recursive(dir: &std::path::Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_audio_files_recursive(&path, files);
        } else if is_audio_file(&path) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(59.4), "0:59");
        assert_eq!(format_time(90.0), "1:30");
        assert_eq!(format_time(615.0), "10:15");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(std::path::Path::new("/m/song.MP3")));
        assert!(is_audio_file(std::path::Path::new("/m/song.flac")));
        assert!(!is_audio_file(std::path::Path::new("/m/cover.jpg")));
        assert!(!is_audio_file(std::path::Path::new("/m/noext")));
    }

    #[test]
    fn test_displaced_preview_file_is_removed() {
        let dir = std::env::temp_dir().join(format!("vinyl-preview-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("clip.mp3");
        std::fs::write(&file, b"audio").unwrap();

        let preview = Some(NowPlaying::Preview {
            title: "clip".to_string(),
            path: file.clone(),
        });
        remove_preview_file(&preview);
        assert!(!file.exists());

        // Library tracks are never deleted from disk.
        std::fs::write(&file, b"audio").unwrap();
        let track = Some(NowPlaying::Track {
            category: ALL_TRACKS.to_string(),
            path: file.clone(),
            name: "clip".to_string(),
            artist: "x".to_string(),
            duration: 1.0,
        });
        remove_preview_file(&track);
        remove_preview_file(&None);
        assert!(file.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
