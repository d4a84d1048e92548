//! vinyl - a themeable desktop music player.
//!
//! Playlists, score-weighted recommendations, online search and
//! download via yt-dlp, custom color themes, and self-update.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod config;
mod library;
mod playback;
mod search;
mod updater;

use app::VinylApp;
use eframe::NativeOptions;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_min_inner_size([950.0, 650.0])
            .with_title("vinyl"),
        ..Default::default()
    };

    eframe::run_native(
        "vinyl",
        options,
        Box::new(|cc| Box::new(VinylApp::new(cc))),
    )
}
