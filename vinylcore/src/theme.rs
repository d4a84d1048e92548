//! vinyl themes
//!
//! A theme is a flat mapping of named color roles to hex color values.
//! Themes are persisted wholesale in `themes.json`; missing roles are
//! backfilled from the built-in theme of the same name on load, so old
//! theme files keep working when new roles appear.

use egui::{Color32, Rounding, Stroke, Style, Visuals};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::storage;

/// Name of the theme used when nothing else is configured.
pub const DEFAULT_THEME: &str = "Midnight";

/// Color roles, in the order the theme editor presents them.
pub const ROLES: [&str; 11] = [
    "gradient_top",
    "gradient_bottom",
    "bg",
    "frame",
    "frame_secondary",
    "accent",
    "hover",
    "text",
    "text_dim",
    "text_bright",
    "text_on_accent",
];

/// Fallback for unparsable color strings.
const FALLBACK: Color32 = Color32::from_rgb(128, 128, 128);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub gradient_top: String,
    pub gradient_bottom: String,
    pub bg: String,
    pub frame: String,
    pub frame_secondary: String,
    pub accent: String,
    pub hover: String,
    pub text: String,
    pub text_dim: String,
    pub text_bright: String,
    pub text_on_accent: String,
}

impl ThemeColors {
    pub fn get(&self, role: &str) -> Option<&str> {
        match role {
            "gradient_top" => Some(&self.gradient_top),
            "gradient_bottom" => Some(&self.gradient_bottom),
            "bg" => Some(&self.bg),
            "frame" => Some(&self.frame),
            "frame_secondary" => Some(&self.frame_secondary),
            "accent" => Some(&self.accent),
            "hover" => Some(&self.hover),
            "text" => Some(&self.text),
            "text_dim" => Some(&self.text_dim),
            "text_bright" => Some(&self.text_bright),
            "text_on_accent" => Some(&self.text_on_accent),
            _ => None,
        }
    }

    pub fn set(&mut self, role: &str, value: String) {
        match role {
            "gradient_top" => self.gradient_top = value,
            "gradient_bottom" => self.gradient_bottom = value,
            "bg" => self.bg = value,
            "frame" => self.frame = value,
            "frame_secondary" => self.frame_secondary = value,
            "accent" => self.accent = value,
            "hover" => self.hover = value,
            "text" => self.text = value,
            "text_dim" => self.text_dim = value,
            "text_bright" => self.text_bright = value,
            "text_on_accent" => self.text_on_accent = value,
            _ => {}
        }
    }

    /// Parsed color for a role. Unknown roles and bad hex strings fall
    /// back to a neutral grey rather than panicking.
    pub fn color(&self, role: &str) -> Color32 {
        self.get(role).and_then(parse_hex).unwrap_or(FALLBACK)
    }

    pub fn gradient_top(&self) -> Color32 { self.color("gradient_top") }
    pub fn gradient_bottom(&self) -> Color32 { self.color("gradient_bottom") }
    pub fn bg(&self) -> Color32 { self.color("bg") }
    pub fn frame(&self) -> Color32 { self.color("frame") }
    pub fn frame_secondary(&self) -> Color32 { self.color("frame_secondary") }
    pub fn accent(&self) -> Color32 { self.color("accent") }
    pub fn hover(&self) -> Color32 { self.color("hover") }
    pub fn text(&self) -> Color32 { self.color("text") }
    pub fn text_dim(&self) -> Color32 { self.color("text_dim") }
    pub fn text_bright(&self) -> Color32 { self.color("text_bright") }
    pub fn text_on_accent(&self) -> Color32 { self.color("text_on_accent") }

    /// Dark themes brighten surfaces on hover, light themes darken them.
    pub fn is_dark(&self) -> bool {
        let bg = self.bg();
        (bg.r() as u32 + bg.g() as u32 + bg.b() as u32) < 3 * 128
    }

    /// Surface color for hovered rows and secondary containers.
    pub fn hover_surface(&self) -> Color32 {
        let factor = if self.is_dark() { 1.2 } else { 0.92 };
        adjust_brightness(self.frame(), factor)
    }

    /// Style an egui context from this theme.
    pub fn apply(&self, ctx: &egui::Context) {
        let mut style = Style::default();
        let mut visuals = if self.is_dark() { Visuals::dark() } else { Visuals::light() };

        visuals.window_fill = self.frame();
        visuals.panel_fill = self.frame();
        visuals.faint_bg_color = self.frame_secondary();
        visuals.extreme_bg_color = self.frame_secondary();
        visuals.window_stroke = Stroke::new(1.0, self.frame_secondary());
        visuals.window_rounding = Rounding::same(8.0);
        visuals.menu_rounding = Rounding::same(6.0);
        visuals.override_text_color = Some(self.text());

        visuals.widgets.noninteractive.bg_fill = self.frame();
        visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, self.text_dim());
        visuals.widgets.inactive.bg_fill = self.frame_secondary();
        visuals.widgets.inactive.weak_bg_fill = self.frame_secondary();
        visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, self.text());
        visuals.widgets.hovered.bg_fill = self.hover_surface();
        visuals.widgets.hovered.weak_bg_fill = self.hover_surface();
        visuals.widgets.hovered.fg_stroke = Stroke::new(1.0, self.text_bright());
        visuals.widgets.active.bg_fill = self.accent();
        visuals.widgets.active.weak_bg_fill = self.accent();
        visuals.widgets.active.fg_stroke = Stroke::new(1.0, self.text_on_accent());
        visuals.widgets.open.bg_fill = self.frame_secondary();
        visuals.widgets.open.weak_bg_fill = self.frame_secondary();
        visuals.widgets.open.fg_stroke = Stroke::new(1.0, self.text_bright());

        visuals.selection.bg_fill = self.accent();
        visuals.selection.stroke = Stroke::new(1.0, self.text_on_accent());
        visuals.hyperlink_color = self.accent();

        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(6.0, 6.0);
        style.spacing.button_padding = egui::vec2(10.0, 5.0);
        style.spacing.window_margin = egui::Margin::same(10.0);
        ctx.set_style(style);
    }
}

/// The full set of themes, keyed by display name.
#[derive(Clone, Debug)]
pub struct ThemeSet {
    themes: BTreeMap<String, ThemeColors>,
}

impl Default for ThemeSet {
    fn default() -> Self {
        Self { themes: Self::builtins() }
    }
}

impl ThemeSet {
    /// Built-in themes. These always exist and their names are reserved.
    pub fn builtins() -> BTreeMap<String, ThemeColors> {
        let mut themes = BTreeMap::new();
        themes.insert(
            "Midnight".to_string(),
            ThemeColors {
                gradient_top: "#2a2a2a".into(),
                gradient_bottom: "#121212".into(),
                bg: "#121212".into(),
                frame: "#1c1c1c".into(),
                frame_secondary: "#121212".into(),
                accent: "#ffd600".into(),
                hover: "#f9e04a".into(),
                text: "#ffffff".into(),
                text_dim: "#b3b3b3".into(),
                text_bright: "#ffffff".into(),
                text_on_accent: "#000000".into(),
            },
        );
        themes.insert(
            "Aurora".to_string(),
            ThemeColors {
                gradient_top: "#e9eef2".into(),
                gradient_bottom: "#f4f6f8".into(),
                bg: "#ffffff".into(),
                frame: "#e9eef2".into(),
                frame_secondary: "#dfe5ea".into(),
                accent: "#0077c2".into(),
                hover: "#005a9e".into(),
                text: "#000000".into(),
                text_dim: "#555555".into(),
                text_bright: "#000000".into(),
                text_on_accent: "#ffffff".into(),
            },
        );
        themes.insert(
            "Deep Space".to_string(),
            ThemeColors {
                gradient_top: "#0f0c29".into(),
                gradient_bottom: "#24243e".into(),
                bg: "#0f0c29".into(),
                frame: "#1f1f3a".into(),
                frame_secondary: "#1a1a32".into(),
                accent: "#7e57c2".into(),
                hover: "#5e35b1".into(),
                text: "#e0e0e0".into(),
                text_dim: "#9e9e9e".into(),
                text_bright: "#ffffff".into(),
                text_on_accent: "#ffffff".into(),
            },
        );
        themes.insert(
            "Violet Dusk".to_string(),
            ThemeColors {
                gradient_top: "#2c2a4a".into(),
                gradient_bottom: "#1e1c32".into(),
                bg: "#2c2a4a".into(),
                frame: "#3b3861".into(),
                frame_secondary: "#302e52".into(),
                accent: "#c792ea".into(),
                hover: "#e1b6ff".into(),
                text: "#e0e0e0".into(),
                text_dim: "#a0a0a0".into(),
                text_bright: "#ffffff".into(),
                text_on_accent: "#000000".into(),
            },
        );
        themes.insert(
            "Lavender Light".to_string(),
            ThemeColors {
                gradient_top: "#f2e7fe".into(),
                gradient_bottom: "#e8d9f5".into(),
                bg: "#f2e7fe".into(),
                frame: "#e8d9f5".into(),
                frame_secondary: "#ddcde8".into(),
                accent: "#8e44ad".into(),
                hover: "#a569bd".into(),
                text: "#333333".into(),
                text_dim: "#666666".into(),
                text_bright: "#000000".into(),
                text_on_accent: "#ffffff".into(),
            },
        );
        themes
    }

    pub fn is_builtin(name: &str) -> bool {
        matches!(
            name,
            "Midnight" | "Aurora" | "Deep Space" | "Violet Dusk" | "Lavender Light"
        )
    }

    /// Load themes from disk. Roles missing from a stored theme are
    /// backfilled from the built-in of the same name (or the default
    /// theme). A missing or corrupt file recreates the defaults on disk.
    pub fn load(path: &Path) -> Self {
        let raw: BTreeMap<String, serde_json::Map<String, serde_json::Value>> =
            match storage::load_json(path) {
                Ok(raw) => raw,
                Err(_) => {
                    let set = Self::default();
                    let _ = set.save(path);
                    return set;
                }
            };

        let builtins = Self::builtins();
        let mut themes = BTreeMap::new();
        for (name, fields) in raw {
            let reference = builtins
                .get(&name)
                .or_else(|| builtins.get(DEFAULT_THEME))
                .cloned()
                .unwrap_or_else(|| Self::builtins()[DEFAULT_THEME].clone());
            let mut theme = reference;
            for role in ROLES {
                if let Some(value) = fields.get(role).and_then(|v| v.as_str()) {
                    theme.set(role, value.to_string());
                }
            }
            themes.insert(name, theme);
        }
        // Built-ins deleted from the file come back on load.
        for (name, theme) in builtins {
            themes.entry(name).or_insert(theme);
        }
        Self { themes }
    }

    pub fn save(&self, path: &Path) -> storage::Result<()> {
        storage::save_json(path, &self.themes)
    }

    /// Theme by name, falling back to the default theme.
    pub fn get(&self, name: &str) -> &ThemeColors {
        self.themes
            .get(name)
            .or_else(|| self.themes.get(DEFAULT_THEME))
            .or_else(|| self.themes.values().next())
            .expect("theme set is never empty")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    pub fn insert(&mut self, name: String, theme: ThemeColors) {
        self.themes.insert(name, theme);
    }

    /// Remove a user theme. Built-ins cannot be removed.
    pub fn remove(&mut self, name: &str) -> bool {
        if Self::is_builtin(name) {
            return false;
        }
        self.themes.remove(name).is_some()
    }

    /// Display order: built-ins first, then user themes sorted by name.
    pub fn names_ordered(&self) -> Vec<String> {
        let mut names: Vec<String> = Self::builtins().keys().cloned().collect();
        let mut user: Vec<String> = self
            .themes
            .keys()
            .filter(|n| !Self::is_builtin(n))
            .cloned()
            .collect();
        user.sort();
        names.extend(user);
        names
    }
}

/// Parse a `#rrggbb` (or `rrggbb`) hex color string.
pub fn parse_hex(s: &str) -> Option<Color32> {
    let s = s.trim().strip_prefix('#').unwrap_or_else(|| s.trim());
    if s.len() != 6 || !s.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}

/// Format a color back into the `#rrggbb` form stored in themes.json.
pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

/// Scale a color's channels by `factor`, clamping to the valid range.
pub fn adjust_brightness(color: Color32, factor: f32) -> Color32 {
    let scale = |c: u8| ((c as f32 * factor).round().clamp(0.0, 255.0)) as u8;
    Color32::from_rgb(scale(color.r()), scale(color.g()), scale(color.b()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vinyl-theme-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("themes.json")
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#ffd600"), Some(Color32::from_rgb(255, 214, 0)));
        assert_eq!(parse_hex("FFD600"), Some(Color32::from_rgb(255, 214, 0)));
        assert_eq!(parse_hex("#fff"), None);
        assert_eq!(parse_hex("not a color"), None);
        assert_eq!(parse_hex(""), None);
    }

    #[test]
    fn test_hex_round_trip() {
        let color = Color32::from_rgb(30, 144, 255);
        assert_eq!(parse_hex(&to_hex(color)), Some(color));
    }

    #[test]
    fn test_missing_roles_backfilled_from_same_builtin() {
        let path = scratch_file("backfill");
        // "Aurora" stored with only an accent override.
        std::fs::write(&path, r##"{ "Aurora": { "accent": "#123456" } }"##).unwrap();

        let set = ThemeSet::load(&path);
        let aurora = set.get("Aurora");
        assert_eq!(aurora.accent, "#123456");
        // Every other role comes from the Aurora built-in, not Midnight.
        assert_eq!(aurora.bg, ThemeSet::builtins()["Aurora"].bg);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_unknown_theme_backfills_from_default() {
        let path = scratch_file("unknown");
        std::fs::write(&path, r##"{ "Custom": { "accent": "#abcdef" } }"##).unwrap();

        let set = ThemeSet::load(&path);
        let custom = set.get("Custom");
        assert_eq!(custom.accent, "#abcdef");
        assert_eq!(custom.bg, ThemeSet::builtins()[DEFAULT_THEME].bg);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_recreates_defaults() {
        let path = scratch_file("corrupt");
        std::fs::write(&path, "{ not json").unwrap();

        let set = ThemeSet::load(&path);
        assert!(set.contains(DEFAULT_THEME));
        // The file was rewritten with valid defaults.
        let reloaded = ThemeSet::load(&path);
        assert_eq!(reloaded.get(DEFAULT_THEME), set.get(DEFAULT_THEME));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_builtins_cannot_be_removed() {
        let mut set = ThemeSet::default();
        assert!(!set.remove("Midnight"));
        assert!(set.contains("Midnight"));

        set.insert("Mine".into(), set.get("Midnight").clone());
        assert!(set.remove("Mine"));
        assert!(!set.contains("Mine"));
    }

    #[test]
    fn test_deleted_builtin_restored_on_load() {
        let path = scratch_file("restore");
        std::fs::write(&path, r##"{ "Custom": { "accent": "#abcdef" } }"##).unwrap();

        let set = ThemeSet::load(&path);
        for name in ThemeSet::builtins().keys() {
            assert!(set.contains(name), "missing builtin {name}");
        }

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_set_round_trip() {
        let path = scratch_file("roundtrip");
        let mut set = ThemeSet::default();
        let mut custom = set.get("Deep Space").clone();
        custom.set("accent", "#00ff88".into());
        set.insert("Neon".into(), custom.clone());
        set.save(&path).unwrap();

        let reloaded = ThemeSet::load(&path);
        assert_eq!(reloaded.get("Neon"), &custom);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_ordering_builtins_first() {
        let mut set = ThemeSet::default();
        set.insert("AAA Custom".into(), set.get("Midnight").clone());
        let names = set.names_ordered();
        assert_eq!(names.last().map(String::as_str), Some("AAA Custom"));
        assert_eq!(names.len(), 6);
    }
}
