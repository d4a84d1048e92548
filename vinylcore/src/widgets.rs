//! Custom widgets, painted from the active theme's color roles.

use crate::theme::{adjust_brightness, ThemeColors};
use egui::{Color32, Rect, Response, Rounding, Sense, Ui, Widget};

/// Paint a vertical gradient across `rect`.
pub fn vertical_gradient(ui: &Ui, rect: Rect, top: Color32, bottom: Color32) {
    let mut mesh = egui::Mesh::default();
    mesh.colored_vertex(rect.left_top(), top);
    mesh.colored_vertex(rect.right_top(), top);
    mesh.colored_vertex(rect.right_bottom(), bottom);
    mesh.colored_vertex(rect.left_bottom(), bottom);
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    ui.painter().add(egui::Shape::mesh(mesh));
}

/// A filled pill button in the theme's accent color.
pub struct AccentButton<'a> {
    text: &'a str,
    theme: &'a ThemeColors,
    small: bool,
}

impl<'a> AccentButton<'a> {
    pub fn new(text: &'a str, theme: &'a ThemeColors) -> Self {
        Self { text, theme, small: false }
    }

    pub fn small(mut self) -> Self {
        self.small = true;
        self
    }
}

impl<'a> Widget for AccentButton<'a> {
    fn ui(self, ui: &mut Ui) -> Response {
        let font = if self.small {
            egui::FontId::proportional(13.0)
        } else {
            egui::FontId::proportional(15.0)
        };
        let galley = ui.fonts(|f| {
            f.layout_no_wrap(self.text.to_string(), font.clone(), self.theme.text_on_accent())
        });
        let padding = if self.small {
            egui::vec2(12.0, 4.0)
        } else {
            egui::vec2(18.0, 7.0)
        };
        let desired = galley.size() + padding * 2.0;
        let (rect, response) = ui.allocate_exact_size(desired, Sense::click());

        if ui.is_rect_visible(rect) {
            let fill = if response.is_pointer_button_down_on() {
                adjust_brightness(self.theme.accent(), 0.85)
            } else if response.hovered() {
                self.theme.hover()
            } else {
                self.theme.accent()
            };
            let painter = ui.painter();
            painter.rect_filled(rect, Rounding::same(rect.height() / 2.0), fill);
            painter.galley(
                rect.center() - galley.size() / 2.0,
                galley,
                self.theme.text_on_accent(),
            );
        }

        response
    }
}

/// What happened to a [`BarSlider`] this frame.
pub struct BarResponse {
    pub response: Response,
    /// Fraction under the pointer while it is held down on the bar.
    pub value: Option<f32>,
}

/// A horizontal progress or volume bar with a draggable fill.
///
/// The caller decides when to commit the value: volume applies it every
/// frame, seeking waits for the pointer to be released.
pub struct BarSlider<'a> {
    fraction: f32,
    theme: &'a ThemeColors,
    height: f32,
    desired_width: Option<f32>,
    knob: bool,
}

impl<'a> BarSlider<'a> {
    pub fn new(fraction: f32, theme: &'a ThemeColors) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            theme,
            height: 6.0,
            desired_width: None,
            knob: true,
        }
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.desired_width = Some(width);
        self
    }

    pub fn knob(mut self, knob: bool) -> Self {
        self.knob = knob;
        self
    }

    pub fn show(self, ui: &mut Ui) -> BarResponse {
        let width = self.desired_width.unwrap_or_else(|| ui.available_width());
        // Extra vertical slack so the bar is easy to grab.
        let (rect, response) = ui.allocate_exact_size(
            egui::vec2(width, self.height.max(14.0)),
            Sense::click_and_drag(),
        );

        let value = if response.is_pointer_button_down_on() || response.dragged() {
            response
                .interact_pointer_pos()
                .map(|pos| ((pos.x - rect.left()) / rect.width()).clamp(0.0, 1.0))
        } else {
            None
        };
        let shown = value.unwrap_or(self.fraction);

        if ui.is_rect_visible(rect) {
            let bar = Rect::from_center_size(rect.center(), egui::vec2(rect.width(), self.height));
            let rounding = Rounding::same(self.height / 2.0);
            let painter = ui.painter();
            painter.rect_filled(bar, rounding, self.theme.frame_secondary());

            let mut fill = bar;
            fill.set_width(bar.width() * shown);
            let fill_color = if response.hovered() || value.is_some() {
                self.theme.hover()
            } else {
                self.theme.accent()
            };
            painter.rect_filled(fill, rounding, fill_color);

            if self.knob && (response.hovered() || value.is_some()) {
                painter.circle_filled(
                    egui::pos2(fill.right(), bar.center().y),
                    self.height * 0.9,
                    self.theme.text_bright(),
                );
            }
        }

        BarResponse { response, value }
    }
}

/// Status bar along the bottom edge of the window.
pub fn status_bar(ui: &mut Ui, theme: &ThemeColors, text: &str) {
    egui::Frame::none()
        .fill(theme.frame_secondary())
        .inner_margin(egui::Margin::symmetric(10.0, 3.0))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(text).color(theme.text_dim()).size(12.0));
        });
}

/// File list row for the add-tracks dialog.
pub struct FileListItem<'a> {
    name: &'a str,
    is_directory: bool,
    selected: bool,
    theme: &'a ThemeColors,
}

impl<'a> FileListItem<'a> {
    pub fn new(name: &'a str, is_directory: bool, theme: &'a ThemeColors) -> Self {
        Self { name, is_directory, selected: false, theme }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

impl<'a> Widget for FileListItem<'a> {
    fn ui(self, ui: &mut Ui) -> Response {
        let height = 22.0;
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(ui.available_width(), height), Sense::click());

        if ui.is_rect_visible(rect) {
            let painter = ui.painter();
            let rounding = Rounding::same(4.0);

            let text_color = if self.selected {
                painter.rect_filled(rect, rounding, self.theme.accent());
                self.theme.text_on_accent()
            } else if response.hovered() {
                painter.rect_filled(rect, rounding, self.theme.hover_surface());
                self.theme.text_bright()
            } else {
                self.theme.text()
            };

            let icon = if self.is_directory { "📁" } else { "🎵" };
            painter.text(
                egui::pos2(rect.min.x + 6.0, rect.center().y),
                egui::Align2::LEFT_CENTER,
                icon,
                egui::FontId::proportional(12.0),
                text_color,
            );
            painter.text(
                egui::pos2(rect.min.x + 28.0, rect.center().y),
                egui::Align2::LEFT_CENTER,
                self.name,
                egui::FontId::proportional(13.0),
                text_color,
            );
        }

        response
    }
}

/// Small round icon button used in the transport controls.
pub struct IconButton<'a> {
    icon: &'a str,
    theme: &'a ThemeColors,
    size: f32,
    active: bool,
    filled: bool,
}

impl<'a> IconButton<'a> {
    pub fn new(icon: &'a str, theme: &'a ThemeColors) -> Self {
        Self { icon, theme, size: 28.0, active: false, filled: false }
    }

    pub fn size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    /// Tint the icon with the accent color (toggled modes).
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Solid accent circle behind the icon (the play button).
    pub fn filled(mut self, filled: bool) -> Self {
        self.filled = filled;
        self
    }
}

impl<'a> Widget for IconButton<'a> {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(egui::vec2(self.size, self.size), Sense::click());

        if ui.is_rect_visible(rect) {
            let painter = ui.painter();
            if self.filled {
                let fill = if response.hovered() {
                    self.theme.hover()
                } else {
                    self.theme.accent()
                };
                painter.circle_filled(rect.center(), self.size / 2.0, fill);
            } else if response.hovered() {
                painter.circle_filled(rect.center(), self.size / 2.0, self.theme.hover_surface());
            }

            let color = if self.filled {
                self.theme.text_on_accent()
            } else if self.active {
                self.theme.accent()
            } else if response.hovered() {
                self.theme.text_bright()
            } else {
                self.theme.text_dim()
            };
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                self.icon,
                egui::FontId::proportional(self.size * 0.55),
                color,
            );
        }

        response.on_hover_cursor(egui::CursorIcon::PointingHand)
    }
}

/// Section heading used at the top of each view.
pub fn view_heading(ui: &mut Ui, theme: &ThemeColors, text: &str) {
    ui.label(
        egui::RichText::new(text)
            .color(theme.text_bright())
            .size(22.0)
            .strong(),
    );
    ui.add_space(4.0);
    let (rect, _) = ui.allocate_exact_size(egui::vec2(36.0, 3.0), Sense::hover());
    ui.painter().rect_filled(rect, Rounding::same(1.5), theme.accent());
    ui.add_space(8.0);
}
