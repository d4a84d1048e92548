//! vinylcore — shared library for the vinyl music player

pub mod storage;
pub mod theme;
pub mod widgets;

pub use theme::{ThemeColors, ThemeSet};
