//! Drawing backend abstraction.
//!
//! The engine never talks to a graphics API directly. Objects and scenes draw
//! through [`Canvas`], which a windowing backend implements. [`RecordingCanvas`]
//! keeps the issued commands around for headless runs and tests.

use serde::{Deserialize, Serialize};

use crate::assets::{FontHandle, MediaHandle};

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::gray(0);
    pub const WHITE: Color = Color::gray(255);
    pub const MAGENTA: Color = Color::rgb(255, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn gray(level: u8) -> Self {
        Self::rgb(level, level, level)
    }

    /// Builds a color from a `0xRRGGBB` value.
    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Immediate mode drawing surface implemented by the graphics backend.
pub trait Canvas {
    fn clear_background(&mut self, color: Color);

    fn set_color(&mut self, color: Color);

    fn set_fill(&mut self, filled: bool);

    fn draw_pixel(&mut self, x: f32, y: f32);

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32);

    /// Corner based rectangle.
    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn draw_text(&mut self, font: &FontHandle, text: &str, x: f32, y: f32);

    fn draw_media(&mut self, media: &MediaHandle, x: f32, y: f32, width: f32, height: f32);

    /// Bounding box of `text` rendered with `font`.
    fn text_size(&self, font: &FontHandle, text: &str) -> (f32, f32) {
        let width = text.chars().count() as f32 * font.size as f32 * 0.6;
        (width, font.size as f32)
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Background(Color),
    Color(Color),
    Fill(bool),
    Pixel { x: f32, y: f32 },
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
    Rect { x: f32, y: f32, width: f32, height: f32 },
    Text { text: String, x: f32, y: f32 },
    Media { path: String, x: f32, y: f32, width: f32, height: f32 },
}

/// Canvas that keeps track of every command issued since the last
/// [`RecordingCanvas::take`].
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Texts drawn so far, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of shape, text and media commands, ignoring state changes.
    pub fn primitive_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| {
                !matches!(
                    command,
                    DrawCommand::Background(_) | DrawCommand::Color(_) | DrawCommand::Fill(_)
                )
            })
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn clear_background(&mut self, color: Color) {
        self.commands.push(DrawCommand::Background(color));
    }

    fn set_color(&mut self, color: Color) {
        self.commands.push(DrawCommand::Color(color));
    }

    fn set_fill(&mut self, filled: bool) {
        self.commands.push(DrawCommand::Fill(filled));
    }

    fn draw_pixel(&mut self, x: f32, y: f32) {
        self.commands.push(DrawCommand::Pixel { x, y });
    }

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.commands.push(DrawCommand::Line { x1, y1, x2, y2 });
    }

    fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
        });
    }

    fn draw_text(&mut self, _font: &FontHandle, text: &str, x: f32, y: f32) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn draw_media(&mut self, media: &MediaHandle, x: f32, y: f32, width: f32, height: f32) {
        self.commands.push(DrawCommand::Media {
            path: media.path.display().to_string(),
            x,
            y,
            width,
            height,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_unpack_channels() {
        assert_eq!(Color::from_hex(0xFF00FF), Color::MAGENTA);
        assert_eq!(Color::from_hex(0x102030), Color::rgb(0x10, 0x20, 0x30));
    }

    #[test]
    fn recording_canvas_counts_primitives_only() {
        let mut canvas = RecordingCanvas::new();
        canvas.clear_background(Color::BLACK);
        canvas.set_color(Color::WHITE);
        canvas.draw_rect(0.0, 0.0, 10.0, 10.0);
        canvas.draw_line(0.0, 0.0, 1.0, 1.0);

        assert_eq!(canvas.primitive_count(), 2);
        assert_eq!(canvas.take().len(), 4);
        assert!(canvas.commands().is_empty());
    }
}
