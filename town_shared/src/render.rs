//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The scene renderer talks to a 2D canvas-like API; a windowed backend
//! would implement [`RenderBackend`] on top of its surface. Images are
//! referenced by asset path so the backend owns texture upload.

use crate::math::{Rect, Vec2};

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Self = Self::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Horizontal anchor of drawn text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

/// Font and placement for a text draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_px: f32,
    pub bold: bool,
    pub color: Color,
    pub align: TextAlign,
}

impl TextStyle {
    pub const fn new(size_px: f32, color: Color) -> Self {
        Self {
            size_px,
            bold: false,
            color,
            align: TextAlign::Left,
        }
    }

    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub const fn centered(mut self) -> Self {
        self.align = TextAlign::Center;
        self
    }
}

/// Measures rendered text width in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str, size_px: f32) -> f32;
}

/// Monospace approximation: every glyph is 0.6 em wide.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonospaceMeasure;

impl TextMeasure for MonospaceMeasure {
    fn text_width(&self, text: &str, size_px: f32) -> f32 {
        text.chars().count() as f32 * size_px * 0.6
    }
}

/// A minimal 2D rendering API.
pub trait RenderBackend: TextMeasure {
    /// Canvas size in pixels.
    fn size(&self) -> (f32, f32);
    fn begin_frame(&mut self);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f32);
    fn line(&mut self, from: Vec2, to: Vec2, color: Color);
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color);
    fn triangle(&mut self, points: [Vec2; 3], fill: Color, stroke: Color);
    /// Draws the `src` region of an image (whole image when `None`) into `dst`.
    fn draw_image(&mut self, asset: &str, src: Option<Rect>, dst: Rect);
    fn fill_text(&mut self, text: &str, at: Vec2, style: TextStyle);
    fn end_frame(&mut self);
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    FillRect(Rect, Color),
    StrokeRect(Rect, Color),
    Line(Vec2, Vec2, Color),
    Circle(Vec2, f32, Color),
    Triangle([Vec2; 3], Color),
    Image {
        asset: String,
        src: Option<Rect>,
        dst: Rect,
    },
    Text {
        text: String,
        at: Vec2,
        style: TextStyle,
    },
}

/// Headless renderer that records the last frame's draw calls.
#[derive(Debug, Clone)]
pub struct RecordingRenderer {
    width: f32,
    height: f32,
    frames: u64,
    pub commands: Vec<DrawCmd>,
}

impl RecordingRenderer {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            frames: 0,
            commands: Vec::new(),
        }
    }

    /// Frames begun so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Texts drawn in the last frame, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Image draws in the last frame, in draw order.
    pub fn images(&self) -> Vec<(&str, Option<Rect>, Rect)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Image { asset, src, dst } => Some((asset.as_str(), *src, *dst)),
                _ => None,
            })
            .collect()
    }

    pub fn circles(&self) -> Vec<(Vec2, f32, Color)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Circle(at, r, color) => Some((*at, *r, *color)),
                _ => None,
            })
            .collect()
    }
}

impl TextMeasure for RecordingRenderer {
    fn text_width(&self, text: &str, size_px: f32) -> f32 {
        MonospaceMeasure.text_width(text, size_px)
    }
}

impl RenderBackend for RecordingRenderer {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) {
        self.frames += 1;
        self.commands.clear();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCmd::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, _line_width: f32) {
        self.commands.push(DrawCmd::StrokeRect(rect, color));
    }

    fn line(&mut self, from: Vec2, to: Vec2, color: Color) {
        self.commands.push(DrawCmd::Line(from, to, color));
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCmd::Circle(center, radius, color));
    }

    fn triangle(&mut self, points: [Vec2; 3], fill: Color, _stroke: Color) {
        self.commands.push(DrawCmd::Triangle(points, fill));
    }

    fn draw_image(&mut self, asset: &str, src: Option<Rect>, dst: Rect) {
        self.commands.push(DrawCmd::Image {
            asset: asset.to_string(),
            src,
            dst,
        });
    }

    fn fill_text(&mut self, text: &str, at: Vec2, style: TextStyle) {
        self.commands.push(DrawCmd::Text {
            text: text.to_string(),
            at,
            style,
        });
    }

    fn end_frame(&mut self) {}
}
