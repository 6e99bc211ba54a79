//! Speech-bubble layout and drawing.

use town_shared::{
    math::{Rect, Vec2},
    render::{Color, RenderBackend, TextMeasure, TextStyle},
};

pub const BUBBLE_MAX_WIDTH: f32 = 200.0;
pub const BUBBLE_PADDING: f32 = 10.0;
pub const BUBBLE_LINE_HEIGHT: f32 = 16.0;
pub const BUBBLE_MAX_LINES: usize = 3;
pub const BUBBLE_FONT_PX: f32 = 12.0;
/// Gap between the pointer tip and the bubble body.
pub const BUBBLE_POINTER_GAP: f32 = 10.0;
pub const BUBBLE_POINTER_HALF_WIDTH: f32 = 8.0;

const BUBBLE_FILL: Color = Color::rgba(255, 255, 255, 242);
const BUBBLE_BORDER: Color = Color::rgb(0x33, 0x33, 0x33);

/// Where a bubble and its text go.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleLayout {
    pub lines: Vec<String>,
    pub body: Rect,
    /// Tip first, then the two base corners on the body's bottom edge.
    pub pointer: [Vec2; 3],
}

/// Greedy word wrap: words are added to the current line until it would be
/// wider than `max_width`. A single word wider than that gets its own line.
pub fn wrap_words<M: TextMeasure + ?Sized>(text: &str, max_width: f32, measure: &M) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure.text_width(&candidate, BUBBLE_FONT_PX) > max_width && !current.is_empty() {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lays out a bubble whose pointer tip sits at `anchor`.
pub fn layout_bubble<M: TextMeasure + ?Sized>(text: &str, anchor: Vec2, measure: &M) -> BubbleLayout {
    let mut lines = wrap_words(text, BUBBLE_MAX_WIDTH - BUBBLE_PADDING * 2.0, measure);
    if lines.len() > BUBBLE_MAX_LINES {
        lines.truncate(BUBBLE_MAX_LINES);
        if let Some(last) = lines.last_mut() {
            last.push_str("...");
        }
    }

    let widest = lines
        .iter()
        .map(|l| measure.text_width(l, BUBBLE_FONT_PX))
        .fold(0.0_f32, f32::max);
    let width = BUBBLE_MAX_WIDTH.min(widest + BUBBLE_PADDING * 2.0);
    let height = lines.len() as f32 * BUBBLE_LINE_HEIGHT + BUBBLE_PADDING * 2.0;

    let body = Rect::new(
        anchor.x - width / 2.0,
        anchor.y - height - BUBBLE_POINTER_GAP,
        width,
        height,
    );
    let base_y = body.y + body.h;
    BubbleLayout {
        lines,
        body,
        pointer: [
            anchor,
            Vec2::new(anchor.x - BUBBLE_POINTER_HALF_WIDTH, base_y),
            Vec2::new(anchor.x + BUBBLE_POINTER_HALF_WIDTH, base_y),
        ],
    }
}

/// Draws a bubble for `text` with its pointer at `anchor`.
pub fn draw_bubble(backend: &mut dyn RenderBackend, text: &str, anchor: Vec2) {
    let layout = layout_bubble(text, anchor, &*backend);
    backend.fill_rect(layout.body, BUBBLE_FILL);
    backend.stroke_rect(layout.body, BUBBLE_BORDER, 2.0);
    backend.triangle(layout.pointer, BUBBLE_FILL, BUBBLE_BORDER);

    let style = TextStyle::new(BUBBLE_FONT_PX, Color::BLACK);
    for (i, line) in layout.lines.iter().enumerate() {
        backend.fill_text(
            line,
            Vec2::new(
                layout.body.x + BUBBLE_PADDING,
                layout.body.y + BUBBLE_PADDING + i as f32 * BUBBLE_LINE_HEIGHT,
            ),
            style,
        );
    }
}
