/// Coordinate transforms from normalized boxes to backing-surface pixels,
/// and label chip placement.
use serde::Serialize;

use crate::detection::{BoundingBox, ImageFrame};
use crate::surface::TextMetrics;

/// Rectangle in backing-surface pixels.
///
/// `width`/`height` are signed: a box with inverted corners keeps its negative
/// extent so callers can see the input was malformed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Same area with non-negative extents (how a 2D context strokes it)
    pub fn normalized(&self) -> PixelRect {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        PixelRect { x, y, width, height }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Map a normalized box onto the frame's natural pixel grid.
///
/// The origin is clamped at zero; the extent is not, so `x1 > x2` yields a
/// negative width instead of an error.
pub fn bbox_to_pixel_rect(bbox: &BoundingBox, frame: &ImageFrame) -> PixelRect {
    let frame_width = frame.width as f32;
    let frame_height = frame.height as f32;

    PixelRect {
        x: (bbox.x1 * frame_width).max(0.0),
        y: (bbox.y1 * frame_height).max(0.0),
        width: (bbox.x2 - bbox.x1) * frame_width,
        height: (bbox.y2 - bbox.y1) * frame_height,
    }
}

/// Placement of a label chip and its text
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChipLayout {
    pub background: PixelRect,
    pub text_x: f32,
    pub text_y: f32,
}

/// Place the chip directly above the box's top edge, sized to the text plus padding.
///
/// Without clamping the chip may overhang the surface (negative `y`). With
/// clamping it is pushed back inside `surface_width`.
pub fn layout_label_chip(
    box_rect: &PixelRect,
    text: TextMetrics,
    padding: f32,
    surface_width: u32,
    clamp: bool,
) -> ChipLayout {
    let chip_width = text.width + padding * 2.0;
    let chip_height = text.height + padding * 2.0;

    let mut x = box_rect.x;
    let mut y = box_rect.y - chip_height;

    if clamp {
        let max_x = (surface_width as f32 - chip_width).max(0.0);
        x = x.clamp(0.0, max_x);
        y = y.max(0.0);
    }

    ChipLayout {
        background: PixelRect::new(x, y, chip_width, chip_height),
        text_x: x + padding,
        text_y: y + padding,
    }
}
