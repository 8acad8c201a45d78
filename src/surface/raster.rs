/// RGBA raster surface
///
/// Backing store is an `RgbaImage` at the image's natural resolution. Shapes
/// are drawn with `imageproc` through its alpha-blending canvas, so the
/// semi-opaque label chips composite correctly over the transparent layer.
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, Blend};
use imageproc::rect::Rect;

use crate::font::LabelFont;
use crate::overlay::geometry::PixelRect;
use super::{Rgba8, Surface, TextMetrics};

pub struct RasterSurface {
    pixels: RgbaImage,
    css: (f32, f32),
    font: LabelFont,
}

impl RasterSurface {
    pub fn new(font: LabelFont) -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
            css: (0.0, 0.0),
            font,
        }
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Overlay composited on top of `base` (expected at the backing resolution)
    pub fn composite_over(&self, base: &RgbaImage) -> RgbaImage {
        let mut out = base.clone();
        imageops::overlay(&mut out, &self.pixels, 0, 0);
        out
    }

    /// Blend a solid span given in surface pixels; edges are rounded to the pixel grid
    fn fill_span(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba8) {
        // Edges are clamped to one pixel outside the backing store before
        // conversion, so huge or infinite extents cannot overflow
        let (max_x, max_y) = (self.pixels.width() as f32 + 1.0, self.pixels.height() as f32 + 1.0);
        let left = x0.min(x1).round().clamp(-1.0, max_x) as i32;
        let right = x0.max(x1).round().clamp(-1.0, max_x) as i32;
        let top = y0.min(y1).round().clamp(-1.0, max_y) as i32;
        let bottom = y0.max(y1).round().clamp(-1.0, max_y) as i32;

        if right <= left || bottom <= top || self.pixels.width() == 0 || self.pixels.height() == 0 {
            return;
        }

        let rect = Rect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32);
        let mut canvas = Blend(std::mem::take(&mut self.pixels));
        draw_filled_rect_mut(&mut canvas, rect, Rgba(color));
        self.pixels = canvas.0;
    }
}

impl Surface for RasterSurface {
    fn resize_backing(&mut self, width: u32, height: u32) {
        if self.pixels.dimensions() != (width, height) {
            self.pixels = RgbaImage::new(width, height);
        } else {
            self.clear();
        }
    }

    fn backing_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn set_css_size(&mut self, width: f32, height: f32) {
        self.css = (width, height);
    }

    fn css_size(&self) -> (f32, f32) {
        self.css
    }

    fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba8, line_width: f32) {
        if !line_width.is_finite() || line_width <= 0.0 {
            return;
        }
        let r = rect.normalized();
        let half = line_width / 2.0;
        let (left, top, right, bottom) = (r.x, r.y, r.right(), r.bottom());

        // Horizontal bands span the full outer width; side bands fill the gap
        // between them so no pixel is blended twice.
        let top_band = ((top - half).round(), (top + half).round());
        let bottom_band = ((bottom - half).round(), (bottom + half).round());
        self.fill_span(left - half, top_band.0, right + half, top_band.1, color);

        let bottom_start = bottom_band.0.max(top_band.1);
        self.fill_span(left - half, bottom_start, right + half, bottom_band.1, color);

        if bottom_start > top_band.1 {
            self.fill_span(left - half, top_band.1, left + half, bottom_start, color);
            let right_start = (right - half).max(left + half);
            self.fill_span(right_start, top_band.1, right + half, bottom_start, color);
        }
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba8) {
        let r = rect.normalized();
        self.fill_span(r.x, r.y, r.right(), r.bottom(), color);
    }

    fn measure_text(&self, text: &str, font_size: f32) -> TextMetrics {
        self.font.measure(text, font_size)
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Rgba8) {
        self.font.draw(
            &mut self.pixels,
            x.round() as i32,
            y.round() as i32,
            font_size,
            Rgba(color),
            text,
        );
    }
}
