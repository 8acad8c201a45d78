/// Drawing surfaces
///
/// `Surface` is the small subset of a 2D drawing context the overlay needs.
/// The raster implementation paints real pixels; the recording one keeps a
/// display list for inspection and export.
pub mod raster;
pub mod recording;

use serde::Serialize;

use crate::overlay::geometry::PixelRect;

/// Straight (non-premultiplied) RGBA colour
pub type Rgba8 = [u8; 4];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
}

pub trait Surface {
    /// Set the backing resolution in surface pixels. Always leaves the surface cleared.
    fn resize_backing(&mut self, width: u32, height: u32);

    fn backing_size(&self) -> (u32, u32);

    /// Set the on-screen (CSS) size the backing store is stretched to
    fn set_css_size(&mut self, width: f32, height: f32);

    fn css_size(&self) -> (f32, f32);

    /// Make every pixel fully transparent
    fn clear(&mut self);

    /// Stroke the outline of `rect`, centred on its edges. Negative extents are
    /// stroked like a 2D canvas does (mirrored around the origin).
    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba8, line_width: f32);

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba8);

    fn measure_text(&self, text: &str, font_size: f32) -> TextMetrics;

    /// Draw `text` with its top-left corner at (`x`, `y`)
    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Rgba8);
}
