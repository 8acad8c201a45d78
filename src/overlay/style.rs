use crate::config::{
    DEFAULT_BOX_COLOR, DEFAULT_CLAMP_LABELS, DEFAULT_FONT_SIZE, DEFAULT_LABEL_BACKGROUND,
    DEFAULT_LABEL_PADDING, DEFAULT_LABEL_TEXT_COLOR, DEFAULT_LINE_WIDTH,
};
use crate::surface::Rgba8;

/// Visual parameters of the overlay, expressed in logical (CSS) pixels
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub base_line_width: f32,
    pub base_font_size: f32,
    pub padding: f32,
    pub box_color: Rgba8,
    pub label_background: Rgba8,
    pub label_text_color: Rgba8,
    /// Keep label chips inside the surface instead of letting them overhang the top edge
    pub clamp_labels: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            base_line_width: DEFAULT_LINE_WIDTH,
            base_font_size: DEFAULT_FONT_SIZE,
            padding: DEFAULT_LABEL_PADDING,
            box_color: DEFAULT_BOX_COLOR,
            label_background: DEFAULT_LABEL_BACKGROUND,
            label_text_color: DEFAULT_LABEL_TEXT_COLOR,
            clamp_labels: DEFAULT_CLAMP_LABELS,
        }
    }
}

/// Style sizes multiplied out for one device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledStyle {
    pub line_width: f32,
    pub font_size: f32,
    pub padding: f32,
}

impl OverlayStyle {
    pub fn scaled(&self, device_pixel_ratio: f32) -> ScaledStyle {
        ScaledStyle {
            line_width: self.base_line_width * device_pixel_ratio,
            font_size: self.base_font_size * device_pixel_ratio,
            padding: self.padding * device_pixel_ratio,
        }
    }
}
