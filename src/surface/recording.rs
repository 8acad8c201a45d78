use serde::Serialize;

use crate::font::LabelFont;
use crate::overlay::geometry::PixelRect;
use super::{Rgba8, Surface, TextMetrics};

/// One primitive painted on a `RecordingSurface`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    StrokeRect {
        rect: PixelRect,
        color: Rgba8,
        line_width: f32,
    },
    FillRect {
        rect: PixelRect,
        color: Rgba8,
    },
    FillText {
        text: String,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgba8,
    },
}

/// Surface that records what is currently painted instead of rasterizing it
pub struct RecordingSurface {
    backing: (u32, u32),
    css: (f32, f32),
    commands: Vec<DrawCommand>,
    font: LabelFont,
}

/// Serialized form written by `--commands`
#[derive(Debug, Serialize)]
pub struct DisplayList<'a> {
    pub backing_width: u32,
    pub backing_height: u32,
    pub css_width: f32,
    pub css_height: f32,
    pub commands: &'a [DrawCommand],
}

impl RecordingSurface {
    pub fn new(font: LabelFont) -> Self {
        Self {
            backing: (0, 0),
            css: (0.0, 0.0),
            commands: Vec::new(),
            font,
        }
    }

    /// Commands painted since the last clear
    #[cfg(test)]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn display_list(&self) -> DisplayList<'_> {
        DisplayList {
            backing_width: self.backing.0,
            backing_height: self.backing.1,
            css_width: self.css.0,
            css_height: self.css.1,
            commands: &self.commands,
        }
    }
}

impl Surface for RecordingSurface {
    fn resize_backing(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
        self.commands.clear();
    }

    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn set_css_size(&mut self, width: f32, height: f32) {
        self.css = (width, height);
    }

    fn css_size(&self) -> (f32, f32) {
        self.css
    }

    fn clear(&mut self) {
        self.commands.clear();
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgba8, line_width: f32) {
        self.commands.push(DrawCommand::StrokeRect { rect, color, line_width });
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgba8) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn measure_text(&self, text: &str, font_size: f32) -> TextMetrics {
        self.font.measure(text, font_size)
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, font_size: f32, color: Rgba8) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
            font_size,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_drops_painted_commands() {
        let mut surface = RecordingSurface::new(LabelFont::Bitmap);
        surface.resize_backing(10, 10);
        surface.fill_rect(PixelRect::new(0.0, 0.0, 5.0, 5.0), [1, 2, 3, 4]);
        assert_eq!(surface.commands().len(), 1);

        surface.clear();
        assert!(surface.commands().is_empty());
        assert_eq!(surface.backing_size(), (10, 10));
    }

    #[test]
    fn test_display_list_serializes_tagged_ops() {
        let mut surface = RecordingSurface::new(LabelFont::Bitmap);
        surface.resize_backing(4, 3);
        surface.set_css_size(8.0, 6.0);
        surface.fill_text("hi", 1.0, 2.0, 7.0, [255, 255, 255, 255]);

        let json = serde_json::to_value(surface.display_list()).unwrap();
        assert_eq!(json["backing_width"], 4);
        assert_eq!(json["css_height"], 6.0);
        assert_eq!(json["commands"][0]["op"], "fill_text");
        assert_eq!(json["commands"][0]["text"], "hi");
    }
}
