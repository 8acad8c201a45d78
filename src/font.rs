/// Label fonts
///
/// Outline fonts are loaded from a TTF/OTF file through `ab_glyph`. When none
/// can be found the built-in 3x5 bitmap font is used, which also keeps
/// rendering deterministic in tests.
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use image::{Pixel, Rgba, RgbaImage};
use log::{debug, info, warn};

use crate::surface::TextMetrics;

// Bitmap glyph cell: 3x5 pixels, 1 column of spacing, 1 row margin above and below
const GLYPH_WIDTH: u32 = 3;
const GLYPH_ADVANCE: u32 = 4;
const GLYPH_ROWS: u32 = 5;
const LINE_ROWS: u32 = 7;

// Largest size honoured when measuring or drawing; larger requests are clamped
const MAX_FONT_SIZE: f32 = 1024.0;

#[derive(Clone)]
pub enum LabelFont {
    Bitmap,
    Outline(Arc<FontVec>),
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelFont::Bitmap => write!(f, "LabelFont::Bitmap"),
            LabelFont::Outline(_) => write!(f, "LabelFont::Outline"),
        }
    }
}

impl LabelFont {
    /// Load an outline font from a file
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let data = fs::read(path)
            .map_err(|e| format!("Failed to read font {}: {}", path.display(), e))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|e| format!("Failed to parse font {}: {}", path.display(), e))?;
        Ok(LabelFont::Outline(Arc::new(font)))
    }

    /// Look for a font family in the usual system locations
    pub fn try_load_family(family: &str) -> Option<Self> {
        let paths = [
            format!("/usr/share/fonts/truetype/dejavu/{}.ttf", family),
            format!("/usr/share/fonts/truetype/liberation/{}.ttf", family),
            format!("/usr/share/fonts/truetype/{}.ttf", family),
            format!("/usr/share/fonts/TTF/{}.ttf", family),
            format!("/Library/Fonts/{}.ttf", family),
            format!("/System/Library/Fonts/{}.ttf", family),
            format!("/System/Library/Fonts/Supplemental/{}.ttf", family),
            format!("C:\\Windows\\Fonts\\{}.ttf", family),
            format!("{}.ttf", family),
        ];

        for path in paths.iter().map(Path::new) {
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(font) => {
                    info!("Loaded label font from {}", path.display());
                    return Some(font);
                }
                Err(e) => debug!("{}", e),
            }
        }
        None
    }

    /// Explicit path first, then the known families, then the bitmap font
    pub fn resolve(font_path: Option<&str>, families: &[&str]) -> Self {
        if let Some(path) = font_path {
            match Self::from_file(Path::new(path)) {
                Ok(font) => {
                    info!("Using label font {}", path);
                    return font;
                }
                Err(e) => warn!("{}", e),
            }
        }

        for family in families {
            if let Some(font) = Self::try_load_family(family) {
                return font;
            }
        }

        info!("No outline font found, falling back to bitmap labels");
        LabelFont::Bitmap
    }

    fn clamp_size(font_size: f32) -> f32 {
        if font_size.is_nan() {
            1.0
        } else {
            font_size.clamp(1.0, MAX_FONT_SIZE)
        }
    }

    /// Integer pixel scale of the bitmap font for a requested size
    fn bitmap_scale(font_size: f32) -> u32 {
        ((Self::clamp_size(font_size) / LINE_ROWS as f32).floor() as u32).max(1)
    }

    pub fn measure(&self, text: &str, font_size: f32) -> TextMetrics {
        match self {
            LabelFont::Bitmap => {
                let scale = Self::bitmap_scale(font_size) as f32;
                let chars = text.chars().count() as f32;
                let width = if chars == 0.0 {
                    0.0
                } else {
                    chars * GLYPH_ADVANCE as f32 * scale - scale
                };
                TextMetrics {
                    width,
                    height: LINE_ROWS as f32 * scale,
                }
            }
            LabelFont::Outline(font) => {
                let scale = PxScale::from(Self::clamp_size(font_size));
                let (width, height) = imageproc::drawing::text_size(scale, &**font, text);
                TextMetrics {
                    width: width as f32,
                    height: height as f32,
                }
            }
        }
    }

    /// Draw text with its top-left corner at (`x`, `y`), blending over existing pixels
    pub fn draw(&self, image: &mut RgbaImage, x: i32, y: i32, font_size: f32, color: Rgba<u8>, text: &str) {
        match self {
            LabelFont::Bitmap => {
                let scale = i64::from(Self::bitmap_scale(font_size));
                let mut cursor = i64::from(x);
                for c in text.chars() {
                    if cursor >= i64::from(image.width()) {
                        break;
                    }
                    draw_glyph(image, cursor, i64::from(y) + scale, glyph(c), scale, color);
                    cursor += i64::from(GLYPH_ADVANCE) * scale;
                }
            }
            LabelFont::Outline(font) => {
                let scale = PxScale::from(Self::clamp_size(font_size));
                imageproc::drawing::draw_text_mut(image, color, x, y, scale, &**font, text);
            }
        }
    }
}

fn draw_glyph(image: &mut RgbaImage, x: i64, y: i64, rows: [u8; 5], scale: i64, color: Rgba<u8>) {
    let (width, height) = (i64::from(image.width()), i64::from(image.height()));

    for (row, bits) in rows.iter().enumerate() {
        for col in 0..i64::from(GLYPH_WIDTH) {
            if (bits >> (i64::from(GLYPH_WIDTH) - 1 - col)) & 1 == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + col * scale + dx;
                    let py = y + row as i64 * scale + dy;
                    if px >= 0 && py >= 0 && px < width && py < height {
                        image.get_pixel_mut(px as u32, py as u32).blend(&color);
                    }
                }
            }
        }
    }
}

// 3 bits per row, most significant bit is the leftmost column
fn glyph(c: char) -> [u8; GLYPH_ROWS as usize] {
    match c.to_ascii_uppercase() {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        'A' => [0x2, 0x5, 0x7, 0x5, 0x5],
        'B' => [0x6, 0x5, 0x6, 0x5, 0x6],
        'C' => [0x3, 0x4, 0x4, 0x4, 0x3],
        'D' => [0x6, 0x5, 0x5, 0x5, 0x6],
        'E' => [0x7, 0x4, 0x6, 0x4, 0x7],
        'F' => [0x7, 0x4, 0x6, 0x4, 0x4],
        'G' => [0x3, 0x4, 0x5, 0x5, 0x3],
        'H' => [0x5, 0x5, 0x7, 0x5, 0x5],
        'I' => [0x7, 0x2, 0x2, 0x2, 0x7],
        'J' => [0x1, 0x1, 0x1, 0x5, 0x2],
        'K' => [0x5, 0x5, 0x6, 0x5, 0x5],
        'L' => [0x4, 0x4, 0x4, 0x4, 0x7],
        'M' => [0x5, 0x7, 0x7, 0x5, 0x5],
        'N' => [0x6, 0x5, 0x5, 0x5, 0x5],
        'O' => [0x2, 0x5, 0x5, 0x5, 0x2],
        'P' => [0x6, 0x5, 0x6, 0x4, 0x4],
        'Q' => [0x2, 0x5, 0x5, 0x6, 0x3],
        'R' => [0x6, 0x5, 0x6, 0x5, 0x5],
        'S' => [0x3, 0x4, 0x2, 0x1, 0x6],
        'T' => [0x7, 0x2, 0x2, 0x2, 0x2],
        'U' => [0x5, 0x5, 0x5, 0x5, 0x7],
        'V' => [0x5, 0x5, 0x5, 0x5, 0x2],
        'W' => [0x5, 0x5, 0x7, 0x7, 0x5],
        'X' => [0x5, 0x5, 0x2, 0x5, 0x5],
        'Y' => [0x5, 0x5, 0x2, 0x2, 0x2],
        'Z' => [0x7, 0x1, 0x2, 0x4, 0x7],
        ' ' => [0x0, 0x0, 0x0, 0x0, 0x0],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        ',' => [0x0, 0x0, 0x0, 0x2, 0x4],
        '%' => [0x5, 0x1, 0x2, 0x4, 0x5],
        '(' => [0x1, 0x2, 0x2, 0x2, 0x1],
        ')' => [0x4, 0x2, 0x2, 0x2, 0x4],
        '[' => [0x6, 0x4, 0x4, 0x4, 0x6],
        ']' => [0x3, 0x1, 0x1, 0x1, 0x3],
        '-' => [0x0, 0x0, 0x7, 0x0, 0x0],
        '_' => [0x0, 0x0, 0x0, 0x0, 0x7],
        '+' => [0x0, 0x2, 0x7, 0x2, 0x0],
        '=' => [0x0, 0x7, 0x0, 0x7, 0x0],
        ':' => [0x0, 0x2, 0x0, 0x2, 0x0],
        '/' => [0x1, 0x1, 0x2, 0x4, 0x4],
        '\'' => [0x2, 0x2, 0x0, 0x0, 0x0],
        '!' => [0x2, 0x2, 0x2, 0x0, 0x2],
        '?' => [0x7, 0x1, 0x2, 0x0, 0x2],
        '#' => [0x5, 0x7, 0x5, 0x7, 0x5],
        '&' => [0x2, 0x5, 0x2, 0x5, 0x3],
        _ => [0x7, 0x7, 0x7, 0x7, 0x7], // block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_measure() {
        let font = LabelFont::Bitmap;
        // 16px -> scale 2: 12 chars * 8px - 2px trailing gap
        let metrics = font.measure("cat (97.00%)", 16.0);
        assert_eq!(metrics, TextMetrics { width: 94.0, height: 14.0 });

        assert_eq!(font.measure("", 16.0).width, 0.0);
        assert_eq!(font.measure("a", 3.0), TextMetrics { width: 3.0, height: 7.0 });
    }

    #[test]
    fn test_bitmap_measure_grows_with_size() {
        let font = LabelFont::Bitmap;
        let small = font.measure("dog", 16.0);
        let large = font.measure("dog", 32.0);
        assert!(large.width > small.width);
        assert!(large.height > small.height);
    }

    #[test]
    fn test_bitmap_draw_clips_at_edges() {
        let font = LabelFont::Bitmap;
        let mut image = RgbaImage::new(8, 8);
        let white = Rgba([255, 255, 255, 255]);

        font.draw(&mut image, -5, -5, 14.0, white, "88");
        font.draw(&mut image, 6, 6, 14.0, white, "8");

        assert!(image.pixels().any(|p| p.0[3] == 255));
    }

    #[test]
    fn test_bitmap_draw_glyph_pixels() {
        let font = LabelFont::Bitmap;
        let mut image = RgbaImage::new(4, 7);
        let red = Rgba([255, 0, 0, 255]);

        // "1" at scale 1: top margin row stays empty, glyph starts at y = 1
        font.draw(&mut image, 0, 0, 7.0, red, "1");
        assert_eq!(image.get_pixel(1, 0).0[3], 0);
        assert_eq!(*image.get_pixel(1, 1), red);
        assert_eq!(*image.get_pixel(0, 5), red);
        assert_eq!(image.get_pixel(0, 1).0[3], 0);
    }

    #[test]
    fn test_resolve_missing_path_falls_back() {
        let font = LabelFont::resolve(Some("/definitely/not/here.ttf"), &[]);
        assert!(matches!(font, LabelFont::Bitmap));
    }

    #[test]
    fn test_huge_font_size_is_clamped() {
        let font = LabelFont::Bitmap;
        let metrics = font.measure("cat (97.00%)", 1.0e9);
        assert!(metrics.width.is_finite() && metrics.width > 0.0);
        assert!(metrics.height.is_finite() && metrics.height > 0.0);
        assert_eq!(metrics, font.measure("cat (97.00%)", MAX_FONT_SIZE));
        assert_eq!(font.measure("a", f32::NAN), font.measure("a", 1.0));

        let mut image = RgbaImage::new(16, 16);
        // Scale 146: the first glyph row of "8" spans y -4..142
        font.draw(&mut image, 0, -150, 1.0e9, Rgba([255, 255, 255, 255]), "8 cat");
        font.draw(&mut image, i32::MAX - 1, i32::MAX - 1, 1.0e9, Rgba([255, 255, 255, 255]), "88");
        assert!(image.pixels().any(|p| p.0[3] == 255));
    }
}
