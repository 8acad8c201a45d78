//! Command line arguments backing the `detskater` binary.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "detskater",
    about = "Render object detection results as a DPI-aware overlay on an image"
)]
pub struct Args {
    /// Image that was sent to the detector
    #[arg(long, short = 'i', required_unless_present = "version")]
    pub image: Option<PathBuf>,

    /// Saved detector response (JSON with a `results` array)
    #[arg(long, short = 'r', required_unless_present = "version")]
    pub response: Option<PathBuf>,

    /// Displayed image size in CSS pixels, e.g. 800x600
    #[arg(long, value_parser = parse_size)]
    pub display: Option<(f32, f32)>,

    /// Device pixel ratio
    #[arg(long)]
    pub dpr: Option<f32>,

    /// Resize events replayed after the first paint: WxH or WxH@DPR
    #[arg(long, value_parser = parse_resize)]
    pub resize: Vec<ResizeStep>,

    /// Overlay composited over the image at natural resolution
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Image and overlay scaled to the displayed size times the pixel ratio
    #[arg(long)]
    pub display_out: Option<PathBuf>,

    /// Draw commands of the final paint as JSON
    #[arg(long)]
    pub commands: Option<PathBuf>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    pub settings: Option<String>,

    #[arg(long)]
    pub line_width: Option<f32>,

    #[arg(long)]
    pub font_size: Option<f32>,

    #[arg(long)]
    pub padding: Option<f32>,

    /// Keep label chips inside the overlay
    #[arg(long)]
    pub clamp_labels: bool,

    /// TrueType font for labels
    #[arg(long)]
    pub font: Option<String>,

    /// Persist the style overrides given on this command line
    #[arg(long)]
    pub save_settings: bool,

    /// Write the buffered log to the log directory before exiting
    #[arg(long)]
    pub export_logs: bool,

    /// Debug logging on the console
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Print version and build information
    #[arg(long, short = 'V')]
    pub version: bool,
}

/// One replayed host change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeStep {
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: Option<f32>,
}

fn parse_positive(value: &str, what: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {what} '{value}'"))?;
    if parsed.is_finite() && parsed > 0.0 {
        Ok(parsed)
    } else {
        Err(format!("{what} must be a positive number, got '{value}'"))
    }
}

pub fn parse_size(value: &str) -> Result<(f32, f32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{value}'"))?;
    Ok((parse_positive(width, "width")?, parse_positive(height, "height")?))
}

pub fn parse_resize(value: &str) -> Result<ResizeStep, String> {
    let (size, ratio) = match value.split_once('@') {
        Some((size, ratio)) => (size, Some(parse_positive(ratio, "device pixel ratio")?)),
        None => (value, None),
    };
    let (width, height) = parse_size(size)?;
    Ok(ResizeStep {
        width,
        height,
        device_pixel_ratio: ratio,
    })
}
