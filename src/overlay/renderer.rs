/// Overlay renderer
///
/// Paints one stroked rectangle and one label chip per detection onto a
/// transparent surface stacked over the displayed image. The surface's
/// backing store uses the image's natural resolution; its CSS size follows
/// the displayed image so both stay aligned across resizes.
use log::{debug, trace, warn};

use crate::detection::{Detection, ImageFrame};
use crate::surface::Surface;
use super::geometry::{bbox_to_pixel_rect, layout_label_chip, ChipLayout, PixelRect};
use super::style::OverlayStyle;

/// What a render call ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// No surface was mounted; nothing happened, retry on the next event
    SurfaceUnavailable,
    /// Displayed size was zero, negative or not finite; nothing happened
    InvalidViewport,
    /// Surface cleared and left empty (no frame or no detections)
    Cleared,
    /// Surface cleared and repainted with these boxes, in input order
    Painted(Vec<PaintedDetection>),
}

impl RenderOutcome {
    pub fn painted(&self) -> &[PaintedDetection] {
        match self {
            RenderOutcome::Painted(boxes) => boxes,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintedDetection {
    pub rect: PixelRect,
    pub chip: ChipLayout,
    pub text: String,
}

pub struct OverlayRenderer {
    style: OverlayStyle,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    /// Clear the surface and repaint every detection.
    ///
    /// Each call starts from an empty surface, so identical arguments always
    /// produce identical output.
    pub fn render(
        &self,
        surface: Option<&mut dyn Surface>,
        frame: Option<&ImageFrame>,
        detections: &[Detection],
        displayed_width: f32,
        displayed_height: f32,
        device_pixel_ratio: f32,
    ) -> RenderOutcome {
        let Some(surface) = surface else {
            debug!("Overlay surface not mounted, skipping repaint");
            return RenderOutcome::SurfaceUnavailable;
        };

        if !(displayed_width.is_finite() && displayed_height.is_finite())
            || displayed_width <= 0.0
            || displayed_height <= 0.0
        {
            warn!(
                "Ignoring repaint with invalid displayed size {}x{}",
                displayed_width, displayed_height
            );
            return RenderOutcome::InvalidViewport;
        }

        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio >= 1.0 {
            device_pixel_ratio
        } else {
            debug!("Device pixel ratio {} below 1, using 1.0", device_pixel_ratio);
            1.0
        };

        let Some(frame) = frame else {
            surface.clear();
            return RenderOutcome::Cleared;
        };

        surface.resize_backing(frame.width, frame.height);
        surface.set_css_size(displayed_width, displayed_height);
        surface.clear();

        if detections.is_empty() {
            debug!("No detections for {}x{} frame, overlay cleared", frame.width, frame.height);
            return RenderOutcome::Cleared;
        }

        let scaled = self.style.scaled(dpr);
        debug!(
            "Painting {} detection(s): frame {}x{}, displayed {:.0}x{:.0}, dpr {}",
            detections.len(), frame.width, frame.height, displayed_width, displayed_height, dpr
        );

        let mut painted = Vec::with_capacity(detections.len());
        for detection in detections {
            let rect = bbox_to_pixel_rect(&detection.bbox, frame);
            if rect.is_degenerate() {
                trace!("Degenerate box for '{}': {:?}", detection.label, rect);
            }
            surface.stroke_rect(rect, self.style.box_color, scaled.line_width);

            let text = detection.label_text();
            let metrics = surface.measure_text(&text, scaled.font_size);
            let chip = layout_label_chip(
                &rect,
                metrics,
                scaled.padding,
                frame.width,
                self.style.clamp_labels,
            );

            surface.fill_rect(chip.background, self.style.label_background);
            surface.fill_text(
                &text,
                chip.text_x,
                chip.text_y,
                scaled.font_size,
                self.style.label_text_color,
            );

            painted.push(PaintedDetection { rect, chip, text });
        }

        RenderOutcome::Painted(painted)
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}
