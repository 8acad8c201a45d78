/// Detection overlay rendering
///
/// Turns normalized detections into pixel rectangles and label chips and
/// paints them onto a `Surface`.
pub mod geometry;
pub mod renderer;
pub mod style;

pub use renderer::{OverlayRenderer, RenderOutcome};
pub use style::OverlayStyle;
