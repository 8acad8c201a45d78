// Default values for configuration
// These serve as fallback values and can be used for "reset to defaults" functionality
pub const DEFAULT_LINE_WIDTH: f32 = 2.0;
pub const DEFAULT_FONT_SIZE: f32 = 16.0;
pub const DEFAULT_LABEL_PADDING: f32 = 4.0;
pub const DEFAULT_BOX_COLOR: [u8; 4] = [0, 255, 0, 255];           // Solid green
pub const DEFAULT_LABEL_BACKGROUND: [u8; 4] = [0, 0, 0, 160];      // Semi-opaque black chip
pub const DEFAULT_LABEL_TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];
pub const DEFAULT_CLAMP_LABELS: bool = false;
pub const DEFAULT_DISPLAY_WIDTH: f32 = 800.0;
pub const DEFAULT_DISPLAY_HEIGHT: f32 = 600.0;
pub const DEFAULT_DEVICE_PIXEL_RATIO: f32 = 1.0;

pub const APP_NAME: &str = "detskater";

// Font families searched when no explicit font path is configured
pub const FALLBACK_FONT_FAMILIES: &[&str] = &["DejaVuSans", "Arial", "Helvetica", "LiberationSans-Regular"];
