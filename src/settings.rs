use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config;
use crate::overlay::OverlayStyle;
use crate::surface::Rgba8;

/// User-specific overlay settings that persist across runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Box stroke width in CSS pixels
    #[serde(default = "default_line_width")]
    pub line_width: f32,

    /// Label font size in CSS pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Padding between label text and chip edge
    #[serde(default = "default_label_padding")]
    pub label_padding: f32,

    /// Colors as "#RRGGBB" or "#RRGGBBAA"
    #[serde(default = "default_box_color")]
    pub box_color: String,

    #[serde(default = "default_label_background")]
    pub label_background: String,

    #[serde(default = "default_label_text_color")]
    pub label_text_color: String,

    /// Keep label chips inside the overlay
    #[serde(default)]
    pub clamp_labels: bool,

    /// TrueType font for labels; empty means search system fonts
    #[serde(default)]
    pub font_path: String,

    #[serde(default = "default_display_width")]
    pub display_width: f32,

    #[serde(default = "default_display_height")]
    pub display_height: f32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
}

fn default_line_width() -> f32 {
    config::DEFAULT_LINE_WIDTH
}

fn default_font_size() -> f32 {
    config::DEFAULT_FONT_SIZE
}

fn default_label_padding() -> f32 {
    config::DEFAULT_LABEL_PADDING
}

fn default_box_color() -> String {
    format_color(config::DEFAULT_BOX_COLOR)
}

fn default_label_background() -> String {
    format_color(config::DEFAULT_LABEL_BACKGROUND)
}

fn default_label_text_color() -> String {
    format_color(config::DEFAULT_LABEL_TEXT_COLOR)
}

fn default_display_width() -> f32 {
    config::DEFAULT_DISPLAY_WIDTH
}

fn default_display_height() -> f32 {
    config::DEFAULT_DISPLAY_HEIGHT
}

fn default_device_pixel_ratio() -> f32 {
    config::DEFAULT_DEVICE_PIXEL_RATIO
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            line_width: default_line_width(),
            font_size: default_font_size(),
            label_padding: default_label_padding(),
            box_color: default_box_color(),
            label_background: default_label_background(),
            label_text_color: default_label_text_color(),
            clamp_labels: config::DEFAULT_CLAMP_LABELS,
            font_path: String::new(),
            display_width: default_display_width(),
            display_height: default_display_height(),
            device_pixel_ratio: default_device_pixel_ratio(),
        }
    }
}

/// Single-quoted YAML scalar; backslashes stay literal, quotes are doubled
fn quote_yaml(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Parse "#RRGGBB" / "#RRGGBBAA" (leading '#' optional)
pub fn parse_color(value: &str) -> Option<Rgba8> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Some([channel(0)?, channel(2)?, channel(4)?, alpha])
}

pub fn format_color(color: Rgba8) -> String {
    format!("#{:02x}{:02x}{:02x}{:02x}", color[0], color[1], color[2], color[3])
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/DetSkater/settings.yaml
    /// On Linux: ~/.config/DetSkater/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\DetSkater\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        let app_config_dir = config_dir.join("DetSkater");
        app_config_dir.join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&str>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p);
                PathBuf::from(p)
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_yaml::from_str::<UserSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: line_width={}, font_size={}, padding={}, clamp_labels={}",
                            settings.line_width, settings.font_size, settings.label_padding, settings.clamp_labels);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save settings to the default location while preserving comments
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        // Existing file: update values in place so user comments survive
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    let updated = self.update_yaml_values(&contents);
                    fs::write(path, updated)
                        .map_err(|e| format!("Failed to write settings file: {}", e))?;
                    info!("Saved settings to {:?} (comments preserved)", path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read existing settings file for comment preservation: {}", e);
                }
            }
        }

        let yaml = self.to_yaml_with_comments();
        fs::write(path, yaml)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }

    fn update_yaml_values(&self, yaml_content: &str) -> String {
        let mut result = yaml_content.to_string();

        result = Self::replace_yaml_value(&result, "line_width", &self.line_width.to_string());
        result = Self::replace_yaml_value(&result, "font_size", &self.font_size.to_string());
        result = Self::replace_yaml_value(&result, "label_padding", &self.label_padding.to_string());
        result = Self::replace_yaml_value(&result, "box_color", &quote_yaml(&self.box_color));
        result = Self::replace_yaml_value(&result, "label_background", &quote_yaml(&self.label_background));
        result = Self::replace_yaml_value(&result, "label_text_color", &quote_yaml(&self.label_text_color));
        result = Self::replace_yaml_value(&result, "clamp_labels", &self.clamp_labels.to_string());
        result = Self::replace_yaml_value(&result, "font_path", &quote_yaml(&self.font_path));
        result = Self::replace_yaml_value(&result, "display_width", &self.display_width.to_string());
        result = Self::replace_yaml_value(&result, "display_height", &self.display_height.to_string());
        result = Self::replace_yaml_value(&result, "device_pixel_ratio", &self.device_pixel_ratio.to_string());

        result
    }

    /// Replace a YAML key's value while preserving the rest of the line
    fn replace_yaml_value(yaml: &str, key: &str, new_value: &str) -> String {
        let pattern = format!(r"(?m)^(\s*{}\s*:\s*).*$", regex::escape(key));
        let replacement = format!("${{1}}{}", new_value.replace('$', "$$"));

        match regex::Regex::new(&pattern) {
            Ok(re) => re.replace_all(yaml, replacement.as_str()).to_string(),
            Err(e) => {
                warn!("Failed to create regex for key '{}': {}", key, e);
                yaml.to_string()
            }
        }
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        format!(
            r##"# DetSkater User Settings
# This file is loaded automatically on every run.
# Command line flags override the values below for a single run.

# Box stroke width in CSS pixels (multiplied by the device pixel ratio)
line_width: {}

# Label font size in CSS pixels (multiplied by the device pixel ratio)
font_size: {}

# Space between label text and the edge of its chip
label_padding: {}

# Colors as "#RRGGBB" or "#RRGGBBAA"
box_color: {}
label_background: {}
label_text_color: {}

# Keep label chips inside the overlay instead of letting them overhang the top edge
clamp_labels: {}

# TrueType font for labels; leave empty to search common system font directories
font_path: {}

# Displayed image size and device pixel ratio used when not given on the command line
display_width: {}
display_height: {}
device_pixel_ratio: {}
"##,
            self.line_width,
            self.font_size,
            self.label_padding,
            quote_yaml(&self.box_color),
            quote_yaml(&self.label_background),
            quote_yaml(&self.label_text_color),
            self.clamp_labels,
            quote_yaml(&self.font_path),
            self.display_width,
            self.display_height,
            self.device_pixel_ratio,
        )
    }

    /// Font path if one is configured
    pub fn font_path(&self) -> Option<&str> {
        let path = self.font_path.trim();
        if path.is_empty() { None } else { Some(path) }
    }

    /// Convert to the renderer's style, falling back to defaults for bad values
    pub fn overlay_style(&self) -> OverlayStyle {
        let defaults = OverlayStyle::default();
        let positive_or = |value: f32, name: &str, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                warn!("Invalid {} '{}', defaulting to {}", name, value, fallback);
                fallback
            }
        };
        let color_or = |value: &str, name: &str, fallback: Rgba8| {
            parse_color(value).unwrap_or_else(|| {
                warn!("Unknown {} '{}', defaulting to {}", name, value, format_color(fallback));
                fallback
            })
        };

        OverlayStyle {
            base_line_width: positive_or(self.line_width, "line_width", defaults.base_line_width),
            base_font_size: positive_or(self.font_size, "font_size", defaults.base_font_size),
            padding: if self.label_padding.is_finite() && self.label_padding >= 0.0 {
                self.label_padding
            } else {
                warn!("Invalid label_padding '{}', defaulting to {}", self.label_padding, defaults.padding);
                defaults.padding
            },
            box_color: color_or(&self.box_color, "box_color", defaults.box_color),
            label_background: color_or(&self.label_background, "label_background", defaults.label_background),
            label_text_color: color_or(&self.label_text_color, "label_text_color", defaults.label_text_color),
            clamp_labels: self.clamp_labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("detskater-settings-{}-{}", std::process::id(), name))
            .join("settings.yaml")
    }

    #[test]
    fn test_defaults_match_config() {
        let style = UserSettings::default().overlay_style();
        assert_eq!(style, OverlayStyle::default());
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#00ff00"), Some([0, 255, 0, 255]));
        assert_eq!(parse_color("000000a0"), Some([0, 0, 0, 160]));
        assert_eq!(parse_color("#fff"), None);
        assert_eq!(parse_color("#gg0000"), None);
        assert_eq!(format_color([0, 0, 0, 160]), "#000000a0");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let settings: UserSettings = serde_yaml::from_str("line_width: 3\nclamp_labels: true\n").unwrap();
        assert_eq!(settings.line_width, 3.0);
        assert!(settings.clamp_labels);
        assert_eq!(settings.font_size, config::DEFAULT_FONT_SIZE);
        assert_eq!(settings.box_color, "#00ff00ff");
    }

    #[test]
    fn test_bad_values_fall_back() {
        let settings = UserSettings {
            line_width: -1.0,
            box_color: "red".to_string(),
            ..UserSettings::default()
        };
        let style = settings.overlay_style();
        assert_eq!(style.base_line_width, config::DEFAULT_LINE_WIDTH);
        assert_eq!(style.box_color, config::DEFAULT_BOX_COLOR);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = temp_settings_path("missing");
        let settings = UserSettings::load(path.to_str());
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn test_save_round_trip_preserves_comments() {
        let path = temp_settings_path("roundtrip");
        let _ = fs::remove_file(&path);

        let mut settings = UserSettings::default();
        settings.save_to(&path).unwrap();

        // User edits a comment, then we save new values over it
        let edited = fs::read_to_string(&path).unwrap().replace("# Box stroke width", "# my note\n# Box stroke width");
        fs::write(&path, edited).unwrap();

        settings.line_width = 5.0;
        settings.box_color = "#ff0000".to_string();
        settings.save_to(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# my note"));
        assert!(contents.contains("line_width: 5"));

        let loaded = UserSettings::load(path.to_str());
        assert_eq!(loaded.line_width, 5.0);
        assert_eq!(loaded.overlay_style().box_color, [255, 0, 0, 255]);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_windows_font_path_round_trips() {
        let path = temp_settings_path("fontpath");
        let _ = fs::remove_file(&path);

        let mut settings = UserSettings {
            font_path: r"C:\Windows\Fonts\arial.ttf".to_string(),
            ..UserSettings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(UserSettings::load(path.to_str()), settings);

        // Second save goes through the in-place update path
        settings.font_path = r"D:\Users\O'Neil\fonts\x.ttf".to_string();
        settings.save_to(&path).unwrap();
        let loaded = UserSettings::load(path.to_str());
        assert_eq!(loaded.font_path(), Some(r"D:\Users\O'Neil\fonts\x.ttf"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
