use std::fs;
use std::path::{Path, PathBuf};

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::surface::TextStyle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub intra_threads: i16,
    /// Minimum face-presence score for a face to be reported.
    pub face_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub refresh_rate: f32,
    /// Overrides the bundled serif font.
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub text_color: String,
    pub debug_on_start: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/face_landmarks_detector.onnx"),
            intra_threads: 5,
            face_threshold: 0.5,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 60.0,
            font_path: None,
            font_size: 18.0,
            text_color: "#cb9eff".to_string(),
            debug_on_start: false,
        }
    }
}

impl AppConfig {
    /// Reads the config at `path`. Without a path, or if the file does not exist, the
    /// defaults are used. Missing fields fall back to their defaults too.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::info!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config(format!(
                "camera resolution {}x{} is empty",
                self.camera.width, self.camera.height
            )));
        }
        if !(self.display.refresh_rate > 0.0) {
            return Err(Error::Config("display.refresh_rate must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.model.face_threshold) {
            return Err(Error::Config("model.face_threshold must be within 0..=1".into()));
        }
        parse_hex_color(&self.display.text_color)?;
        Ok(())
    }

    pub fn text_style(&self) -> Result<TextStyle> {
        Ok(TextStyle {
            size: self.display.font_size,
            color: parse_hex_color(&self.display.text_color)?,
        })
    }
}

/// Parses `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(text: &str) -> Result<Rgba<u8>> {
    let invalid = || Error::Config(format!("invalid color {text:?}, expected #rrggbb"));
    let hex = text.strip_prefix('#').ok_or_else(invalid)?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }

    let mut channels = [0xffu8; 4];
    for (i, channel) in channels.iter_mut().enumerate().take(hex.len() / 2) {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(Rgba(channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "camera": { "device": 2 }, "display": { "debug_on_start": true } }"#)
                .unwrap();
        assert_eq!(config.camera.device, 2);
        assert_eq!((config.camera.width, config.camera.height), (1280, 720));
        assert!(config.display.debug_on_start);
        assert_eq!(config.display.text_color, "#cb9eff");
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = AppConfig::load(Some(Path::new("does/not/exist.json"))).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(AppConfig::load(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn colors() {
        assert_eq!(parse_hex_color("#cb9eff").unwrap(), Rgba([0xcb, 0x9e, 0xff, 0xff]));
        assert_eq!(parse_hex_color("#00ff0080").unwrap(), Rgba([0, 255, 0, 0x80]));
        assert!(parse_hex_color("cb9eff").is_err());
        assert!(parse_hex_color("#cb9e").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn validation_rejects_nonsense() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());
        config.display.refresh_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.camera.width = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
