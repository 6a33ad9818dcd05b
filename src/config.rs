//! Runtime configuration
//!
//! Read from a RON file next to the executable. Every field has a default, so
//! a missing file or a partial one still gives a usable setup.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use crate::rasterizer::{Camera, RasterSettings, Vec3, HEIGHT, WIDTH};

/// Largest accepted surface width or height
pub const MAX_SURFACE_SIZE: usize = 4096;
/// Largest accepted window scale
pub const MAX_SCALE: u32 = 16;

/// Error type for config loading
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(ron::error::SpannedError),
    SerializeError(ron::Error),
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(e: ron::error::SpannedError) -> Self {
        ConfigError::ParseError(e)
    }
}

impl From<ron::Error> for ConfigError {
    fn from(e: ron::Error) -> Self {
        ConfigError::SerializeError(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render surface size in pixels
    pub width: usize,
    pub height: usize,
    /// Window size as a multiple of the surface size
    pub scale: u32,
    pub camera: Vec3,
    /// Right shift applied to the average vertex depth
    pub depth_shift: u32,
    /// Treat palette index 0 in textures as transparent
    pub alpha_test: bool,
    /// Raw VGA palette file; the built-in palette is used when unset
    pub palette: Option<PathBuf>,
    /// Directory of PNG textures, loaded in file name order
    pub textures: PathBuf,
    /// Raw 16x16 tile atlas, appended after the PNG textures
    pub atlas: Option<PathBuf>,
    /// Scene file; the built-in demo scene is used when unset
    pub scene: Option<PathBuf>,
    /// Ground tile the view starts at
    pub view_x: i32,
    pub view_z: i32,
    /// Tiles moved per key press
    pub scroll_step: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            scale: 3,
            camera: Vec3::new(0.0, 12800.0, 64.0),
            depth_shift: 4,
            alpha_test: true,
            palette: None,
            textures: PathBuf::from("assets/textures"),
            atlas: None,
            scene: None,
            view_x: 20,
            view_z: 0,
            scroll_step: 1,
        }
    }
}

impl Config {
    /// Load a config file. A missing file gives the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = ron::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 || self.width > MAX_SURFACE_SIZE || self.height > MAX_SURFACE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "surface size {}x{}, each side must be 1 to {}",
                self.width, self.height, MAX_SURFACE_SIZE
            )));
        }
        if self.scale == 0 || self.scale > MAX_SCALE {
            return Err(ConfigError::Invalid(format!("scale {} must be 1 to {}", self.scale, MAX_SCALE)));
        }
        if self.depth_shift > 16 {
            return Err(ConfigError::Invalid(format!("depth shift {} is too large", self.depth_shift)));
        }
        Ok(())
    }

    pub fn raster_settings(&self) -> RasterSettings {
        RasterSettings {
            depth_shift: self.depth_shift,
            alpha_test: self.alpha_test,
        }
    }

    pub fn camera(&self) -> Camera {
        Camera::new(self.camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!((config.width, config.height), (320, 200));
        assert_eq!(config.scale, 3);
        assert_eq!(config.raster_settings(), RasterSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("(scale: 2, depth_shift: 3)").unwrap();
        assert_eq!(config.scale, 2);
        assert_eq!(config.depth_shift, 3);
        assert_eq!(config.width, 320);
        assert_eq!(config.textures, PathBuf::from("assets/textures"));
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(matches!(Config::parse("(width: 0)"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_oversized_surface_and_scale() {
        assert!(matches!(Config::parse("(width: 4097)"), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::parse("(height: 100000000)"), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::parse("(scale: 0)"), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::parse("(scale: 17)"), Err(ConfigError::Invalid(_))));

        let largest = Config::parse("(width: 4096, height: 4096, scale: 16)").unwrap();
        assert_eq!(largest.width as u32 * largest.scale, 65536);
    }

    #[test]
    fn test_round_trip() {
        let mut config = Config::default();
        config.scene = Some(PathBuf::from("tracks/one.ron"));
        config.camera = Vec3::new(1.0, 2.0, 3.0);
        let text = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new()).unwrap();
        assert_eq!(Config::parse(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load("definitely/not/here/config.ron").unwrap();
        assert_eq!(config, Config::default());
    }
}
