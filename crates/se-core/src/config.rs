//! Configuration system for saasemu

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub emulation: EmulationConfig,
    pub input: InputConfig,
    pub paths: PathConfig,
    pub debug: DebugConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub confirm_exit: bool,
    /// Open the emulation screen directly on startup
    pub start_in_emulation: bool,
}

/// Emulation toggles forwarded to the core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulationConfig {
    pub fast_forward: bool,
    pub rewind_enabled: bool,
    /// Frames requested per rewind press
    pub rewind_step_frames: u32,
    /// Bilinear sampling of the core's frame (nearest when false)
    pub linear_filtering: bool,
    pub fullscreen: bool,
    pub frame_limit: u32,
}

/// Virtual gamepad settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub show_overlay: bool,
    /// Custom control layout document; the built-in layout is used when unset
    pub layout_path: Option<PathBuf>,
    /// Multiplier applied to the control fill alpha (0.0 - 1.0)
    pub overlay_opacity: f32,
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Private data root holding the cores, bios and roms directories
    pub data_dir: PathBuf,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
}

/// Log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            confirm_exit: true,
            start_in_emulation: false,
        }
    }
}

impl Default for EmulationConfig {
    fn default() -> Self {
        Self {
            fast_forward: false,
            rewind_enabled: false,
            rewind_step_frames: 60,
            linear_filtering: true,
            fullscreen: false,
            frame_limit: 60,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            show_overlay: true,
            layout_path: None,
            overlay_opacity: 1.0,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("saasemu"),
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saasemu")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.general.confirm_exit);
        assert!(!config.emulation.fast_forward);
        assert_eq!(config.emulation.rewind_step_frames, 60);
        assert!(config.input.show_overlay);
        assert!(config.input.layout_path.is_none());
        assert!(config.paths.data_dir.ends_with("saasemu"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.emulation.frame_limit, config.emulation.frame_limit);
        assert_eq!(parsed.debug.log_level, LogLevel::Info);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[emulation]\nfast_forward = true\n").unwrap();
        assert!(parsed.emulation.fast_forward);
        assert!(parsed.emulation.linear_filtering);
        assert!(parsed.input.show_overlay);
    }
}
