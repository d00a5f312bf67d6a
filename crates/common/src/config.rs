//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exported files are written when sharing is unavailable.
    pub output_dir: PathBuf,

    /// Rasterization settings.
    #[serde(default)]
    pub render: RenderDefaults,

    /// Capture and export timing.
    #[serde(default)]
    pub capture: CaptureDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rasterization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Directories scanned for `.ttf`/`.otf` files, matched by family name.
    pub font_dirs: Vec<PathBuf>,

    /// JPEG quality for photo exports (1-100).
    pub jpeg_quality: u8,

    /// Drop shadow blur radius applied to floating video tags.
    pub shadow_blur_px: u32,
}

/// Capture timing and encoder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Frame rate of the capture stream fed to the encoder.
    pub capture_fps: u32,

    /// Render loop rate (display refresh).
    pub render_fps: u32,

    /// Progress monitor sampling interval.
    pub monitor_interval_ms: u64,

    /// Extra time past the trim window before the safety stop fires.
    pub safety_margin_secs: f64,

    /// Target video bitrate.
    pub video_bitrate_bps: u64,

    /// Target audio bitrate.
    pub audio_bitrate_bps: u64,

    /// Delay before signalling a finished batch item to the queue driver.
    pub batch_grace_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vivitag=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: dirs_default_exports(),
            render: RenderDefaults::default(),
            capture: CaptureDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            font_dirs: default_font_dirs(),
            jpeg_quality: 95,
            shadow_blur_px: 4,
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            capture_fps: 30,
            render_fps: 60,
            monitor_interval_ms: 50,
            safety_margin_secs: 2.0,
            video_bitrate_bps: 25_000_000,
            audio_bitrate_bps: 192_000,
            batch_grace_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

impl CaptureDefaults {
    /// Monitor interval as a `Duration`.
    pub fn monitor_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.monitor_interval_ms.max(1))
    }

    /// Render loop period as a `Duration`.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_nanos(1_000_000_000 / self.render_fps.max(1) as u64)
    }

    /// Grace delay before notifying the batch driver.
    pub fn batch_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.batch_grace_ms)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("vivitag").join("config.json")
}

/// Default export directory.
fn dirs_default_exports() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"));
    base.join("vivitag").join("exports")
}

fn default_font_dirs() -> Vec<PathBuf> {
    vec![
        home_dir().join(".local").join("share").join("fonts"),
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
    ]
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_defaults_match_export_profile() {
        let defaults = CaptureDefaults::default();
        assert_eq!(defaults.capture_fps, 30);
        assert_eq!(defaults.monitor_interval_ms, 50);
        assert_eq!(defaults.video_bitrate_bps, 25_000_000);
        assert_eq!(defaults.audio_bitrate_bps, 192_000);
        assert!((defaults.safety_margin_secs - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "output_dir": "/tmp/out", "capture": { "capture_fps": 24 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.capture.capture_fps, 24);
        assert_eq!(config.capture.monitor_interval_ms, 50);
        assert_eq!(config.render.jpeg_quality, 95);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_frame_interval_never_divides_by_zero() {
        let defaults = CaptureDefaults {
            render_fps: 0,
            ..CaptureDefaults::default()
        };
        assert_eq!(defaults.frame_interval(), std::time::Duration::from_secs(1));
    }
}
