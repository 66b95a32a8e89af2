//! Attribute inference service configuration

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub rest_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted upload size in bytes. Checked before decode.
    pub max_upload_bytes: usize,
}

/// Output calibration parameters.
///
/// The affine age mapping and the age-confidence heuristic come from the
/// reference model with no documented calibration basis, so they are
/// configuration rather than constants.
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationConfig {
    /// Multiplier applied to the raw age-model scalar.
    pub age_scale: f32,
    /// Offset added after scaling; result is clamped to [0, 100].
    pub age_offset: f32,
    /// Baseline for the placeholder age-confidence heuristic.
    pub age_confidence_baseline: f32,
    /// Bounded jitter around the baseline. Zero disables jitter entirely.
    pub age_confidence_jitter: f32,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig { rest_port: 3000 },
            limits: LimitsConfig {
                max_upload_bytes: 10 * 1024 * 1024,
            },
            calibration: CalibrationConfig::default(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            age_scale: 100.0,
            age_offset: 25.0,
            age_confidence_baseline: 0.80,
            age_confidence_jitter: 0.10,
        }
    }
}
