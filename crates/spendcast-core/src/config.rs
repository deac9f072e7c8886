//! Forecast configuration
//!
//! Thresholds for the forecast engine and planner. Loaded from TOML:
//! 1. An explicit path (`--config`), if given and present
//! 2. `~/.local/share/spendcast/config/forecast.toml` (platform data dir), if present
//! 3. Built-in defaults
//!
//! Every key is optional; missing keys keep their default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::forecast::MIN_OBSERVATIONS;

/// Example configuration, identical to the built-in defaults
pub const DEFAULT_CONFIG: &str = r#"
[engine]
min_observations = 5
max_p = 3
max_d = 2
max_q = 3
max_iterations = 10000
confidence_z = 1.96

[planner]
stale_after_days = 60
max_zero_ratio = 0.7
outlier_sigma = 3.0
max_outlier_fraction = 0.3
long_horizon_history = 12
short_horizon_history = 6
year_history = 6
cap_max_multiplier = 3.0
cap_mean_multiplier = 24.0
floor_mean_multiplier = 0.1
"#;

/// Forecast engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fewest observations the engine will fit
    pub min_observations: usize,
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    /// Nelder-Mead iteration budget per candidate order
    pub max_iterations: usize,
    /// Normal quantile for prediction intervals (1.96 = 95%)
    pub confidence_z: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_observations: MIN_OBSERVATIONS,
            max_p: 3,
            max_d: 2,
            max_q: 3,
            max_iterations: 10_000,
            confidence_z: 1.96,
        }
    }
}

/// Request-level forecast policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Reject forecasts when the newest month is older than this
    pub stale_after_days: i64,
    /// Reject history when more than this share of months is zero
    pub max_zero_ratio: f64,
    /// Observations further than this many standard deviations from the mean are outliers
    pub outlier_sigma: f64,
    /// Keep outliers if removing them would drop more than this share of the series
    pub max_outlier_fraction: f64,
    /// History needed for horizons above six months
    pub long_horizon_history: usize,
    /// History needed for horizons of three months or less
    pub short_horizon_history: usize,
    /// History needed for a yearly forecast
    pub year_history: usize,
    pub cap_max_multiplier: f64,
    pub cap_mean_multiplier: f64,
    pub floor_mean_multiplier: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            stale_after_days: 60,
            max_zero_ratio: 0.7,
            outlier_sigma: 3.0,
            max_outlier_fraction: 0.3,
            long_horizon_history: 12,
            short_horizon_history: 6,
            year_history: 6,
            cap_max_multiplier: 3.0,
            cap_mean_multiplier: 24.0,
            floor_mean_multiplier: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub engine: EngineConfig,
    pub planner: PlannerConfig,
}

/// Default config path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("spendcast").join("config").join("forecast.toml"))
}

impl ForecastConfig {
    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: ForecastConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid forecast config TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, else from the default location, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        match candidate {
            Some(p) if p.exists() => {
                debug!(path = %p.display(), "Loading forecast config");
                let content = fs::read_to_string(&p).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                Self::parse(&content)
            }
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.min_observations < 3 {
            return Err(Error::Config(
                "engine.min_observations must be at least 3".to_string(),
            ));
        }
        if engine.max_iterations == 0 {
            return Err(Error::Config(
                "engine.max_iterations must be positive".to_string(),
            ));
        }
        if !(engine.confidence_z.is_finite() && engine.confidence_z > 0.0) {
            return Err(Error::Config(
                "engine.confidence_z must be positive".to_string(),
            ));
        }

        let planner = &self.planner;
        for (name, ratio) in [
            ("planner.max_zero_ratio", planner.max_zero_ratio),
            ("planner.max_outlier_fraction", planner.max_outlier_fraction),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::Config(format!("{} must be between 0 and 1", name)));
            }
        }
        if planner.stale_after_days <= 0 {
            return Err(Error::Config(
                "planner.stale_after_days must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_text_matches_defaults() {
        let parsed = ForecastConfig::parse(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed, ForecastConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ForecastConfig::parse(
            r#"
            [engine]
            max_p = 1

            [planner]
            stale_after_days = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.max_p, 1);
        assert_eq!(config.engine.max_q, 3);
        assert_eq!(config.planner.stale_after_days, 90);
        assert_eq!(config.planner.outlier_sigma, 3.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ForecastConfig::parse("[planner]\nmax_zero_ratio = 1.5"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ForecastConfig::parse("[engine]\nmin_observations = 1"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ForecastConfig::parse("not toml ["),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nconfidence_z = 1.64").unwrap();

        let config = ForecastConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.confidence_z, 1.64);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ForecastConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, ForecastConfig::default());
    }
}
