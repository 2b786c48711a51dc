//! Engine configuration.

use gait_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Phase samples per resampled gait cycle
pub const DEFAULT_POINTS_PER_CYCLE: usize = 150;

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Phase points per cycle, fixed for the engine's lifetime
    pub points_per_cycle: usize,

    /// How row counts that do not split into whole cycles are handled
    pub reshape: ReshapeMode,

    /// Cycle validity heuristics
    pub validation: ValidationConfig,

    /// Outlier detection defaults
    pub outliers: OutlierConfig,

    /// Query cache configuration
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReshapeMode {
    /// Partial cycles are a [`gait_core::Error::Dimension`]
    #[default]
    Strict,
    /// Drop the trailing partial cycle and log a warning
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Multiplier on the physiological bounds
    pub tolerance: f64,

    /// Largest allowed sample-to-sample jump as a fraction of the scaled
    /// bound; zero or negative disables the continuity check
    pub max_step_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Z-score above which a cycle's deviation marks it as an outlier
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Entries kept before new results stop being stored
    pub max_entries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            points_per_cycle: DEFAULT_POINTS_PER_CYCLE,
            reshape: ReshapeMode::Strict,
            validation: ValidationConfig::default(),
            outliers: OutlierConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.0,
            max_step_fraction: 0.5,
        }
    }
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self { threshold: 3.0 }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, with `GAIT__*` environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("GAIT").separator("__"))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Self::finish(settings)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("GAIT").separator("__"))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Self::finish(settings)
    }

    fn finish(settings: config::Config) -> Result<Self> {
        let config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_reshape(mut self, mode: ReshapeMode) -> Self {
        self.reshape = mode;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.validation.tolerance = tolerance;
        self
    }

    pub fn with_points_per_cycle(mut self, points: usize) -> Self {
        self.points_per_cycle = points;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.points_per_cycle == 0 {
            return Err(Error::invalid_input("points_per_cycle must be > 0"));
        }
        let tolerance = self.validation.tolerance;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(Error::invalid_input(format!(
                "validation tolerance must be finite and > 0, got {tolerance}"
            )));
        }
        if !self.validation.max_step_fraction.is_finite() {
            return Err(Error::invalid_input("max_step_fraction must be finite"));
        }
        if !self.outliers.threshold.is_finite() {
            return Err(Error::invalid_input("outlier threshold must be finite"));
        }
        Ok(())
    }
}
