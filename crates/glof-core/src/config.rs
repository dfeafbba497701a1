use crate::error::{GlofError, Result};
use crate::models::SelectionMetric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub ndwi_threshold: ConfigValue<f64>,
    pub reflectance_gain: ConfigValue<f64>,
    pub reflectance_offset: ConfigValue<f64>,
    pub match_tolerance_m: ConfigValue<f64>,
    pub glacier_search_radius_m: ConfigValue<f64>,
    pub imputation_iterations: ConfigValue<usize>,
    pub test_fraction: ConfigValue<f64>,
    pub selection_metric: ConfigValue<SelectionMetric>,
    pub seed: ConfigValue<u64>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            ndwi_threshold: ConfigValue::new(0.30, ConfigSource::Default),
            reflectance_gain: ConfigValue::new(0.0000275, ConfigSource::Default),
            reflectance_offset: ConfigValue::new(-0.2, ConfigSource::Default),
            match_tolerance_m: ConfigValue::new(500.0, ConfigSource::Default),
            glacier_search_radius_m: ConfigValue::new(10_000.0, ConfigSource::Default),
            imputation_iterations: ConfigValue::new(10, ConfigSource::Default),
            test_fraction: ConfigValue::new(0.25, ConfigSource::Default),
            selection_metric: ConfigValue::new(SelectionMetric::RocAuc, ConfigSource::Default),
            seed: ConfigValue::new(42, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| GlofError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| GlofError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(threshold) = file_config.ndwi_threshold {
            self.ndwi_threshold.update(check_ndwi_threshold(threshold)?, ConfigSource::File);
        }
        if let Some(gain) = file_config.reflectance_gain {
            self.reflectance_gain.update(gain, ConfigSource::File);
        }
        if let Some(offset) = file_config.reflectance_offset {
            self.reflectance_offset.update(offset, ConfigSource::File);
        }
        if let Some(tolerance) = file_config.match_tolerance_m {
            self.match_tolerance_m
                .update(check_positive("match_tolerance_m", tolerance)?, ConfigSource::File);
        }
        if let Some(radius) = file_config.glacier_search_radius_m {
            self.glacier_search_radius_m
                .update(check_positive("glacier_search_radius_m", radius)?, ConfigSource::File);
        }
        if let Some(iterations) = file_config.imputation_iterations {
            self.imputation_iterations.update(iterations, ConfigSource::File);
        }
        if let Some(fraction) = file_config.test_fraction {
            self.test_fraction.update(check_test_fraction(fraction)?, ConfigSource::File);
        }
        if let Some(metric) = file_config.selection_metric {
            self.selection_metric.update(metric, ConfigSource::File);
        }
        if let Some(seed) = file_config.seed {
            self.seed.update(seed, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        if let Some(v) = env_parsed("GLOF_NDWI_THRESHOLD", |s| {
            s.parse::<f64>().ok().and_then(|v| check_ndwi_threshold(v).ok())
        }) {
            self.ndwi_threshold.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_REFLECTANCE_GAIN", |s| s.parse::<f64>().ok()) {
            self.reflectance_gain.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_REFLECTANCE_OFFSET", |s| s.parse::<f64>().ok()) {
            self.reflectance_offset.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_MATCH_TOLERANCE_M", |s| {
            s.parse::<f64>().ok().and_then(|v| check_positive("match_tolerance_m", v).ok())
        }) {
            self.match_tolerance_m.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_GLACIER_SEARCH_RADIUS_M", |s| {
            s.parse::<f64>().ok().and_then(|v| check_positive("glacier_search_radius_m", v).ok())
        }) {
            self.glacier_search_radius_m.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_IMPUTATION_ITERATIONS", |s| s.parse::<usize>().ok()) {
            self.imputation_iterations.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_TEST_FRACTION", |s| {
            s.parse::<f64>().ok().and_then(|v| check_test_fraction(v).ok())
        }) {
            self.test_fraction.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_SELECTION_METRIC", |s| parse_selection_metric(s).ok()) {
            self.selection_metric.update(v, ConfigSource::Environment);
        }
        if let Some(v) = env_parsed("GLOF_SEED", |s| s.parse::<u64>().ok()) {
            self.seed.update(v, ConfigSource::Environment);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) -> Result<()> {
        if let Some(threshold) = overrides.ndwi_threshold {
            self.ndwi_threshold.update(check_ndwi_threshold(threshold)?, ConfigSource::Cli);
        }
        if let Some(tolerance) = overrides.match_tolerance_m {
            self.match_tolerance_m
                .update(check_positive("match_tolerance_m", tolerance)?, ConfigSource::Cli);
        }
        if let Some(iterations) = overrides.imputation_iterations {
            self.imputation_iterations.update(iterations, ConfigSource::Cli);
        }
        if let Some(fraction) = overrides.test_fraction {
            self.test_fraction.update(check_test_fraction(fraction)?, ConfigSource::Cli);
        }
        if let Some(metric) = overrides.selection_metric {
            self.selection_metric.update(metric, ConfigSource::Cli);
        }
        if let Some(seed) = overrides.seed {
            self.seed.update(seed, ConfigSource::Cli);
        }
        Ok(())
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut map = BTreeMap::new();

        let mut insert = |key: &str, value: String, source: ConfigSource| {
            map.insert(key.to_string(), (value, source));
        };

        insert("ndwi_threshold", self.ndwi_threshold.value.to_string(), self.ndwi_threshold.source);
        insert(
            "reflectance_gain",
            self.reflectance_gain.value.to_string(),
            self.reflectance_gain.source,
        );
        insert(
            "reflectance_offset",
            self.reflectance_offset.value.to_string(),
            self.reflectance_offset.source,
        );
        insert(
            "match_tolerance_m",
            self.match_tolerance_m.value.to_string(),
            self.match_tolerance_m.source,
        );
        insert(
            "glacier_search_radius_m",
            self.glacier_search_radius_m.value.to_string(),
            self.glacier_search_radius_m.source,
        );
        insert(
            "imputation_iterations",
            self.imputation_iterations.value.to_string(),
            self.imputation_iterations.source,
        );
        insert("test_fraction", self.test_fraction.value.to_string(), self.test_fraction.source);
        insert(
            "selection_metric",
            self.selection_metric.value.to_string(),
            self.selection_metric.source,
        );
        insert("seed", self.seed.value.to_string(), self.seed.source);

        map
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    ndwi_threshold: Option<f64>,
    reflectance_gain: Option<f64>,
    reflectance_offset: Option<f64>,
    match_tolerance_m: Option<f64>,
    glacier_search_radius_m: Option<f64>,
    imputation_iterations: Option<usize>,
    test_fraction: Option<f64>,
    selection_metric: Option<SelectionMetric>,
    seed: Option<u64>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub ndwi_threshold: Option<f64>,
    pub match_tolerance_m: Option<f64>,
    pub imputation_iterations: Option<usize>,
    pub test_fraction: Option<f64>,
    pub selection_metric: Option<SelectionMetric>,
    pub seed: Option<u64>,
}

fn env_parsed<T>(key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = env::var(key).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        tracing::warn!("Ignoring invalid {} value '{}'", key, raw);
    }
    parsed
}

fn check_ndwi_threshold(value: f64) -> Result<f64> {
    if value.is_finite() && (-1.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GlofError::ConfigInvalid {
            key: "ndwi_threshold".to_string(),
            reason: format!("{} is outside the NDWI range [-1, 1]", value),
        })
    }
}

fn check_positive(key: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(GlofError::ConfigInvalid {
            key: key.to_string(),
            reason: format!("{} must be a positive distance", value),
        })
    }
}

fn check_test_fraction(value: f64) -> Result<f64> {
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(GlofError::ConfigInvalid {
            key: "test_fraction".to_string(),
            reason: format!("{} must lie strictly between 0 and 1", value),
        })
    }
}

/// Parse selection metric from string
pub fn parse_selection_metric(s: &str) -> Result<SelectionMetric> {
    match s.to_lowercase().as_str() {
        "roc_auc" | "auc" | "roc-auc" => Ok(SelectionMetric::RocAuc),
        "f1" => Ok(SelectionMetric::F1),
        _ => Err(GlofError::ConfigInvalid {
            key: "selection_metric".to_string(),
            reason: format!("Invalid selection metric: {}. Use roc_auc or f1", s),
        }),
    }
}
