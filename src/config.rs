use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// How the hyperparameter grid is built.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// One canonical base value crossed with evenly spaced thresholds.
    Grid,
    /// Base values sampled without replacement, thresholds sampled uniformly.
    Random,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Grid
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grid" => Ok(SearchMode::Grid),
            "random" => Ok(SearchMode::Random),
            _ => Err(format!(
                "Unknown search mode: {}. Expected `grid` or `random`",
                s
            )),
        }
    }
}

/// Configuration of the base model handed to the trainer factory.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub learning_rate: f32,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported base trainers and their fixed (untuned) hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub enum ModelType {
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        /// Fraction of rows bagged for each tree.
        data_sample_ratio: f64,
        debug: bool,
        training_optimization_level: u8,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::GBDT {
            max_depth: 6,
            num_boost_round: 50,
            data_sample_ratio: 0.8,
            debug: false,
            training_optimization_level: 2,
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelType::default()),
            _ => Err(format!("Unknown model type: {}", s)),
        }
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f32, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            model_type,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            model_type: ModelType::default(),
        }
    }
}

/// Settings for one tuning run.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TunerConfig {
    pub search: SearchMode,
    /// Number of grid rows to generate (`len`).
    pub tune_length: usize,
    /// Bounds of the uniform threshold draw in random search.
    pub threshold_range: (f64, f64),
    /// Number of cross-validation folds.
    pub folds: usize,
    /// Seed for grid sampling and fold assignment. `None` draws from entropy.
    /// GBDT row and feature sampling uses gbdt's own thread-local generator
    /// and is not covered, so seeded runs with sampling ratios below 1.0 can
    /// still rank candidates differently.
    pub seed: Option<u64>,
    /// Fit independent groups on the rayon pool.
    pub parallel: bool,
    /// Keep tuning when a fit group fails instead of aborting the run.
    pub skip_failed_candidates: bool,
    pub model: ModelConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            search: SearchMode::Grid,
            tune_length: 10,
            threshold_range: (0.0, 1.0),
            folds: 5,
            seed: None,
            parallel: true,
            skip_failed_candidates: false,
            model: ModelConfig::default(),
        }
    }
}

impl TunerConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TunerConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tune_length == 0 {
            return Err(TunerError::invalid("tune_length must be positive"));
        }
        if self.folds < 2 {
            return Err(TunerError::invalid(format!(
                "at least 2 folds are required, got {}",
                self.folds
            )));
        }
        let (lo, hi) = self.threshold_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || hi - lo <= 0.0 {
            return Err(TunerError::invalid(format!(
                "threshold_range ({}, {}) must be a non-empty interval inside [0, 1]",
                lo, hi
            )));
        }
        Ok(())
    }
}
