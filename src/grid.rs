//! Hyperparameter grids over {base parameters} x {decision threshold}.
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{SearchMode, TunerConfig};
use crate::error::{Result, TunerError};

/// Name of the features-per-split base parameter.
pub const MTRY: &str = "mtry";

/// Lower and upper threshold of the evenly spaced grid.
pub const GRID_THRESHOLD_BOUNDS: (f64, f64) = (0.01, 0.99);

/// Base-model hyperparameters, keyed by name.
///
/// Equality and hashing use the bit pattern of each value so that two
/// settings group together only when they are exactly the same.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaseParams(BTreeMap<String, f64>);

impl BaseParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mtry(n: usize) -> Self {
        Self::new().with(MTRY, n as f64)
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl PartialEq for BaseParams {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
    }
}

impl Eq for BaseParams {}

impl Hash for BaseParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (k, v) in &self.0 {
            k.hash(state);
            v.to_bits().hash(state);
        }
    }
}

impl fmt::Display for BaseParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// One tuning candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub base_params: BaseParams,
    pub threshold: f64,
}

impl GridRecord {
    pub fn new(base_params: BaseParams, threshold: f64) -> Self {
        Self {
            base_params,
            threshold,
        }
    }
}

impl fmt::Display for GridRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, threshold={:.4}", self.base_params, self.threshold)
    }
}

/// Ordered, validated sequence of tuning candidates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    records: Vec<GridRecord>,
}

impl Grid {
    /// Validate a caller-supplied grid: non-empty, thresholds strictly inside
    /// (0, 1) and no duplicate (base params, threshold) pairs.
    pub fn from_records(records: Vec<GridRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(TunerError::invalid("grid must contain at least one record"));
        }
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !(record.threshold > 0.0 && record.threshold < 1.0) {
                return Err(TunerError::invalid(format!(
                    "threshold {} is outside (0, 1)",
                    record.threshold
                )));
            }
            if !seen.insert((record.base_params.clone(), record.threshold.to_bits())) {
                return Err(TunerError::invalid(format!(
                    "duplicate grid record ({})",
                    record
                )));
            }
        }
        Ok(Grid { records })
    }

    pub fn records(&self) -> &[GridRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of distinct base-parameter settings.
    pub fn distinct_base_params(&self) -> usize {
        self.records
            .iter()
            .map(|r| &r.base_params)
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Options that shape random search.
#[derive(Debug, Clone, Copy)]
pub struct GridOptions {
    pub threshold_range: (f64, f64),
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            threshold_range: (0.0, 1.0),
        }
    }
}

impl From<&TunerConfig> for GridOptions {
    fn from(config: &TunerConfig) -> Self {
        Self {
            threshold_range: config.threshold_range,
        }
    }
}

/// `len` evenly spaced points spanning `[lo, hi]`, endpoints included.
pub fn evenly_spaced(lo: f64, hi: f64, len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (len - 1) as f64;
            (0..len)
                .map(|i| if i == len - 1 { hi } else { lo + step * i as f64 })
                .collect()
        }
    }
}

/// Canonical features-per-split default for `p` predictors: `floor(sqrt(p))`, at least 1.
pub fn default_mtry(p: usize) -> usize {
    ((p as f64).sqrt().floor() as usize).max(1)
}

/// Build the tuning grid for `p` predictors.
///
/// * `Grid`: `mtry` fixed at `default_mtry(p)`, thresholds evenly spaced over
///   [0.01, 0.99].
/// * `Random`: `len` distinct `mtry` values drawn from `1..=p`, each paired
///   with a threshold drawn uniformly from `options.threshold_range` and kept
///   strictly inside (0, 1).
pub fn generate_grid<R: Rng + ?Sized>(
    p: usize,
    len: usize,
    mode: SearchMode,
    options: &GridOptions,
    rng: &mut R,
) -> Result<Grid> {
    if p == 0 {
        return Err(TunerError::invalid("at least one predictor is required"));
    }
    if len == 0 {
        return Err(TunerError::invalid("grid length must be positive"));
    }

    let records: Vec<GridRecord> = match mode {
        SearchMode::Grid => {
            let mtry = BaseParams::mtry(default_mtry(p));
            let (lo, hi) = GRID_THRESHOLD_BOUNDS;
            evenly_spaced(lo, hi, len)
                .into_iter()
                .map(|t| GridRecord::new(mtry.clone(), t))
                .collect()
        }
        SearchMode::Random => {
            if len > p {
                return Err(TunerError::invalid(format!(
                    "{} distinct '{}' values requested but only {} predictors available",
                    len, MTRY, p
                )));
            }
            let (lo, hi) = options.threshold_range;
            if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || hi - lo <= 0.0 {
                return Err(TunerError::invalid(format!(
                    "threshold sampling range ({}, {}) is empty or outside [0, 1]",
                    lo, hi
                )));
            }
            let uniform = Uniform::new(lo, hi);
            let mtrys = rand::seq::index::sample(&mut *rng, p, len).into_vec();
            mtrys
                .into_iter()
                .map(|m| {
                    let threshold = loop {
                        let t = uniform.sample(&mut *rng);
                        if t > 0.0 && t < 1.0 {
                            break t;
                        }
                    };
                    GridRecord::new(BaseParams::mtry(m + 1), threshold)
                })
                .collect()
        }
    };

    let grid = Grid::from_records(records)?;
    log::debug!(
        "Generated {:?} grid: {} records over {} base settings",
        mode,
        grid.len(),
        grid.distinct_base_params()
    );
    Ok(grid)
}
