//! threshold-tuner: joint tuning of a decision threshold and base-model
//! hyperparameters for cost-sensitive binary classification.
//!
//! A `ThresholdSelector` wraps a probabilistic base trainer and expands its
//! hyperparameter space with a probability cutoff. The base model is fitted
//! once per distinct base-parameter setting and every threshold for that
//! setting is read off the same probability vector. Candidates are ranked by
//! their distance to the perfect classifier in (specificity, sensitivity)
//! space.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod grid;
pub mod grouping;
pub mod io;
pub mod metrics;
pub mod models;
pub mod selector;
pub mod thresholding;
pub mod tuning;

pub use error::{Result, TunerError};
pub use selector::ThresholdSelector;
pub use tuning::{Tuner, TuningOutcome};
