use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::data_handling::ClassPair;
use crate::grid::BaseParams;

/// Free-form training options forwarded to the base trainer unchanged.
pub type TrainOptions = BTreeMap<String, String>;

/// Class probabilities for a batch of rows.
///
/// Only the positive column is stored; the negative column is its complement.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityTable {
    pub classes: ClassPair,
    pub positive: Array1<f64>,
}

impl ProbabilityTable {
    pub fn new(classes: ClassPair, positive: Array1<f64>) -> Self {
        Self { classes, positive }
    }

    pub fn len(&self) -> usize {
        self.positive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positive.is_empty()
    }

    pub fn negative(&self) -> Array1<f64> {
        self.positive.mapv(|p| 1.0 - p)
    }
}

/// A trained binary classifier. Immutable once produced by a `BaseTrainer`.
pub trait FittedClassifier: Send + Sync {
    /// The two observed class labels, positive first.
    fn classes(&self) -> &ClassPair;

    /// Positive-class probabilities for each row of `x`.
    fn predict_proba(&self, x: &Array2<f32>) -> anyhow::Result<ProbabilityTable>;
}

/// Trains a base classifier for one setting of the base hyperparameters.
///
/// The decision threshold is never passed here: it is applied after the
/// fact to the probabilities the fitted model produces.
pub trait BaseTrainer: Sync {
    type Model: FittedClassifier;

    /// Fit on `x` with binary `codes` (0 = positive, 1 = negative).
    fn fit(
        &self,
        x: &Array2<f32>,
        codes: &[usize],
        classes: &ClassPair,
        params: &BaseParams,
        options: &TrainOptions,
    ) -> anyhow::Result<Self::Model>;

    /// Optional human readable name for the trainer
    fn name(&self) -> &str {
        "classifier"
    }
}
