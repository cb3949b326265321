//! Deterministic stub trainer shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use ndarray::{Array1, Array2};
use threshold_tuner::data_handling::{ClassPair, Dataset};
use threshold_tuner::grid::{BaseParams, MTRY};
use threshold_tuner::models::{BaseTrainer, FittedClassifier, ProbabilityTable, TrainOptions};

/// Uses the first feature, clamped to [0, 1], as the positive probability.
pub struct ColumnModel {
    pub classes: ClassPair,
    pub proba_calls: AtomicUsize,
}

impl FittedClassifier for ColumnModel {
    fn classes(&self) -> &ClassPair {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> anyhow::Result<ProbabilityTable> {
        self.proba_calls.fetch_add(1, Ordering::SeqCst);
        let p = Array1::from_iter(x.column(0).iter().map(|&v| (v as f64).clamp(0.0, 1.0)));
        Ok(ProbabilityTable::new(self.classes.clone(), p))
    }
}

/// Counts fits and optionally fails for one `mtry` value.
#[derive(Default)]
pub struct CountingTrainer {
    pub fits: AtomicUsize,
    pub fail_on_mtry: Option<f64>,
}

impl CountingTrainer {
    pub fn failing_on(mtry: usize) -> Self {
        Self {
            fits: AtomicUsize::new(0),
            fail_on_mtry: Some(mtry as f64),
        }
    }

    pub fn fit_count(&self) -> usize {
        self.fits.load(Ordering::SeqCst)
    }
}

impl BaseTrainer for CountingTrainer {
    type Model = ColumnModel;

    fn fit(
        &self,
        x: &Array2<f32>,
        codes: &[usize],
        classes: &ClassPair,
        params: &BaseParams,
        _options: &TrainOptions,
    ) -> anyhow::Result<ColumnModel> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        if x.nrows() != codes.len() {
            bail!("row mismatch");
        }
        if params.get(MTRY) == self.fail_on_mtry {
            bail!("simulated failure for {}", params);
        }
        Ok(ColumnModel {
            classes: classes.clone(),
            proba_calls: AtomicUsize::new(0),
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Imbalanced two-class data: "bad" rows (first observed, positive) have a
/// high first feature, "good" rows a low one, with some overlap.
pub fn credit_like(n: usize, n_features: usize) -> Dataset {
    let mut values = Vec::with_capacity(n * n_features);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let bad = i % 4 == 0;
        let score = if bad {
            0.55 + 0.4 * ((i * 7 % 11) as f32 / 10.0)
        } else {
            0.05 + 0.6 * ((i * 5 % 13) as f32 / 12.0)
        };
        values.push(score);
        for f in 1..n_features {
            values.push(((i * (f + 3)) % 17) as f32);
        }
        labels.push(if bad { "bad" } else { "good" }.to_string());
    }
    let x = Array2::from_shape_vec((n, n_features), values).expect("valid shape");
    Dataset::new(x, labels).expect("valid dataset")
}
