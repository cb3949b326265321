//! The threshold-augmented candidate model.
//!
//! `ThresholdSelector` composes a base trainer and adds a second tuning
//! dimension, the decision threshold. It exposes the operations a
//! hyperparameter search driver needs: build a grid, group it into fit
//! groups, fit one model per group, and derive labels or probabilities for
//! every threshold of the group from a single probability pass.
use std::sync::Arc;

use ndarray::Array2;
use rand::Rng;

use crate::config::{SearchMode, TunerConfig};
use crate::data_handling::Dataset;
use crate::error::{Result, TunerError};
use crate::grid::{generate_grid, Grid, GridOptions};
use crate::grouping::{partition, FitGroup};
use crate::metrics::{summarize, CostMatrix, EvaluationBatch, Metric, MetricSummary};
use crate::models::{BaseTrainer, FittedClassifier, ProbabilityTable, TrainOptions};
use crate::thresholding::{
    codes_at_thresholds, predict_at_thresholds, replicate, ThresholdCodes, ThresholdPredictions,
};

/// Metric used to pick the winning candidate.
pub const SELECTION_METRIC: Metric = Metric::Distance;

pub struct ThresholdSelector<T: BaseTrainer> {
    trainer: T,
    options: TrainOptions,
    grid_options: GridOptions,
}

impl<T: BaseTrainer> ThresholdSelector<T> {
    pub fn new(trainer: T) -> Self {
        Self {
            trainer,
            options: TrainOptions::new(),
            grid_options: GridOptions::default(),
        }
    }

    /// Extra options forwarded to every base fit unchanged.
    pub fn with_train_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_grid_options(mut self, grid_options: GridOptions) -> Self {
        self.grid_options = grid_options;
        self
    }

    pub fn from_config(trainer: T, config: &TunerConfig) -> Self {
        Self::new(trainer).with_grid_options(GridOptions::from(config))
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    /// Candidate grid for `p` predictors.
    pub fn grid<R: Rng + ?Sized>(
        &self,
        p: usize,
        len: usize,
        mode: SearchMode,
        rng: &mut R,
    ) -> Result<Grid> {
        generate_grid(p, len, mode, &self.grid_options, rng)
    }

    /// One fit group per distinct base-parameter setting.
    pub fn group(&self, grid: &Grid) -> Vec<FitGroup> {
        partition(grid)
    }

    /// Fit the base model for one group. Only the base parameters reach the
    /// trainer; the group's thresholds are applied later.
    pub fn fit(&self, group: &FitGroup, data: &Dataset) -> Result<T::Model> {
        let classes = data.class_pair()?;
        log::debug!(
            "Fitting {} on {} rows with {}",
            self.trainer.name(),
            data.nrows(),
            group.base_params()
        );
        self.trainer
            .fit(&data.x, data.codes(), &classes, group.base_params(), &self.options)
            .map_err(|source| TunerError::FitFailed {
                params: group.base_params().to_string(),
                source,
            })
    }

    /// Probabilities for `x`, computed once per call.
    pub fn probabilities(&self, model: &T::Model, x: &Array2<f32>) -> Result<ProbabilityTable> {
        let table = model.predict_proba(x).map_err(TunerError::PredictFailed)?;
        if table.len() != x.nrows() {
            return Err(TunerError::ShapeMismatch(format!(
                "model returned {} probabilities for {} rows",
                table.len(),
                x.nrows()
            )));
        }
        Ok(table)
    }

    /// Labels at the group's primary threshold followed by each submodel threshold.
    pub fn predict(
        &self,
        model: &T::Model,
        x: &Array2<f32>,
        group: &FitGroup,
    ) -> Result<ThresholdPredictions> {
        let table = self.probabilities(model, x)?;
        Ok(predict_at_thresholds(&table, &group.thresholds()))
    }

    /// Class codes per threshold together with the one probability table they
    /// were derived from.
    pub fn predict_codes(
        &self,
        model: &T::Model,
        x: &Array2<f32>,
        group: &FitGroup,
    ) -> Result<(ProbabilityTable, Vec<ThresholdCodes>)> {
        let table = self.probabilities(model, x)?;
        let codes = codes_at_thresholds(table.positive.view(), &group.thresholds());
        Ok((table, codes))
    }

    /// The probability table once per threshold of the group, shared.
    pub fn prob(
        &self,
        model: &T::Model,
        x: &Array2<f32>,
        group: &FitGroup,
    ) -> Result<Vec<(f64, Arc<ProbabilityTable>)>> {
        let table = self.probabilities(model, x)?;
        Ok(replicate(table, &group.thresholds()))
    }

    /// Ranking metrics for one candidate's predictions on labelled rows.
    pub fn metric(
        &self,
        batch: &EvaluationBatch<'_>,
        cost: Option<&CostMatrix>,
    ) -> Result<MetricSummary> {
        summarize(batch, cost)
    }
}
