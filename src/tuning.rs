//! Cross-validated tuning over a threshold-augmented grid.
//!
//! Each fold fits one model per fit group on the training rows, computes the
//! held-out probabilities once, and scores every threshold of the group
//! against them. Groups are independent and may be fitted on the rayon pool.
use std::collections::HashMap;
use std::fmt::Write as _;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::config::{SearchMode, TunerConfig};
use crate::data_handling::{stratified_folds, ClassPair, Dataset};
use crate::error::{Result, TunerError};
use crate::grid::{BaseParams, Grid, GridRecord};
use crate::grouping::{FitCache, FitGroup};
use crate::metrics::{CostMatrix, Direction, EvaluationBatch, MetricSummary};
use crate::models::{BaseTrainer, FittedClassifier};
use crate::selector::{ThresholdSelector, SELECTION_METRIC};
use crate::thresholding::predict_at_thresholds;

/// Cross-validation driver.
#[derive(Debug, Clone)]
pub struct Tuner {
    pub folds: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub skip_failed_candidates: bool,
    pub search: SearchMode,
    pub tune_length: usize,
    pub cost_matrix: Option<CostMatrix>,
}

/// Cross-validated performance of one grid record.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    /// Position of the record in the grid.
    pub index: usize,
    pub record: GridRecord,
    /// Folds where the metric was defined.
    pub folds_evaluated: usize,
    /// Folds where sensitivity, specificity or AUC had no defined value.
    pub undefined_folds: Vec<usize>,
    /// The candidate's base fit failed and was skipped.
    pub failed: bool,
    pub distance_mean: Option<f64>,
    pub distance_sd: Option<f64>,
    pub roc_auc_mean: Option<f64>,
    pub sensitivity_mean: Option<f64>,
    pub specificity_mean: Option<f64>,
    pub expected_cost_mean: Option<f64>,
}

impl CandidateSummary {
    /// Whether the candidate takes part in the ranking.
    pub fn is_ranked(&self) -> bool {
        !self.failed && self.distance_mean.is_some()
    }
}

/// The winning candidate refitted on the full dataset.
pub struct TunedModel<M> {
    pub record: GridRecord,
    pub model: M,
}

impl<M: FittedClassifier> TunedModel<M> {
    pub fn threshold(&self) -> f64 {
        self.record.threshold
    }

    pub fn base_params(&self) -> &BaseParams {
        &self.record.base_params
    }

    pub fn classes(&self) -> &ClassPair {
        self.model.classes()
    }

    pub fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f64>> {
        let table = self.model.predict_proba(x).map_err(TunerError::PredictFailed)?;
        Ok(table.positive.to_vec())
    }

    /// Class labels at the tuned threshold.
    pub fn predict(&self, x: &Array2<f32>) -> Result<Vec<String>> {
        let table = self.model.predict_proba(x).map_err(TunerError::PredictFailed)?;
        let mut preds = predict_at_thresholds(&table, &[self.threshold()]);
        Ok(preds.entries.pop().map(|(_, labels)| labels).unwrap_or_default())
    }
}

pub struct TuningOutcome<M> {
    pub candidates: Vec<CandidateSummary>,
    pub best_index: usize,
    pub model: TunedModel<M>,
}

impl<M> TuningOutcome<M> {
    pub fn best(&self) -> &CandidateSummary {
        &self.candidates[self.best_index]
    }

    /// Ranked candidates, best first.
    pub fn sorted_by_distance(&self) -> Vec<&CandidateSummary> {
        let mut ranked: Vec<_> = self.candidates.iter().filter(|c| c.is_ranked()).collect();
        ranked.sort_by(|a, b| {
            let da = a.distance_mean.unwrap_or(f64::INFINITY);
            let db = b.distance_mean.unwrap_or(f64::INFINITY);
            da.total_cmp(&db).then(a.index.cmp(&b.index))
        });
        ranked
    }

    /// Plain-text table of the ranked candidates.
    pub fn summary_table(&self) -> String {
        let fmt = |v: Option<f64>| {
            v.map(|x| format!("{:.4}", x))
                .unwrap_or_else(|| "NA".to_string())
        };
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "candidate", "distance", "sd", "roc_auc", "sens", "spec", "cost"
        );
        for c in self.sorted_by_distance() {
            let _ = writeln!(
                out,
                "{:<24} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
                format!("{}, t={:.3}", c.record.base_params, c.record.threshold),
                fmt(c.distance_mean),
                fmt(c.distance_sd),
                fmt(c.roc_auc_mean),
                fmt(c.sensitivity_mean),
                fmt(c.specificity_mean),
                fmt(c.expected_cost_mean),
            );
        }
        out
    }
}

/// Per-fold outcome of every record of one group.
type GroupScores = Vec<(GridRecord, Result<MetricSummary>)>;

#[derive(Default)]
struct Accumulator {
    summaries: Vec<MetricSummary>,
    undefined_folds: Vec<usize>,
    failed: bool,
}

impl Default for Tuner {
    fn default() -> Self {
        Tuner::from_config(&TunerConfig::default())
    }
}

impl Tuner {
    pub fn from_config(config: &TunerConfig) -> Self {
        Self {
            folds: config.folds,
            seed: config.seed,
            parallel: config.parallel,
            skip_failed_candidates: config.skip_failed_candidates,
            search: config.search,
            tune_length: config.tune_length,
            cost_matrix: None,
        }
    }

    pub fn with_cost_matrix(mut self, cost: CostMatrix) -> Self {
        self.cost_matrix = Some(cost);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Generate the grid from the configured search mode and tune over it.
    pub fn run<T: BaseTrainer>(
        &self,
        selector: &ThresholdSelector<T>,
        data: &Dataset,
    ) -> Result<TuningOutcome<T::Model>> {
        let mut rng = self.rng();
        let grid = selector.grid(data.n_features(), self.tune_length, self.search, &mut rng)?;
        self.tune_with_rng(selector, data, &grid, &mut rng)
    }

    /// Cross-validate every record of `grid` and refit the winner on `data`.
    pub fn tune<T: BaseTrainer>(
        &self,
        selector: &ThresholdSelector<T>,
        data: &Dataset,
        grid: &Grid,
    ) -> Result<TuningOutcome<T::Model>> {
        let mut rng = self.rng();
        self.tune_with_rng(selector, data, grid, &mut rng)
    }

    fn tune_with_rng<T: BaseTrainer>(
        &self,
        selector: &ThresholdSelector<T>,
        data: &Dataset,
        grid: &Grid,
        rng: &mut StdRng,
    ) -> Result<TuningOutcome<T::Model>> {
        data.class_pair()?;
        data.log_input_data_summary();

        let groups = selector.group(grid);
        let folds = stratified_folds(data, self.folds, rng)?;
        log::info!(
            "Tuning {} candidates in {} fit groups over {} folds",
            grid.len(),
            groups.len(),
            folds.len()
        );

        let index: HashMap<(BaseParams, u64), usize> = grid
            .records()
            .iter()
            .enumerate()
            .map(|(i, r)| ((r.base_params.clone(), r.threshold.to_bits()), i))
            .collect();
        let slot = |r: &GridRecord| index[&(r.base_params.clone(), r.threshold.to_bits())];
        let mut acc: Vec<Accumulator> = (0..grid.len()).map(|_| Accumulator::default()).collect();

        for (fold_idx, fold) in folds.iter().enumerate() {
            log::info!(
                "Cross-validation fold {}: {} training rows, {} held-out rows",
                fold_idx,
                fold.train.len(),
                fold.test.len()
            );
            let train = data.select_rows(&fold.train);
            let test = data.select_rows(&fold.test);

            let cache = self.fit_fold(selector, &groups, &train, fold_idx, |group| {
                for record in group.records() {
                    acc[slot(&record)].failed = true;
                }
            })?;

            let results: Vec<(&FitGroup, Result<GroupScores>)> = if self.parallel {
                groups
                    .par_iter()
                    .filter_map(|g| cache.get(g.base_params()).map(|m| (g, m)))
                    .map(|(g, m)| (g, self.score_group(selector, g, &*m, &test)))
                    .collect()
            } else {
                groups
                    .iter()
                    .filter_map(|g| cache.get(g.base_params()).map(|m| (g, m)))
                    .map(|(g, m)| (g, self.score_group(selector, g, &*m, &test)))
                    .collect()
            };

            for (group, result) in results {
                match result {
                    Ok(scores) => {
                        for (record, score) in scores {
                            let i = slot(&record);
                            match score {
                                Ok(summary) => acc[i].summaries.push(summary),
                                Err(TunerError::UndefinedMetric(msg)) => {
                                    log::debug!(
                                        "Fold {}: {} undefined ({})",
                                        fold_idx,
                                        record,
                                        msg
                                    );
                                    acc[i].undefined_folds.push(fold_idx);
                                }
                                Err(e) => return Err(e),
                            }
                        }
                    }
                    Err(e) => {
                        self.skip_or_abort(e, fold_idx, group)?;
                        for record in group.records() {
                            acc[slot(&record)].failed = true;
                        }
                    }
                }
            }
        }

        let candidates: Vec<CandidateSummary> = grid
            .records()
            .iter()
            .zip(acc)
            .enumerate()
            .map(|(i, (record, a))| aggregate(i, record.clone(), a))
            .collect();

        let best_index = select_best(&candidates)?;
        let best = &candidates[best_index];
        log::info!(
            "Best candidate by {:?}: {} (mean {:.4})",
            SELECTION_METRIC,
            best.record,
            best.distance_mean.unwrap_or(f64::NAN)
        );

        let final_group = FitGroup {
            primary: best.record.clone(),
            submodels: Vec::new(),
        };
        let model = selector.fit(&final_group, data)?;

        Ok(TuningOutcome {
            model: TunedModel {
                record: best.record.clone(),
                model,
            },
            candidates,
            best_index,
        })
    }

    /// Fit every group on the fold's training rows, one model per base
    /// parameter set. Groups whose fit failed are reported to `on_skip` when
    /// failures are skipped and are absent from the returned cache.
    fn fit_fold<T: BaseTrainer>(
        &self,
        selector: &ThresholdSelector<T>,
        groups: &[FitGroup],
        train: &Dataset,
        fold_idx: usize,
        mut on_skip: impl FnMut(&FitGroup),
    ) -> Result<FitCache<T::Model>> {
        let fitted: Vec<(&FitGroup, Result<T::Model>)> = if self.parallel {
            groups
                .par_iter()
                .map(|g| (g, selector.fit(g, train)))
                .collect()
        } else {
            groups.iter().map(|g| (g, selector.fit(g, train))).collect()
        };

        let mut cache = FitCache::new();
        for (group, model) in fitted {
            match model {
                Ok(model) => {
                    cache.insert(group.base_params().clone(), model);
                }
                Err(e) => {
                    self.skip_or_abort(e, fold_idx, group)?;
                    on_skip(group);
                }
            }
        }
        Ok(cache)
    }

    fn skip_or_abort(&self, err: TunerError, fold_idx: usize, group: &FitGroup) -> Result<()> {
        match err {
            e @ (TunerError::FitFailed { .. } | TunerError::PredictFailed(_))
                if self.skip_failed_candidates =>
            {
                log::warn!(
                    "Fold {}: skipping {} candidates for {}: {}",
                    fold_idx,
                    group.thresholds().len(),
                    group.base_params(),
                    e
                );
                Ok(())
            }
            e => Err(e),
        }
    }

    fn score_group<T: BaseTrainer>(
        &self,
        selector: &ThresholdSelector<T>,
        group: &FitGroup,
        model: &T::Model,
        test: &Dataset,
    ) -> Result<GroupScores> {
        let (table, per_threshold) = selector.predict_codes(model, &test.x, group)?;
        let probs = table.positive.to_vec();

        let scores = per_threshold
            .into_iter()
            .map(|tc| {
                let batch = EvaluationBatch {
                    truth: test.codes(),
                    predicted: &tc.codes,
                    positive_probs: Some(&probs),
                };
                let record = GridRecord::new(group.base_params().clone(), tc.threshold);
                (record, selector.metric(&batch, self.cost_matrix.as_ref()))
            })
            .collect();
        Ok(scores)
    }
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

fn sd_of(values: &[f64]) -> Option<f64> {
    let sd = values.iter().std_dev();
    sd.is_finite().then_some(sd)
}

fn aggregate(index: usize, record: GridRecord, acc: Accumulator) -> CandidateSummary {
    let distances: Vec<f64> = acc
        .summaries
        .iter()
        .filter_map(|s| s.value(SELECTION_METRIC))
        .collect();
    let sens: Vec<f64> = acc.summaries.iter().map(|s| s.sensitivity).collect();
    let spec: Vec<f64> = acc.summaries.iter().map(|s| s.specificity).collect();
    let auc: Vec<f64> = acc.summaries.iter().filter_map(|s| s.roc_auc).collect();
    let cost: Vec<f64> = acc.summaries.iter().filter_map(|s| s.expected_cost).collect();

    CandidateSummary {
        index,
        record,
        folds_evaluated: acc.summaries.len(),
        undefined_folds: acc.undefined_folds,
        failed: acc.failed,
        distance_mean: mean_of(&distances),
        distance_sd: sd_of(&distances),
        roc_auc_mean: mean_of(&auc),
        sensitivity_mean: mean_of(&sens),
        specificity_mean: mean_of(&spec),
        expected_cost_mean: mean_of(&cost),
    }
}

/// Best mean of the selection metric wins; ties go to the earlier grid record.
fn select_best(candidates: &[CandidateSummary]) -> Result<usize> {
    let improves = |d: f64, bd: f64| match SELECTION_METRIC.direction() {
        Direction::Minimize => d < bd,
        Direction::Maximize => d > bd,
    };
    let mut best: Option<(usize, f64)> = None;
    for c in candidates.iter().filter(|c| c.is_ranked()) {
        if let Some(d) = c.distance_mean {
            if best.map_or(true, |(_, bd)| improves(d, bd)) {
                best = Some((c.index, d));
            }
        }
    }
    best.map(|(i, _)| i).ok_or_else(|| {
        TunerError::undefined("no candidate produced a defined distance in any fold")
    })
}
