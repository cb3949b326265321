//! Binary classification metrics used to rank tuning candidates.
//!
//! The ranking metric is the Euclidean distance between the candidate's
//! (specificity, sensitivity) point and the perfect classifier at (1, 1).
//! Zero denominators are reported as `UndefinedMetric` instead of NaN so the
//! tuning loop can flag the candidate.
use serde::{Deserialize, Serialize};

use crate::data_handling::{NEGATIVE, POSITIVE};
use crate::error::{Result, TunerError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// Tally predictions against truth. Both slices hold class codes, 0 = positive.
pub fn confusion(truth: &[usize], predicted: &[usize]) -> Result<ConfusionCounts> {
    if truth.len() != predicted.len() {
        return Err(TunerError::ShapeMismatch(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    let mut counts = ConfusionCounts::default();
    for (&t, &p) in truth.iter().zip(predicted) {
        match (t == POSITIVE, p == POSITIVE) {
            (true, true) => counts.tp += 1,
            (true, false) => counts.fn_ += 1,
            (false, true) => counts.fp += 1,
            (false, false) => counts.tn += 1,
        }
    }
    Ok(counts)
}

/// TP / (TP + FN)
pub fn sensitivity(counts: &ConfusionCounts) -> Result<f64> {
    let denom = counts.tp + counts.fn_;
    if denom == 0 {
        return Err(TunerError::undefined(
            "sensitivity: no positive rows in the evaluation batch",
        ));
    }
    Ok(counts.tp as f64 / denom as f64)
}

/// TN / (TN + FP)
pub fn specificity(counts: &ConfusionCounts) -> Result<f64> {
    let denom = counts.tn + counts.fp;
    if denom == 0 {
        return Err(TunerError::undefined(
            "specificity: no negative rows in the evaluation batch",
        ));
    }
    Ok(counts.tn as f64 / denom as f64)
}

pub fn distance_to_perfect(sensitivity: f64, specificity: f64) -> f64 {
    ((1.0 - sensitivity).powi(2) + (1.0 - specificity).powi(2)).sqrt()
}

/// Area under the ROC curve via the Mann-Whitney U statistic, ties counted
/// as one half.
pub fn roc_auc(positive_probs: &[f64], truth: &[usize]) -> Result<f64> {
    if positive_probs.len() != truth.len() {
        return Err(TunerError::ShapeMismatch(format!(
            "{} probabilities but {} true labels",
            positive_probs.len(),
            truth.len()
        )));
    }

    let mut order: Vec<usize> = (0..positive_probs.len()).collect();
    order.sort_by(|&a, &b| positive_probs[a].total_cmp(&positive_probs[b]));

    // Average ranks over ties (1-based).
    let mut ranks = vec![0.0; order.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && positive_probs[order[j + 1]] == positive_probs[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let n_pos = truth.iter().filter(|&&c| c == POSITIVE).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(TunerError::undefined(
            "roc_auc: evaluation batch must contain both classes",
        ));
    }

    let rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(c, _)| **c == POSITIVE)
        .map(|(_, &r)| r)
        .sum();
    let u = rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

/// Misclassification costs `c(predicted, actual)`, index 0 = positive class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostMatrix {
    costs: [[f64; 2]; 2],
}

impl CostMatrix {
    pub fn new(costs: [[f64; 2]; 2]) -> Result<Self> {
        if costs.iter().flatten().any(|c| !c.is_finite()) {
            return Err(TunerError::invalid("cost matrix entries must be finite"));
        }
        Ok(Self { costs })
    }

    /// Zero cost on the diagonal, `fn_cost` for a missed positive and
    /// `fp_cost` for a false alarm.
    pub fn from_error_costs(fn_cost: f64, fp_cost: f64) -> Result<Self> {
        Self::new([[0.0, fp_cost], [fn_cost, 0.0]])
    }

    pub fn cost(&self, predicted: usize, actual: usize) -> f64 {
        self.costs[predicted][actual]
    }

    pub fn total_cost(&self, counts: &ConfusionCounts) -> f64 {
        counts.tp as f64 * self.cost(POSITIVE, POSITIVE)
            + counts.fp as f64 * self.cost(POSITIVE, NEGATIVE)
            + counts.fn_ as f64 * self.cost(NEGATIVE, POSITIVE)
            + counts.tn as f64 * self.cost(NEGATIVE, NEGATIVE)
    }

    /// Average cost per evaluated row.
    pub fn expected_cost(&self, counts: &ConfusionCounts) -> Result<f64> {
        let n = counts.total();
        if n == 0 {
            return Err(TunerError::undefined("expected cost of an empty batch"));
        }
        Ok(self.total_cost(counts) / n as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Minimize,
    Maximize,
}

/// Metrics a candidate can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    Distance,
    RocAuc,
    Sensitivity,
    Specificity,
    ExpectedCost,
}

impl Metric {
    pub fn direction(&self) -> Direction {
        match self {
            Metric::Distance | Metric::ExpectedCost => Direction::Minimize,
            Metric::RocAuc | Metric::Sensitivity | Metric::Specificity => Direction::Maximize,
        }
    }
}

/// Held-out rows with their true codes, predicted codes and (optionally)
/// positive-class probabilities.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationBatch<'a> {
    pub truth: &'a [usize],
    pub predicted: &'a [usize],
    pub positive_probs: Option<&'a [f64]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub distance: f64,
    pub roc_auc: Option<f64>,
    pub sensitivity: f64,
    pub specificity: f64,
    pub expected_cost: Option<f64>,
    pub counts: ConfusionCounts,
}

impl MetricSummary {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Distance => Some(self.distance),
            Metric::RocAuc => self.roc_auc,
            Metric::Sensitivity => Some(self.sensitivity),
            Metric::Specificity => Some(self.specificity),
            Metric::ExpectedCost => self.expected_cost,
        }
    }
}

/// Compute the full summary for one candidate.
pub fn summarize(batch: &EvaluationBatch<'_>, cost: Option<&CostMatrix>) -> Result<MetricSummary> {
    let counts = confusion(batch.truth, batch.predicted)?;
    let sens = sensitivity(&counts)?;
    let spec = specificity(&counts)?;
    let roc_auc = batch
        .positive_probs
        .map(|probs| roc_auc(probs, batch.truth))
        .transpose()?;
    let expected_cost = cost.map(|c| c.expected_cost(&counts)).transpose()?;

    Ok(MetricSummary {
        distance: distance_to_perfect(sens, spec),
        roc_auc,
        sensitivity: sens,
        specificity: spec,
        expected_cost,
        counts,
    })
}
