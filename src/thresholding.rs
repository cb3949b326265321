//! Turn one probability vector into class labels at many thresholds.
use std::sync::Arc;

use ndarray::ArrayView1;

use crate::data_handling::{NEGATIVE, POSITIVE};
use crate::models::ProbabilityTable;

/// Class codes (0 = positive, 1 = negative) predicted at one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCodes {
    pub threshold: f64,
    pub codes: Vec<usize>,
}

/// Labels for every requested threshold of one fitted model, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPredictions {
    pub entries: Vec<(f64, Vec<String>)>,
}

impl ThresholdPredictions {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, threshold: f64) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(t, _)| t.to_bits() == threshold.to_bits())
            .map(|(_, labels)| labels.as_slice())
    }
}

/// Positive when `p >= threshold`.
pub fn apply_threshold(positive: ArrayView1<f64>, threshold: f64) -> Vec<usize> {
    positive
        .iter()
        .map(|&p| if p >= threshold { POSITIVE } else { NEGATIVE })
        .collect()
}

/// Class codes for each threshold, all read from the same probability vector.
pub fn codes_at_thresholds(positive: ArrayView1<f64>, thresholds: &[f64]) -> Vec<ThresholdCodes> {
    thresholds
        .iter()
        .map(|&threshold| {
            let codes = apply_threshold(positive, threshold);
            log::trace!(
                "threshold {:.4}: {} of {} rows positive",
                threshold,
                codes.iter().filter(|&&c| c == POSITIVE).count(),
                codes.len()
            );
            ThresholdCodes { threshold, codes }
        })
        .collect()
}

/// Class labels for each threshold, in the order the thresholds are given.
pub fn predict_at_thresholds(table: &ProbabilityTable, thresholds: &[f64]) -> ThresholdPredictions {
    let entries = codes_at_thresholds(table.positive.view(), thresholds)
        .into_iter()
        .map(|tc| {
            let labels = tc
                .codes
                .iter()
                .map(|&c| table.classes.label(c).to_string())
                .collect();
            (tc.threshold, labels)
        })
        .collect();
    ThresholdPredictions { entries }
}

/// The same probability table once per threshold. Probabilities do not depend
/// on the threshold, so the table is shared rather than recomputed.
pub fn replicate(
    table: ProbabilityTable,
    thresholds: &[f64],
) -> Vec<(f64, Arc<ProbabilityTable>)> {
    let shared = Arc::new(table);
    thresholds
        .iter()
        .map(|&t| (t, Arc::clone(&shared)))
        .collect()
}
