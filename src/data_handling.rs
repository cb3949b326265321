//! Labelled feature batches and cross-validation fold assignment.
//!
//! A `Dataset` keeps the class levels in first-observed order. By convention
//! the first level is the positive class (the costly-to-miss minority class),
//! so row codes are `0` for positive and `1` for negative in binary data.
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, TunerError};

/// Code of the positive class in a binary `Dataset`.
pub const POSITIVE: usize = 0;
/// Code of the negative class in a binary `Dataset`.
pub const NEGATIVE: usize = 1;

/// The two class labels of a binary problem, in fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPair {
    pub positive: String,
    pub negative: String,
}

impl ClassPair {
    pub fn new(positive: impl Into<String>, negative: impl Into<String>) -> Self {
        Self {
            positive: positive.into(),
            negative: negative.into(),
        }
    }

    pub fn label(&self, code: usize) -> &str {
        if code == POSITIVE {
            &self.positive
        } else {
            &self.negative
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f32>,
    labels: Vec<String>,
    levels: Vec<String>,
    codes: Vec<usize>,
}

impl Dataset {
    /// Build a dataset from a feature matrix and one class label per row.
    ///
    /// Any number of class levels is accepted here; fitting is what requires
    /// exactly two.
    pub fn new(x: Array2<f32>, labels: Vec<String>) -> Result<Self> {
        if x.nrows() != labels.len() {
            return Err(TunerError::ShapeMismatch(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                labels.len()
            )));
        }

        let mut levels: Vec<String> = Vec::new();
        let mut codes = Vec::with_capacity(labels.len());
        for label in &labels {
            let code = match levels.iter().position(|l| l == label) {
                Some(idx) => idx,
                None => {
                    levels.push(label.clone());
                    levels.len() - 1
                }
            };
            codes.push(code);
        }

        Ok(Dataset {
            x,
            labels,
            levels,
            codes,
        })
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Class levels in first-observed order.
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Per-row index into `levels()`.
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// The positive/negative pair, or `UnsupportedProblemShape` unless the
    /// target has exactly two levels.
    pub fn class_pair(&self) -> Result<ClassPair> {
        match self.levels.as_slice() {
            [positive, negative] => Ok(ClassPair::new(positive.clone(), negative.clone())),
            other => Err(TunerError::UnsupportedProblemShape {
                levels: other.len(),
            }),
        }
    }

    /// Subset of rows. Class levels keep the parent's order so that the
    /// positive class stays fixed across folds.
    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
            levels: self.levels.clone(),
            codes: indices.iter().map(|&i| self.codes[i]).collect(),
        }
    }

    pub fn log_input_data_summary(&self) {
        let counts: Vec<String> = self
            .levels
            .iter()
            .enumerate()
            .map(|(code, level)| {
                let n = self.codes.iter().filter(|&&c| c == code).count();
                format!("{}={}", level, n)
            })
            .collect();
        log::info!(
            "Input data: {} rows, {} features, classes [{}]",
            self.nrows(),
            self.n_features(),
            counts.join(", ")
        );
    }
}

/// One cross-validation split, as row indices into the parent dataset.
#[derive(Debug, Clone)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold assignment: rows of each class are shuffled and dealt
/// round-robin so every fold sees both classes whenever the class counts allow.
pub fn stratified_folds<R: Rng + ?Sized>(
    data: &Dataset,
    n_folds: usize,
    rng: &mut R,
) -> Result<Vec<Fold>> {
    if n_folds < 2 {
        return Err(TunerError::invalid(format!(
            "at least 2 folds are required, got {}",
            n_folds
        )));
    }
    if n_folds > data.nrows() {
        return Err(TunerError::invalid(format!(
            "{} folds requested for {} rows",
            n_folds,
            data.nrows()
        )));
    }

    let mut assignment = vec![0usize; data.nrows()];
    let mut offset = 0;
    for code in 0..data.levels().len() {
        let mut rows: Vec<usize> = (0..data.nrows())
            .filter(|&i| data.codes()[i] == code)
            .collect();
        rows.shuffle(rng);
        for (k, row) in rows.into_iter().enumerate() {
            assignment[row] = (k + offset) % n_folds;
        }
        // Continue dealing where the previous class stopped to balance fold sizes.
        offset += data.codes().iter().filter(|&&c| c == code).count();
    }

    let folds = (0..n_folds)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..data.nrows()).partition(|&i| assignment[i] == fold);
            log::trace!(
                "Fold {}: {} training rows, {} held-out rows",
                fold,
                train.len(),
                test.len()
            );
            Fold { train, test }
        })
        .collect();

    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_observed_level_is_positive() {
        let x = Array2::zeros((4, 2));
        let data = Dataset::new(x, labels(&["bad", "good", "good", "bad"])).unwrap();
        let pair = data.class_pair().unwrap();
        assert_eq!(pair.positive, "bad");
        assert_eq!(pair.negative, "good");
        assert_eq!(data.codes(), &[0, 1, 1, 0]);
    }

    #[test]
    fn three_levels_is_unsupported() {
        let x = Array2::zeros((3, 1));
        let data = Dataset::new(x, labels(&["a", "b", "c"])).unwrap();
        assert!(matches!(
            data.class_pair(),
            Err(TunerError::UnsupportedProblemShape { levels: 3 })
        ));
    }

    #[test]
    fn row_count_mismatch_is_rejected() {
        let x = Array2::zeros((3, 1));
        assert!(Dataset::new(x, labels(&["a", "b"])).is_err());
    }

    #[test]
    fn select_rows_keeps_parent_levels() {
        let x = Array2::zeros((4, 1));
        let data = Dataset::new(x, labels(&["bad", "good", "good", "good"])).unwrap();
        let subset = data.select_rows(&[1, 2]);
        assert_eq!(subset.levels(), data.levels());
        assert_eq!(subset.codes(), &[1, 1]);
    }

    #[test]
    fn stratified_folds_cover_every_row_once() {
        let n = 23;
        let x = Array2::zeros((n, 1));
        let y = (0..n)
            .map(|i| if i % 4 == 0 { "bad" } else { "good" }.to_string())
            .collect();
        let data = Dataset::new(x, y).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let folds = stratified_folds(&data, 3, &mut rng).unwrap();

        let mut seen = vec![0; n];
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), n);
            for &i in &fold.test {
                seen[i] += 1;
            }
            // 6 positives dealt over 3 folds
            let positives = fold.test.iter().filter(|&&i| data.codes()[i] == POSITIVE).count();
            assert_eq!(positives, 2);
        }
        assert!(seen.iter().all(|&c| c == 1));
    }
}
