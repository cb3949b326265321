//! Integration tests for the candidate-model operations of `ThresholdSelector`.

mod common;

use std::sync::atomic::Ordering;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use threshold_tuner::config::SearchMode;
use threshold_tuner::data_handling::{Dataset, POSITIVE};
use threshold_tuner::grid::{BaseParams, Grid, GridRecord, MTRY};
use threshold_tuner::grouping::FitCache;
use threshold_tuner::metrics::{distance_to_perfect, EvaluationBatch};
use threshold_tuner::{ThresholdSelector, TunerError};

use common::{credit_like, CountingTrainer};

fn selector() -> ThresholdSelector<CountingTrainer> {
    ThresholdSelector::new(CountingTrainer::default())
}

// ---------------------------------------------------------------------------
// Grid generation
// ---------------------------------------------------------------------------

#[test]
fn grid_mode_has_one_base_value_and_len_thresholds() {
    let sel = selector();
    let mut rng = StdRng::seed_from_u64(3);
    for (p, len) in [(1, 1), (9, 5), (20, 12), (100, 3)] {
        let grid = sel.grid(p, len, SearchMode::Grid, &mut rng).unwrap();
        assert_eq!(grid.distinct_base_params(), 1);
        assert_eq!(grid.len(), len);
    }
}

#[test]
fn grid_for_nine_predictors() {
    let sel = selector();
    let mut rng = StdRng::seed_from_u64(3);
    let grid = sel.grid(9, 5, SearchMode::Grid, &mut rng).unwrap();

    let thresholds: Vec<f64> = grid.records().iter().map(|r| r.threshold).collect();
    assert!(grid.records().iter().all(|r| r.base_params.get(MTRY) == Some(3.0)));
    assert_abs_diff_eq!(thresholds[0], 0.01);
    assert_abs_diff_eq!(thresholds[4], 0.99);
    for pair in thresholds.windows(2) {
        assert_abs_diff_eq!(pair[1] - pair[0], 0.245, epsilon = 1e-12);
    }
}

#[test]
fn random_search_is_reproducible_with_a_seed() {
    let sel = selector();
    let a = sel
        .grid(10, 6, SearchMode::Random, &mut StdRng::seed_from_u64(11))
        .unwrap();
    let b = sel
        .grid(10, 6, SearchMode::Random, &mut StdRng::seed_from_u64(11))
        .unwrap();
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// Grouping and fitting
// ---------------------------------------------------------------------------

#[test]
fn one_fit_per_group_and_submodels_cover_the_rest() {
    let sel = selector();
    let data = credit_like(40, 4);
    let records: Vec<GridRecord> = [(1, 0.2), (2, 0.3), (1, 0.6), (3, 0.5), (2, 0.9), (1, 0.4)]
        .iter()
        .map(|&(m, t)| GridRecord::new(BaseParams::mtry(m), t))
        .collect();
    let grid = Grid::from_records(records).unwrap();

    let groups = sel.group(&grid);
    let mut cache = FitCache::new();
    for group in &groups {
        cache
            .get_or_try_insert_with(group.base_params(), || sel.fit(group, &data))
            .unwrap();
    }
    // refitting through the cache is a no-op
    for group in &groups {
        cache
            .get_or_try_insert_with(group.base_params(), || sel.fit(group, &data))
            .unwrap();
    }

    let k = grid.distinct_base_params();
    assert_eq!(groups.len(), k);
    assert_eq!(cache.len(), k);
    assert_eq!(sel.trainer().fit_count(), k);
    let submodels: usize = groups.iter().map(|g| g.submodels.len()).sum();
    assert_eq!(submodels, grid.len() - k);
}

#[test]
fn three_class_target_is_rejected_without_fitting() {
    let sel = selector();
    let x = Array2::zeros((6, 2));
    let y = ["a", "b", "c", "a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let data = Dataset::new(x, y).unwrap();
    let grid = Grid::from_records(vec![GridRecord::new(BaseParams::mtry(1), 0.5)]).unwrap();
    let groups = sel.group(&grid);

    let err = sel.fit(&groups[0], &data).err().unwrap();
    assert!(matches!(err, TunerError::UnsupportedProblemShape { levels: 3 }));
    assert_eq!(sel.trainer().fit_count(), 0);
}

#[test]
fn trainer_failure_surfaces_as_fit_failed() {
    let sel = ThresholdSelector::new(CountingTrainer::failing_on(2));
    let data = credit_like(12, 3);
    let grid = Grid::from_records(vec![GridRecord::new(BaseParams::mtry(2), 0.5)]).unwrap();
    let groups = sel.group(&grid);
    assert!(matches!(
        sel.fit(&groups[0], &data),
        Err(TunerError::FitFailed { .. })
    ));
}

// ---------------------------------------------------------------------------
// Thresholding
// ---------------------------------------------------------------------------

fn three_row_setup() -> (ThresholdSelector<CountingTrainer>, Dataset) {
    let x = Array2::from_shape_vec((3, 1), vec![0.2, 0.6, 0.9]).unwrap();
    let y = vec!["bad".to_string(), "good".to_string(), "bad".to_string()];
    (selector(), Dataset::new(x, y).unwrap())
}

#[test]
fn concrete_threshold_scenario() {
    let (sel, data) = three_row_setup();
    let grid = Grid::from_records(vec![
        GridRecord::new(BaseParams::mtry(1), 0.5),
        GridRecord::new(BaseParams::mtry(1), 0.95),
    ])
    .unwrap();
    let groups = sel.group(&grid);
    let model = sel.fit(&groups[0], &data).unwrap();
    let preds = sel.predict(&model, &data.x, &groups[0]).unwrap();

    assert_eq!(preds.get(0.5).unwrap(), &["good", "bad", "bad"]);
    assert_eq!(preds.get(0.95).unwrap(), &["good", "good", "good"]);
    // primary (max) threshold first
    assert_eq!(preds.entries[0].0, 0.95);
    assert_eq!(model.proba_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn raising_the_threshold_only_removes_positives() {
    let sel = selector();
    let data = credit_like(60, 2);
    let thresholds = [0.05, 0.2, 0.35, 0.5, 0.65, 0.8, 0.95];
    let grid = Grid::from_records(
        thresholds
            .iter()
            .map(|&t| GridRecord::new(BaseParams::mtry(1), t))
            .collect(),
    )
    .unwrap();
    let groups = sel.group(&grid);
    let model = sel.fit(&groups[0], &data).unwrap();
    let preds = sel.predict(&model, &data.x, &groups[0]).unwrap();

    let positive_rows = |t: f64| -> Vec<usize> {
        preds
            .get(t)
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, label)| label.as_str() == "bad")
            .map(|(i, _)| i)
            .collect()
    };
    for pair in thresholds.windows(2) {
        let low = positive_rows(pair[0]);
        let high = positive_rows(pair[1]);
        assert!(high.iter().all(|i| low.contains(i)), "t={} vs t={}", pair[0], pair[1]);
    }
}

#[test]
fn prediction_is_idempotent() {
    let sel = selector();
    let data = credit_like(30, 2);
    let grid = sel
        .grid(2, 7, SearchMode::Grid, &mut StdRng::seed_from_u64(0))
        .unwrap();
    let groups = sel.group(&grid);
    let model = sel.fit(&groups[0], &data).unwrap();

    let first = sel.predict(&model, &data.x, &groups[0]).unwrap();
    let second = sel.predict(&model, &data.x, &groups[0]).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

#[test]
fn metric_on_thresholded_predictions() {
    let (sel, data) = three_row_setup();
    let grid = Grid::from_records(vec![GridRecord::new(BaseParams::mtry(1), 0.5)]).unwrap();
    let groups = sel.group(&grid);
    let model = sel.fit(&groups[0], &data).unwrap();
    let (table, codes) = sel.predict_codes(&model, &data.x, &groups[0]).unwrap();
    let probs = table.positive.to_vec();

    let batch = EvaluationBatch {
        truth: data.codes(),
        predicted: &codes[0].codes,
        positive_probs: Some(&probs),
    };
    let summary = sel.metric(&batch, None).unwrap();

    // truth: bad, good, bad; predicted: good, bad, bad
    assert_eq!(codes[0].codes[2], POSITIVE);
    assert_abs_diff_eq!(summary.sensitivity, 0.5);
    assert_abs_diff_eq!(summary.specificity, 0.0);
    assert_abs_diff_eq!(summary.distance, distance_to_perfect(0.5, 0.0));
    assert!(summary.expected_cost.is_none());
}

#[test]
fn metric_without_negatives_is_undefined() {
    let sel = selector();
    let truth = [POSITIVE, POSITIVE];
    let predicted = [POSITIVE, POSITIVE];
    let batch = EvaluationBatch {
        truth: &truth,
        predicted: &predicted,
        positive_probs: None,
    };
    assert!(matches!(
        sel.metric(&batch, None),
        Err(TunerError::UndefinedMetric(_))
    ));
}
