use anyhow::{Context, Result};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use threshold_tuner::config::{SearchMode, TunerConfig};
use threshold_tuner::data_handling::Dataset;
use threshold_tuner::io::read_labelled_csv;
use threshold_tuner::metrics::{confusion, CostMatrix};
use threshold_tuner::models::factory::build_trainer;
use threshold_tuner::thresholding::apply_threshold;
use threshold_tuner::{ThresholdSelector, Tuner};

/// Imbalanced synthetic credit data: roughly 30% "bad" applicants whose
/// first two features are shifted upwards.
fn synthetic_credit(n: usize, n_features: usize, seed: u64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut values = Vec::with_capacity(n * n_features);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        // first row is "bad" so that it becomes the positive class
        let bad = i == 0 || rng.gen_bool(0.3);
        for f in 0..n_features {
            let shift = if bad && f < 2 { 1.0 } else { 0.0 };
            values.push(shift + rng.gen_range(-1.0f32..1.0));
        }
        labels.push(if bad { "bad" } else { "good" }.to_string());
    }
    let x = Array2::from_shape_vec((n, n_features), values)?;
    Ok(Dataset::new(x, labels)?)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let data = match args.next() {
        Some(path) => {
            read_labelled_csv(&path)
                .with_context(|| format!("Failed to load {}", path))?
                .dataset
        }
        None => synthetic_credit(600, 9, 42)?,
    };
    let config = match args.next() {
        Some(path) => TunerConfig::from_json_file(path)?,
        None => TunerConfig {
            search: SearchMode::Grid,
            tune_length: 15,
            folds: 5,
            seed: Some(42),
            ..TunerConfig::default()
        },
    };

    // Missing a bad applicant costs five times a rejected good one.
    let cost = CostMatrix::from_error_costs(5.0, 1.0)?;

    let selector = ThresholdSelector::from_config(build_trainer(config.model.clone()), &config);
    let outcome = Tuner::from_config(&config)
        .with_cost_matrix(cost)
        .run(&selector, &data)?;

    println!("{}", outcome.summary_table());

    let best = outcome.best();
    println!(
        "Selected {} (mean distance {:.4}, mean cost {:.4})",
        best.record,
        best.distance_mean.unwrap_or(f64::NAN),
        best.expected_cost_mean.unwrap_or(f64::NAN)
    );

    // Resubstitution cost at the default 0.5 cutoff versus the tuned cutoff.
    let probs = outcome.model.predict_proba(&data.x)?;
    for threshold in [0.5, outcome.model.threshold()] {
        let predicted = apply_threshold(ArrayView1::from(probs.as_slice()), threshold);
        let counts = confusion(data.codes(), &predicted)?;
        println!(
            "threshold {:.3}: tp={} fp={} tn={} fn={} cost/row={:.4}",
            threshold,
            counts.tp,
            counts.fp,
            counts.tn,
            counts.fn_,
            cost.expected_cost(&counts)?
        );
    }

    Ok(())
}
