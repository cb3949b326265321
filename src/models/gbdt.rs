use anyhow::{anyhow, bail};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::data_handling::{ClassPair, POSITIVE};
use crate::grid::{BaseParams, MTRY};
use crate::models::classifier_trait::{
    BaseTrainer, FittedClassifier, ProbabilityTable, TrainOptions,
};

/// Gradient Boosting Decision Tree (GBDT) trainer.
///
/// `mtry` is translated into a per-split feature sample ratio that gbdt turns
/// back into exactly `mtry` candidate features. Extra options understood:
/// `min_leaf_size` (integer).
pub struct GBDTTrainer {
    params: ModelConfig,
}

/// A fitted GBDT producing positive-class probabilities.
pub struct GBDTModel {
    model: GBDT,
    classes: ClassPair,
    feature_size: usize,
}

/// Ratio handed to gbdt so that `(ratio * p) as usize == mtry`.
///
/// gbdt truncates the product, so `mtry / p` alone can land one feature short.
fn feature_sample_ratio(mtry: usize, feature_size: usize) -> f64 {
    if mtry >= feature_size {
        1.0
    } else {
        (mtry as f64 + 0.5) / feature_size as f64
    }
}

impl GBDTTrainer {
    pub fn new(params: ModelConfig) -> Self {
        GBDTTrainer { params }
    }

    fn build_config(
        &self,
        feature_size: usize,
        base: &BaseParams,
        options: &TrainOptions,
    ) -> anyhow::Result<Config> {
        let mtry = base
            .get(MTRY)
            .ok_or_else(|| anyhow!("missing base parameter '{}'", MTRY))?;
        if mtry.fract() != 0.0 || mtry < 1.0 || mtry > feature_size as f64 {
            bail!(
                "'{}' must be an integer in 1..={}, got {}",
                MTRY,
                feature_size,
                mtry
            );
        }

        let mut config = Config::new();
        config.set_feature_size(feature_size);
        config.set_shrinkage(self.params.learning_rate);
        config.set_feature_sample_ratio(feature_sample_ratio(mtry as usize, feature_size));
        config.set_loss("LogLikelyhood");

        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                data_sample_ratio,
                debug,
                training_optimization_level,
            } => {
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_data_sample_ratio(*data_sample_ratio);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
            }
        }

        if let Some(raw) = options.get("min_leaf_size") {
            let n: usize = raw
                .parse()
                .map_err(|e| anyhow!("invalid min_leaf_size '{}': {}", raw, e))?;
            config.set_min_leaf_size(n);
        }

        Ok(config)
    }
}

impl BaseTrainer for GBDTTrainer {
    type Model = GBDTModel;

    fn fit(
        &self,
        x: &Array2<f32>,
        codes: &[usize],
        classes: &ClassPair,
        params: &BaseParams,
        options: &TrainOptions,
    ) -> anyhow::Result<GBDTModel> {
        if x.nrows() == 0 {
            bail!("cannot fit on an empty feature matrix");
        }
        if x.nrows() != codes.len() {
            bail!("{} feature rows but {} labels", x.nrows(), codes.len());
        }

        let feature_size = x.ncols();
        let config = self.build_config(feature_size, params, options)?;
        let mut gbdt = GBDT::new(&config);

        // Log-likelihood loss expects labels in {-1, 1}; 1 is the positive class.
        let mut train_x = DataVec::with_capacity(x.nrows());
        for (row, &code) in x.outer_iter().zip(codes) {
            let label = if code == POSITIVE { 1.0 } else { -1.0 };
            train_x.push(Data::new_training_data(row.to_vec(), 1.0, label, None));
        }

        gbdt.fit(&mut train_x);
        log::trace!("Fitted GBDT with {}", params);

        Ok(GBDTModel {
            model: gbdt,
            classes: classes.clone(),
            feature_size,
        })
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

impl FittedClassifier for GBDTModel {
    fn classes(&self) -> &ClassPair {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> anyhow::Result<ProbabilityTable> {
        if x.ncols() != self.feature_size {
            bail!(
                "model was fitted on {} features, got {}",
                self.feature_size,
                x.ncols()
            );
        }
        let test_x: DataVec = x
            .outer_iter()
            .map(|row| Data::new_test_data(row.to_vec(), None))
            .collect();
        let predictions = self.model.predict(&test_x);
        let positive = Array1::from_iter(
            predictions
                .into_iter()
                .map(|p| (p as f64).clamp(0.0, 1.0)),
        );
        Ok(ProbabilityTable::new(self.classes.clone(), positive))
    }
}
