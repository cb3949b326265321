use ndarray::Array2;
use threshold_tuner::config::{ModelConfig, ModelType};
use threshold_tuner::data_handling::ClassPair;
use threshold_tuner::grid::BaseParams;
use threshold_tuner::models::factory;
use threshold_tuner::models::{BaseTrainer, FittedClassifier, TrainOptions};

#[test]
fn test_factory_builds_and_predicts() {
    // tiny dataset
    let x = Array2::from_shape_vec(
        (6, 2),
        vec![
            1.0, 0.0, // bad
            0.0, 1.0, // good
            1.0, 0.1, // bad
            0.0, 0.9, // good
            1.1, 0.0, // bad
            0.0, 1.2, // good
        ],
    )
    .expect("failed to create feature matrix");
    let codes = vec![0, 1, 0, 1, 0, 1];

    let params = ModelConfig {
        learning_rate: 0.1,
        model_type: ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 3,
            data_sample_ratio: 1.0,
            debug: false,
            training_optimization_level: 2,
        },
    };

    let trainer = factory::build_trainer(params);
    let mut options = TrainOptions::new();
    options.insert("min_leaf_size".to_string(), "1".to_string());

    let model = trainer
        .fit(&x, &codes, &ClassPair::new("bad", "good"), &BaseParams::mtry(2), &options)
        .expect("fit should succeed");
    let probs = model.predict_proba(&x).expect("predict should succeed");
    assert_eq!(probs.len(), x.nrows());
    assert_eq!(trainer.name(), "gbdt");
}

#[test]
fn test_factory_rejects_unparseable_option() {
    let x = Array2::from_shape_vec((2, 1), vec![1.0, 0.0]).unwrap();
    let trainer = factory::build_trainer(ModelConfig::default());
    let mut options = TrainOptions::new();
    options.insert("min_leaf_size".to_string(), "many".to_string());

    let result = trainer.fit(
        &x,
        &[0, 1],
        &ClassPair::new("bad", "good"),
        &BaseParams::mtry(1),
        &options,
    );
    assert!(result.is_err());
}
