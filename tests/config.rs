//! Integration tests for configuration loading.

use std::io::Write;

use threshold_tuner::config::{ModelConfig, ModelType, SearchMode, TunerConfig};
use threshold_tuner::grid::GridOptions;

#[test]
fn model_type_default_is_gbdt() {
    match ModelType::default() {
        ModelType::GBDT { num_boost_round, .. } => assert!(num_boost_round > 0),
    }
}

#[test]
fn model_type_from_str_unknown_errors() {
    assert!("gbdt".parse::<ModelType>().is_ok());
    assert!("random_forest".parse::<ModelType>().is_err());
}

#[test]
fn tuner_config_round_trips_json() {
    let cfg = TunerConfig {
        search: SearchMode::Random,
        tune_length: 7,
        seed: Some(99),
        ..TunerConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"search\":\"random\""));
    assert!(json.contains("GBDT"));

    let back: TunerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.search, SearchMode::Random);
    assert_eq!(back.tune_length, 7);
    assert_eq!(back.seed, Some(99));
    assert!((back.model.learning_rate - cfg.model.learning_rate).abs() < 1e-6);
}

#[test]
fn partial_json_file_fills_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{ "search": "random", "tune_length": 4, "threshold_range": [0.05, 0.6] }}"#
    )
    .unwrap();

    let cfg = TunerConfig::from_json_file(file.path()).unwrap();
    assert_eq!(cfg.search, SearchMode::Random);
    assert_eq!(cfg.tune_length, 4);
    assert_eq!(cfg.folds, TunerConfig::default().folds);
    assert_eq!(GridOptions::from(&cfg).threshold_range, (0.05, 0.6));
}

#[test]
fn invalid_json_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "tune_length": 0 }}"#).unwrap();
    assert!(TunerConfig::from_json_file(file.path()).is_err());
}

#[test]
fn missing_file_reports_path() {
    let err = TunerConfig::from_json_file("/nonexistent/tuner.json").unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/tuner.json"));
}

#[test]
fn model_config_new() {
    let cfg = ModelConfig::new(0.05, ModelType::default());
    assert!((cfg.learning_rate - 0.05).abs() < 1e-6);
}
