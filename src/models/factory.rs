use crate::config::{ModelConfig, ModelType};
use crate::models::gbdt::GBDTTrainer;

/// Build a base trainer from a `ModelConfig`.
///
/// `ModelType` currently has a single variant, so this returns the concrete
/// trainer rather than a boxed one; `BaseTrainer` has an associated model
/// type and is not object safe.
pub fn build_trainer(params: ModelConfig) -> GBDTTrainer {
    match params.model_type {
        ModelType::GBDT { .. } => GBDTTrainer::new(params),
    }
}
