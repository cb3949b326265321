pub mod classifier_trait;
pub mod factory;
pub mod gbdt;

pub use classifier_trait::{BaseTrainer, FittedClassifier, ProbabilityTable, TrainOptions};
