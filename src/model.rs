//! Logistic churn model: fitting, evaluation, scoring and persistence.

pub mod logistic;
pub mod metrics;
pub mod predict;
pub mod storage;
pub mod train;

pub use logistic::{LogisticModel, sigmoid};
pub use metrics::{ConfusionMatrix, Metrics};
pub use predict::{ChurnLabel, DEFAULT_TOP_N, FeatureContribution, Prediction, predict};
pub use storage::ModelStore;
pub use train::{TrainOptions, TrainingReport, train};
