//! Counterfactual ET Core
//!
//! Core implementations for the counterfactual evapotranspiration workflow:
//! - CSV loading and writing
//! - Feature preparation with a persisted indicator vocabulary
//! - Spatial binning and grouped / contiguous fold splitting
//! - Random forest and mean-baseline regressors
//! - Randomized hyperparameter search and out-of-fold prediction
//! - The [`ExperimentRunner`] that ties the stages to an experiment directory

pub mod crossval;
pub mod estimator;
pub mod features;
pub mod metrics;
pub mod runner;
pub mod search;
pub mod spatial;
pub mod splitter;
pub mod table;

pub use crossval::{cross_val_predict, CrossvalReport, DistanceScore, SpatialCrossValidator};
pub use estimator::{
    MaxFeatures, MeanModel, MeanRegressor, RandomForestModel, RandomForestRegressor,
    RegressionTree,
};
pub use features::{prepare_dataset, prepare_with, FeatureEncoder, PreparedDataset};
pub use runner::{ExperimentRunner, PredictionReport, TrainedModel, TuningOutcome};
pub use search::{cross_val_score, CandidateScore, RandomizedSearch, SearchResult};
pub use spatial::SpatialBinning;
pub use splitter::{GroupKFold, KFold};
pub use table::{read_csv, subsample, write_csv};

// Re-export from API for convenience
pub use counterfactual_api::{
    CrossvalConfig, CrossvalLayout, DataLayout, EstimatorConfig, ExperimentBuilder,
    ExperimentConfig, FeatureConfig, SearchSpace, TuningConfig, DEFAULT_DISTANCES,
    DEFAULT_FEATURES,
};

// Re-export SPI types
pub use counterfactual_spi::{
    CounterfactualError, Dataset, FeatureMatrix, FittedRegressor, Fold, FoldSplitter,
    Hyperparameters, ParamValue, Regressor, Result, Split,
};
