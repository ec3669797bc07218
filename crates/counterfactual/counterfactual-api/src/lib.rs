//! Counterfactual ET Consumer API
//!
//! Configuration types and builders for experiment consumers.

pub mod builder;
pub mod config;

pub use builder::ExperimentBuilder;
pub use config::{
    CrossvalConfig, CrossvalLayout, DataLayout, EstimatorConfig, ExperimentConfig, FeatureConfig,
    SearchSpace, TuningConfig, DEFAULT_DISTANCES, DEFAULT_FEATURES,
};

// Re-export SPI types
pub use counterfactual_spi::{
    CounterfactualError, Dataset, FeatureMatrix, FittedRegressor, Fold, FoldSplitter,
    Hyperparameters, ParamValue, Regressor, Result, Split,
};
