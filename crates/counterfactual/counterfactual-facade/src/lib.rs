//! Counterfactual ET Facade
//!
//! High-level API for counterfactual evapotranspiration experiments.
//! Re-exports all public types from the counterfactual stack.
//!
//! # Example
//!
//! ```ignore
//! use counterfactual_facade::prelude::*;
//!
//! let config = ExperimentBuilder::new("rf_baseline", "natural")
//!     .data_root("/data/et")
//!     .build()?;
//! let runner = ExperimentRunner::create(config, RandomForestRegressor::new())?;
//! let tuned = runner.tune_hyperparameters(Split::Train)?;
//! let model = runner.train_model(Split::Train, &tuned.regressor)?;
//! runner.predictions("agriculture", &model)?;
//! ```

// Re-export everything from core (which includes API and SPI)
pub use counterfactual_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    // Traits
    pub use counterfactual_spi::{FittedRegressor, FoldSplitter, Regressor};

    // Configuration
    pub use counterfactual_api::{
        CrossvalConfig, CrossvalLayout, DataLayout, EstimatorConfig, ExperimentBuilder,
        ExperimentConfig, FeatureConfig, SearchSpace, TuningConfig,
    };

    // Data model and errors
    pub use counterfactual_spi::{
        CounterfactualError, Dataset, FeatureMatrix, Hyperparameters, ParamValue, Result, Split,
    };

    // Implementations
    pub use counterfactual_core::{
        ExperimentRunner, GroupKFold, KFold, MeanRegressor, RandomForestRegressor,
        SpatialBinning, TrainedModel,
    };
}
