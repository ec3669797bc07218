//! Counterfactual ET Service Provider Interface
//!
//! Defines the contracts, data model and errors shared by every layer of the
//! counterfactual evapotranspiration workflow:
//!
//! - [`Regressor`] / [`FittedRegressor`]: the fit/predict capability an
//!   experiment is bound to
//! - [`FoldSplitter`]: train/held-out partitioning for cross-validation
//! - [`Dataset`] and [`FeatureMatrix`]: tabular input and model-ready features
//! - [`CounterfactualError`]: the error type for all operations

pub mod contract;
pub mod error;
pub mod model;

// Re-export all public items at the crate root for convenience
pub use contract::{FittedRegressor, FoldSplitter, Regressor};
pub use error::CounterfactualError;
pub use model::{
    is_missing_cell, Dataset, FeatureMatrix, Fold, Hyperparameters, ParamValue, Split,
    ET_COLUMN, MISSING_SENTINEL, X_COLUMN, Y_COLUMN,
};

/// Result type for counterfactual operations.
pub type Result<T> = std::result::Result<T, CounterfactualError>;
