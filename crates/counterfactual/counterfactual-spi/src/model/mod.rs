//! Model module containing the counterfactual data structures.
//!
//! - [`Dataset`] - Tabular observations with verbatim cells
//! - [`FeatureMatrix`] - Dense model-ready predictors
//! - [`Split`] - Train/test dataset selector
//! - [`Hyperparameters`] - Named estimator parameters
//! - [`Fold`] - One cross-validation partition

mod dataset;
mod feature_matrix;
mod fold;
mod hyperparameters;
mod split;

pub use dataset::{is_missing_cell, Dataset, ET_COLUMN, MISSING_SENTINEL, X_COLUMN, Y_COLUMN};
pub use feature_matrix::FeatureMatrix;
pub use fold::Fold;
pub use hyperparameters::{Hyperparameters, ParamValue};
pub use split::Split;
