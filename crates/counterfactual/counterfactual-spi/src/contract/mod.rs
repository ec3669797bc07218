//! Contract module containing the counterfactual traits.
//!
//! - [`Regressor`] - Configurable, fittable estimator
//! - [`FittedRegressor`] - Trained estimator that predicts
//! - [`FoldSplitter`] - Cross-validation partitioning

mod fold_splitter;
mod regressor;

pub use fold_splitter::FoldSplitter;
pub use regressor::{FittedRegressor, Regressor};
