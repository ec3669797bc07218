//! Regression estimator traits.
//!
//! Hyperparameters and fitted state are explicit values: configuring an
//! estimator returns a new estimator and fitting returns a separate fitted
//! handle, so tuning and training never mutate a shared instance.

use crate::model::{FeatureMatrix, Hyperparameters};
use crate::Result;

/// An unfitted, configured regression estimator.
///
/// # Example
///
/// ```rust,ignore
/// use counterfactual_spi::{Regressor, FittedRegressor, Hyperparameters};
///
/// fn fit_and_predict<R: Regressor>(
///     base: &R,
///     params: &Hyperparameters,
///     x: &FeatureMatrix,
///     y: &[f64],
/// ) -> counterfactual_spi::Result<Vec<f64>> {
///     let configured = base.with_params(params)?;
///     let fitted = configured.fit(x, y)?;
///     fitted.predict(x)
/// }
/// ```
pub trait Regressor: Clone + Send + Sync {
    /// Trained form of this estimator.
    type Fitted: FittedRegressor;

    /// Short estimator name, used in persisted models and errors.
    fn name(&self) -> &str;

    /// Current hyperparameters.
    fn params(&self) -> Hyperparameters;

    /// Return a copy configured with `params` overlaid on the current ones.
    ///
    /// Fails with `UnsupportedHyperparameter` for names the estimator does
    /// not understand.
    fn with_params(&self, params: &Hyperparameters) -> Result<Self>;

    /// Fit on a feature matrix and target vector of equal length.
    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Self::Fitted>;
}

/// A trained regression estimator.
pub trait FittedRegressor: Send + Sync {
    /// Number of feature columns seen during fitting.
    fn n_features(&self) -> usize;

    /// Predict one value per row of `x`.
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;
}
