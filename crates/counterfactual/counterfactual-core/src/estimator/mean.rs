//! Baseline estimator predicting the training mean.

use counterfactual_spi::{
    CounterfactualError, FeatureMatrix, FittedRegressor, Hyperparameters, Regressor, Result,
};
use serde::{Deserialize, Serialize};

const NAME: &str = "mean";

/// Predicts the mean of the training target for every row.
///
/// Has no hyperparameters; useful as a reference score and for fast tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanRegressor;

impl MeanRegressor {
    pub fn new() -> Self {
        Self
    }
}

impl Regressor for MeanRegressor {
    type Fitted = MeanModel;

    fn name(&self) -> &str {
        NAME
    }

    fn params(&self) -> Hyperparameters {
        Hyperparameters::new()
    }

    fn with_params(&self, params: &Hyperparameters) -> Result<Self> {
        match params.iter().next() {
            Some((name, _)) => Err(CounterfactualError::UnsupportedHyperparameter {
                estimator: NAME.to_string(),
                name: name.clone(),
            }),
            None => Ok(*self),
        }
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<MeanModel> {
        if y.is_empty() {
            return Err(CounterfactualError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if y.len() != x.n_rows() {
            return Err(CounterfactualError::FitError(format!(
                "{} feature rows but {} target values",
                x.n_rows(),
                y.len()
            )));
        }
        Ok(MeanModel {
            mean: y.iter().sum::<f64>() / y.len() as f64,
            n_features: x.n_cols(),
        })
    }
}

/// Fitted [`MeanRegressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanModel {
    mean: f64,
    n_features: usize,
}

impl MeanModel {
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl FittedRegressor for MeanModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.n_features {
            return Err(CounterfactualError::ShapeMismatch {
                expected: self.n_features,
                actual: x.n_cols(),
            });
        }
        Ok(vec![self.mean; x.n_rows()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicts_training_mean() {
        let x = FeatureMatrix::from_rows(vec!["a".into()], &[vec![0.0], vec![1.0], vec![2.0]])
            .unwrap();
        let model = MeanRegressor.fit(&x, &[1.0, 2.0, 6.0]).unwrap();
        assert_eq!(model.mean(), 3.0);
        assert_eq!(model.predict(&x).unwrap(), vec![3.0; 3]);
    }

    #[test]
    fn test_rejects_any_hyperparameter() {
        let err = MeanRegressor
            .with_params(&Hyperparameters::new().with("max_depth", 3usize))
            .unwrap_err();
        assert!(matches!(err, CounterfactualError::UnsupportedHyperparameter { .. }));
        assert!(MeanRegressor.with_params(&Hyperparameters::new()).is_ok());
    }
}
