//! Random forest regression.
//!
//! Bagged ensemble of [`RegressionTree`]s. Each tree is grown on a bootstrap
//! resample (or the full data when bootstrapping is off) with a random feature
//! subset considered at every split. Prediction is the mean over trees.

use counterfactual_spi::{
    CounterfactualError, FeatureMatrix, FittedRegressor, Hyperparameters, ParamValue, Regressor,
    Result,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};

const NAME: &str = "random_forest";

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Every feature.
    All,
    /// Fixed count.
    Count(usize),
    /// Fraction of the feature count, in `(0, 1]`.
    Fraction(f64),
    Sqrt,
    Log2,
}

impl MaxFeatures {
    fn parse(value: &ParamValue) -> Option<Self> {
        match value {
            ParamValue::None => Some(MaxFeatures::All),
            ParamValue::Int(n) if *n > 0 => Some(MaxFeatures::Count(*n as usize)),
            ParamValue::Float(f) if *f > 0.0 && *f <= 1.0 => Some(MaxFeatures::Fraction(*f)),
            ParamValue::Text(s) => match s.as_str() {
                "sqrt" | "auto" => Some(MaxFeatures::Sqrt),
                "log2" => Some(MaxFeatures::Log2),
                _ => None,
            },
            _ => None,
        }
    }

    fn to_param(self) -> ParamValue {
        match self {
            MaxFeatures::All => ParamValue::None,
            MaxFeatures::Count(n) => ParamValue::from(n),
            MaxFeatures::Fraction(f) => ParamValue::Float(f),
            MaxFeatures::Sqrt => ParamValue::from("sqrt"),
            MaxFeatures::Log2 => ParamValue::from("log2"),
        }
    }

    /// Resolve against the number of features in the training matrix.
    pub fn resolve(self, n_features: usize) -> Result<usize> {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Count(n) => n,
            MaxFeatures::Fraction(f) => ((f * n_features as f64) as usize).max(1),
            MaxFeatures::Sqrt => ((n_features as f64).sqrt() as usize).max(1),
            MaxFeatures::Log2 => ((n_features as f64).log2() as usize).max(1),
        };
        if k > n_features {
            return Err(CounterfactualError::FitError(format!(
                "max_features={} exceeds the {} available features",
                k, n_features
            )));
        }
        Ok(k)
    }
}

/// Random forest regressor
///
/// @algorithm RandomForest
/// @category MachineLearning
/// @complexity O(t * n log n * f) fit, O(t * depth) predict per row
/// @thread_safe true
/// @since 0.1.0
///
/// # Example
///
/// ```rust
/// use counterfactual_core::estimator::RandomForestRegressor;
/// use counterfactual_spi::{FeatureMatrix, FittedRegressor, Hyperparameters, Regressor};
///
/// let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64]).collect();
/// let y: Vec<f64> = (0..50).map(|i| (i / 10) as f64).collect();
/// let x = FeatureMatrix::from_rows(vec!["a".into()], &rows).unwrap();
///
/// let forest = RandomForestRegressor::new()
///     .with_params(&Hyperparameters::new().with("n_estimators", 10usize).with("random_state", 0usize))
///     .unwrap();
/// let model = forest.fit(&x, &y).unwrap();
/// assert_eq!(model.predict(&x).unwrap().len(), 50);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: MaxFeatures,
    bootstrap: bool,
    random_state: Option<u64>,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
        }
    }
}

impl RandomForestRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    pub fn random_state(&self) -> Option<u64> {
        self.random_state
    }

    fn invalid(name: &str, value: &ParamValue, expected: &str) -> CounterfactualError {
        CounterfactualError::InvalidConfig(format!(
            "{}: '{}' expects {}, got {}",
            NAME, name, expected, value
        ))
    }
}

impl Regressor for RandomForestRegressor {
    type Fitted = RandomForestModel;

    fn name(&self) -> &str {
        NAME
    }

    fn params(&self) -> Hyperparameters {
        Hyperparameters::new()
            .with("n_estimators", self.n_estimators)
            .with("max_depth", self.max_depth)
            .with("min_samples_split", self.min_samples_split)
            .with("min_samples_leaf", self.min_samples_leaf)
            .with("max_features", self.max_features.to_param())
            .with("bootstrap", self.bootstrap)
            .with(
                "random_state",
                self.random_state
                    .and_then(|s| i64::try_from(s).ok())
                    .map_or(ParamValue::None, ParamValue::Int),
            )
    }

    fn with_params(&self, params: &Hyperparameters) -> Result<Self> {
        let mut next = self.clone();
        for (name, value) in params.iter() {
            match name.as_str() {
                "n_estimators" => {
                    next.n_estimators = value
                        .as_usize()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| Self::invalid(name, value, "a positive integer"))?;
                }
                "max_depth" => {
                    next.max_depth = if value.is_none() {
                        None
                    } else {
                        Some(
                            value
                                .as_usize()
                                .ok_or_else(|| Self::invalid(name, value, "an integer or null"))?,
                        )
                    };
                }
                "min_samples_split" => {
                    next.min_samples_split = value
                        .as_usize()
                        .filter(|n| *n >= 2)
                        .ok_or_else(|| Self::invalid(name, value, "an integer >= 2"))?;
                }
                "min_samples_leaf" => {
                    next.min_samples_leaf = value
                        .as_usize()
                        .filter(|n| *n >= 1)
                        .ok_or_else(|| Self::invalid(name, value, "an integer >= 1"))?;
                }
                "max_features" => {
                    next.max_features = MaxFeatures::parse(value).ok_or_else(|| {
                        Self::invalid(name, value, "an integer, a fraction, 'sqrt', 'log2' or null")
                    })?;
                }
                "bootstrap" => {
                    next.bootstrap = value
                        .as_bool()
                        .ok_or_else(|| Self::invalid(name, value, "a boolean"))?;
                }
                "random_state" => {
                    next.random_state = if value.is_none() {
                        None
                    } else {
                        Some(
                            value
                                .as_usize()
                                .and_then(|s| u64::try_from(s).ok())
                                .filter(|s| *s <= i64::MAX as u64)
                                .ok_or_else(|| {
                                    Self::invalid(name, value, "an integer in 0..=i64::MAX or null")
                                })?,
                        )
                    };
                }
                other => {
                    return Err(CounterfactualError::UnsupportedHyperparameter {
                        estimator: NAME.to_string(),
                        name: other.to_string(),
                    })
                }
            }
        }
        Ok(next)
    }

    fn fit(&self, x: &FeatureMatrix, y: &[f64]) -> Result<RandomForestModel> {
        let n = x.n_rows();
        if y.len() != n {
            return Err(CounterfactualError::FitError(format!(
                "{} feature rows but {} target values",
                n,
                y.len()
            )));
        }
        if n == 0 {
            return Err(CounterfactualError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if x.n_cols() == 0 {
            return Err(CounterfactualError::FitError(
                "feature matrix has no columns".into(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(CounterfactualError::FitError(
                "target contains non-finite values".into(),
            ));
        }

        let tree_params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(x.n_cols())?,
        };

        let mut seeder = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| seeder.gen()).collect();

        let bootstrap = self.bootstrap;
        let trees: Vec<RegressionTree> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let samples: Vec<usize> = if bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, samples, &tree_params, &mut rng)
            })
            .collect();

        Ok(RandomForestModel {
            trees,
            n_features: x.n_cols(),
            params: self.params(),
        })
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestModel {
    trees: Vec<RegressionTree>,
    n_features: usize,
    params: Hyperparameters,
}

impl RandomForestModel {
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Hyperparameters the forest was trained with.
    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }
}

impl FittedRegressor for RandomForestModel {
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
        if self.trees.is_empty() {
            return Err(CounterfactualError::PredictionError("forest has no trees".into()));
        }
        let n_trees = self.trees.len() as f64;
        let predictions = (0..x.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64])
            .collect();
        let y: Vec<f64> = (0..60).map(|i| if i < 30 { 1.0 } else { 3.0 }).collect();
        (
            FeatureMatrix::from_rows(vec!["a".into(), "b".into()], &rows).unwrap(),
            y,
        )
    }

    fn seeded(n: usize) -> RandomForestRegressor {
        RandomForestRegressor::new()
            .with_params(
                &Hyperparameters::new()
                    .with("n_estimators", n)
                    .with("random_state", 7usize),
            )
            .unwrap()
    }

    #[test]
    fn test_default_params() {
        let params = RandomForestRegressor::new().params();
        assert_eq!(params.get("n_estimators"), Some(&ParamValue::Int(100)));
        assert_eq!(params.get("max_depth"), Some(&ParamValue::None));
        assert_eq!(params.get("bootstrap"), Some(&ParamValue::Bool(true)));
    }

    #[test]
    fn test_with_params_leaves_original_untouched() {
        let base = RandomForestRegressor::new();
        let tuned = base
            .with_params(&Hyperparameters::new().with("max_depth", 5usize))
            .unwrap();
        assert_eq!(base.max_depth, None);
        assert_eq!(tuned.max_depth, Some(5));
    }

    #[test]
    fn test_unknown_param_rejected() {
        let err = RandomForestRegressor::new()
            .with_params(&Hyperparameters::new().with("criterion", "mse"))
            .unwrap_err();
        assert!(matches!(
            err,
            CounterfactualError::UnsupportedHyperparameter { ref name, .. } if name == "criterion"
        ));
    }

    #[test]
    fn test_bad_param_type_rejected() {
        let err = RandomForestRegressor::new()
            .with_params(&Hyperparameters::new().with("n_estimators", "many"))
            .unwrap_err();
        assert!(matches!(err, CounterfactualError::InvalidConfig(_)));
    }

    #[test]
    fn test_max_features_parse_and_resolve() {
        assert_eq!(
            MaxFeatures::parse(&ParamValue::from("sqrt")),
            Some(MaxFeatures::Sqrt)
        );
        assert_eq!(MaxFeatures::Sqrt.resolve(16).unwrap(), 4);
        assert_eq!(MaxFeatures::Log2.resolve(8).unwrap(), 3);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(9).unwrap(), 4);
        assert_eq!(MaxFeatures::All.resolve(5).unwrap(), 5);
        assert!(MaxFeatures::Count(3).resolve(2).is_err());
    }

    #[test]
    fn test_fit_predict_separates_classes() {
        let (x, y) = data();
        let model = seeded(20).fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();

        assert_eq!(model.trees().len(), 20);
        assert!(pred[0] < 2.0);
        assert!(pred[59] > 2.0);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (x, y) = data();
        let a = seeded(5).fit(&x, &y).unwrap();
        let b = seeded(5).fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_shape_mismatch() {
        let (x, y) = data();
        let model = seeded(3).fit(&x, &y).unwrap();
        let narrow = FeatureMatrix::from_rows(vec!["a".into()], &[vec![1.0]]).unwrap();
        assert!(matches!(
            model.predict(&narrow),
            Err(CounterfactualError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_model_json_round_trip() {
        let (x, y) = data();
        let model = seeded(3).fit(&x, &y).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: RandomForestModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_fit_rejects_matrix_without_columns() {
        let x = FeatureMatrix::from_rows(vec![], &[vec![], vec![], vec![]]).unwrap();
        let err = seeded(2).fit(&x, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, CounterfactualError::FitError(_)));
    }

    #[test]
    fn test_random_state_survives_params_round_trip() {
        let seed = i64::MAX as usize;
        let forest = RandomForestRegressor::new()
            .with_params(&Hyperparameters::new().with("random_state", seed))
            .unwrap();
        assert_eq!(forest.random_state(), Some(i64::MAX as u64));

        let again = RandomForestRegressor::new().with_params(&forest.params()).unwrap();
        assert_eq!(again.random_state(), forest.random_state());
        assert_eq!(
            forest.params().get("random_state").and_then(ParamValue::as_usize),
            Some(seed)
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_random_state_beyond_i64_rejected() {
        let err = RandomForestRegressor::new()
            .with_params(&Hyperparameters::new().with("random_state", usize::MAX))
            .unwrap_err();
        assert!(matches!(err, CounterfactualError::InvalidConfig(_)));
    }

    #[test]
    fn test_fit_rejects_missing_target() {
        let (x, mut y) = data();
        y[3] = f64::NAN;
        assert!(seeded(2).fit(&x, &y).is_err());
    }
}
