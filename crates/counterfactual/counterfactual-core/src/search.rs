//! Randomized hyperparameter search scored by k-fold R².

use counterfactual_api::{SearchSpace, TuningConfig};
use counterfactual_spi::{
    CounterfactualError, FeatureMatrix, FittedRegressor, Fold, FoldSplitter, Hyperparameters,
    Regressor, Result,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::r2;
use crate::splitter::KFold;

/// Score of one sampled candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: Hyperparameters,
    pub mean_score: f64,
    pub fold_scores: Vec<f64>,
}

/// Outcome of a search.
#[derive(Debug, Clone)]
pub struct SearchResult<R> {
    /// Sampled values of the best candidate (only the searched names).
    pub best_params: Hyperparameters,
    pub best_score: f64,
    /// Base estimator configured with `best_params`.
    pub best_estimator: R,
    /// Every evaluated candidate, in sampling order.
    pub candidates: Vec<CandidateScore>,
}

/// Samples grid points without replacement and keeps the one with the best
/// mean cross-validated R².
#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    space: SearchSpace,
    n_iter: usize,
    cv_folds: usize,
    seed: u64,
}

impl RandomizedSearch {
    pub fn new(space: SearchSpace) -> Self {
        Self::from_config(&TuningConfig::default().space(space))
    }

    pub fn from_config(config: &TuningConfig) -> Self {
        Self {
            space: config.space.clone(),
            n_iter: config.n_iter,
            cv_folds: config.cv_folds,
            seed: config.seed,
        }
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter.max(1);
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Distinct grid points, at most `n_iter` of them.
    pub fn sample_candidates(&self) -> Vec<Hyperparameters> {
        let total = self.space.combinations();
        if self.space.is_empty() || total == 0 {
            return vec![Hyperparameters::new()];
        }
        let amount = self.n_iter.min(total);
        let mut rng = StdRng::seed_from_u64(self.seed);
        rand::seq::index::sample(&mut rng, total, amount)
            .into_iter()
            .map(|i| self.space.candidate(i))
            .collect()
    }

    /// Run the search for `base` on `(x, y)`.
    pub fn fit<R: Regressor>(
        &self,
        base: &R,
        x: &FeatureMatrix,
        y: &[f64],
    ) -> Result<SearchResult<R>> {
        let splitter = KFold::new(self.cv_folds);
        let folds = splitter.split(x.n_rows(), None)?;

        // Configure every candidate up front so a bad name fails before any fitting
        let configured: Vec<(Hyperparameters, R)> = self
            .sample_candidates()
            .into_iter()
            .map(|params| base.with_params(&params).map(|est| (params, est)))
            .collect::<Result<_>>()?;

        info!(
            estimator = base.name(),
            candidates = configured.len(),
            folds = folds.len(),
            rows = x.n_rows(),
            "starting randomized search"
        );

        let candidates: Vec<CandidateScore> = configured
            .par_iter()
            .map(|(params, estimator)| -> Result<CandidateScore> {
                let fold_scores = cross_val_score(estimator, x, y, &folds)?;
                let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                debug!(params = %params, mean_score, "scored candidate");
                Ok(CandidateScore {
                    params: params.clone(),
                    mean_score,
                    fold_scores,
                })
            })
            .collect::<Result<_>>()?;

        let mut best: Option<usize> = None;
        for (i, c) in candidates.iter().enumerate() {
            if c.mean_score.is_nan() {
                continue;
            }
            if best.map_or(true, |b| c.mean_score > candidates[b].mean_score) {
                best = Some(i);
            }
        }
        let best = best.ok_or_else(|| {
            CounterfactualError::FitError("no candidate produced a finite score".into())
        })?;

        let (best_params, best_estimator) = configured[best].clone();
        let best_score = candidates[best].mean_score;
        info!(params = %best_params, best_score, "randomized search finished");

        Ok(SearchResult {
            best_params,
            best_score,
            best_estimator,
            candidates,
        })
    }
}

/// R² of `estimator` on each held-out fold.
pub fn cross_val_score<R: Regressor>(
    estimator: &R,
    x: &FeatureMatrix,
    y: &[f64],
    folds: &[Fold],
) -> Result<Vec<f64>> {
    folds
        .iter()
        .map(|fold| -> Result<f64> {
            let train_x = x.select_rows(&fold.train);
            let train_y: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
            let model = estimator.fit(&train_x, &train_y)?;

            let test_x = x.select_rows(&fold.test);
            let test_y: Vec<f64> = fold.test.iter().map(|&i| y[i]).collect();
            let predicted = model.predict(&test_x)?;
            Ok(r2(&test_y, &predicted))
        })
        .collect()
}
