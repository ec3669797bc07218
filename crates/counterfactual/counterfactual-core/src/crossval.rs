//! Out-of-fold prediction and spatially grouped cross-validation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use counterfactual_api::CrossvalLayout;
use counterfactual_spi::{
    CounterfactualError, Dataset, FeatureMatrix, FittedRegressor, Fold, FoldSplitter, Regressor,
    Result, Split, X_COLUMN, Y_COLUMN,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::PreparedDataset;
use crate::metrics::{mae, r2, rmse};
use crate::spatial::SpatialBinning;
use crate::splitter::GroupKFold;
use crate::table::{format_value, format_values};

pub const FOLD_SIZE_COLUMN: &str = "fold_size";
pub const CV_FOLD_COLUMN: &str = "cv_fold";
pub const PREDICTION_COLUMN: &str = "ET_pred";

/// Scores of one cross-validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceScore {
    /// Bin size in meters.
    pub distance: f64,
    /// Distinct spatial labels at this distance.
    pub n_groups: usize,
    pub n_folds: usize,
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    pub elapsed_secs: f64,
}

/// Summary of a persisted cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossvalReport {
    pub split: Split,
    /// Written predictions table.
    pub path: PathBuf,
    pub scores: Vec<DistanceScore>,
    pub rows_written: usize,
}

/// Predict every row with a model that never saw it.
///
/// Folds are fitted in parallel. Every row must be held out by exactly one
/// fold.
pub fn cross_val_predict<R: Regressor>(
    estimator: &R,
    x: &FeatureMatrix,
    y: &[f64],
    folds: &[Fold],
) -> Result<Vec<f64>> {
    let n = x.n_rows();
    if y.len() != n {
        return Err(CounterfactualError::FitError(format!(
            "{} feature rows but {} target values",
            n,
            y.len()
        )));
    }

    let per_fold: Vec<(Vec<usize>, Vec<f64>)> = folds
        .par_iter()
        .map(|fold| -> Result<(Vec<usize>, Vec<f64>)> {
            let train_y: Vec<f64> = fold.train.iter().map(|&i| y[i]).collect();
            let model = estimator.fit(&x.select_rows(&fold.train), &train_y)?;
            let predicted = model.predict(&x.select_rows(&fold.test))?;
            Ok((fold.test.clone(), predicted))
        })
        .collect::<Result<_>>()?;

    let mut out = vec![f64::NAN; n];
    let mut covered = vec![false; n];
    for (test, predicted) in per_fold {
        for (i, p) in test.into_iter().zip(predicted) {
            if covered[i] {
                return Err(CounterfactualError::InvalidConfig(format!(
                    "row {} is held out by more than one fold",
                    i
                )));
            }
            covered[i] = true;
            out[i] = p;
        }
    }

    if let Some(missing) = covered.iter().position(|c| !c) {
        return Err(CounterfactualError::InvalidConfig(format!(
            "row {} is not held out by any fold",
            missing
        )));
    }
    Ok(out)
}

/// One grouped cross-validation pass per distance over the same prepared
/// data. Passes are independent of each other.
#[derive(Debug, Clone)]
pub struct SpatialCrossValidator {
    distances: Vec<f64>,
    n_splits: usize,
    layout: CrossvalLayout,
}

impl SpatialCrossValidator {
    pub fn new(distances: &[f64], n_splits: usize) -> Self {
        Self {
            distances: distances.to_vec(),
            n_splits,
            layout: CrossvalLayout::Long,
        }
    }

    pub fn with_layout(mut self, layout: CrossvalLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Run every pass and lay the predictions out as a table.
    pub fn run<R: Regressor>(
        &self,
        estimator: &R,
        prepared: &PreparedDataset,
    ) -> Result<(Dataset, Vec<DistanceScore>)> {
        if self.distances.is_empty() {
            return Err(CounterfactualError::InvalidConfig(
                "at least one cross-validation distance is required".into(),
            ));
        }
        prepared.require_target()?;

        let xs = prepared.data.numeric_column(X_COLUMN)?;
        let ys = prepared.data.numeric_column(Y_COLUMN)?;
        let splitter = GroupKFold::new(self.n_splits);

        let mut table = match self.layout {
            CrossvalLayout::Long => Dataset::default(),
            CrossvalLayout::Wide => prepared.data.clone(),
        };
        let mut scores = Vec::with_capacity(self.distances.len());

        for &distance in &self.distances {
            let binning = SpatialBinning::new(distance)?;
            let labels = binning.labels(&xs, &ys);
            let n_groups = labels.iter().collect::<HashSet<_>>().len();
            let folds = splitter.split(labels.len(), Some(labels.as_slice()))?;

            info!(distance, n_groups, n_folds = folds.len(), "cross-validation pass beginning");
            let start = Instant::now();
            let predicted = cross_val_predict(estimator, &prepared.x, &prepared.y, &folds)?;
            let elapsed_secs = start.elapsed().as_secs_f64();

            let score = DistanceScore {
                distance,
                n_groups,
                n_folds: folds.len(),
                r2: r2(&prepared.y, &predicted),
                rmse: rmse(&prepared.y, &predicted),
                mae: mae(&prepared.y, &predicted),
                elapsed_secs,
            };
            info!(
                distance,
                r2 = score.r2,
                rmse = score.rmse,
                elapsed_secs,
                "cross-validation pass completed"
            );
            scores.push(score);

            match self.layout {
                CrossvalLayout::Long => {
                    let pass = prepared
                        .data
                        .clone()
                        .with_column(FOLD_SIZE_COLUMN, vec![format_value(distance); labels.len()])?
                        .with_column(CV_FOLD_COLUMN, labels)?
                        .with_column(PREDICTION_COLUMN, format_values(&predicted))?;
                    table.append(pass)?;
                }
                CrossvalLayout::Wide => {
                    let name = format!("{}_{}", PREDICTION_COLUMN, format_value(distance));
                    table.set_column(&name, format_values(&predicted))?;
                }
            }
        }

        Ok((table, scores))
    }
}
