//! Experiment runner: binds one estimator, one dataset and one output
//! directory, and exposes the tune / crossval / train / predict stages.
//!
//! Stages hold no shared mutable state. Tuning returns a newly configured
//! estimator, training returns a [`TrainedModel`] that carries its feature
//! vocabulary, and each stage only ever (over)writes its own output file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use counterfactual_api::ExperimentConfig;
use counterfactual_spi::{
    CounterfactualError, Dataset, FittedRegressor, Hyperparameters, Regressor, Result, Split,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crossval::{CrossvalReport, SpatialCrossValidator, PREDICTION_COLUMN};
use crate::features::{self, FeatureEncoder, PreparedDataset};
use crate::search::{CandidateScore, RandomizedSearch};
use crate::table::{format_values, read_csv, subsample, write_csv};

pub const AG_ET_COLUMN: &str = "ag_ET";
pub const MANIFEST_FILE: &str = "experiment.json";
pub const PIPELINE_SOURCE_FILE: &str = "pipeline_source.rs";

/// Source of this module, stored in every experiment directory.
const PIPELINE_SOURCE: &str = include_str!("runner.rs");

/// Result of hyperparameter tuning.
#[derive(Debug, Clone)]
pub struct TuningOutcome<R> {
    pub best_params: Hyperparameters,
    /// Mean cross-validated R² of the best candidate.
    pub best_score: f64,
    /// The runner's estimator configured with `best_params`.
    pub regressor: R,
    pub candidates: Vec<CandidateScore>,
    pub n_rows_sampled: usize,
}

/// A fitted estimator together with everything needed to apply it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel<F> {
    pub estimator: String,
    pub split: Split,
    pub params: Hyperparameters,
    pub encoder: FeatureEncoder,
    pub n_rows: usize,
    pub model: F,
}

impl<F: FittedRegressor> TrainedModel<F> {
    /// Encode `dataset` with the training vocabulary and predict it.
    pub fn predict(&self, dataset: &Dataset) -> Result<(PreparedDataset, Vec<f64>)> {
        let prepared = features::prepare_with(&self.encoder, dataset)?;
        let predicted = self.model.predict(&prepared.x)?;
        Ok((prepared, predicted))
    }
}

/// Summary of an application-dataset prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionReport {
    pub name: String,
    pub path: PathBuf,
    pub rows_written: usize,
    /// Category cells absent from the training vocabulary.
    pub unknown_levels: usize,
}

/// Runs the stages of one experiment.
#[derive(Debug, Clone)]
pub struct ExperimentRunner<R> {
    config: ExperimentConfig,
    regressor: R,
    path: PathBuf,
}

impl<R> ExperimentRunner<R>
where
    R: Regressor,
    R::Fitted: Serialize + DeserializeOwned,
{
    /// Create the experiment directory and record its provenance.
    ///
    /// Fails with `PathExists` if the directory is already there.
    pub fn create(config: ExperimentConfig, regressor: R) -> Result<Self> {
        config.validate()?;
        let path = config.experiment_dir();
        if path.exists() {
            return Err(CounterfactualError::PathExists(path));
        }
        fs::create_dir_all(&path)?;

        for source in &config.provenance {
            let file_name = source.file_name().ok_or_else(|| {
                CounterfactualError::InvalidConfig(format!(
                    "provenance entry '{}' is not a file",
                    source.display()
                ))
            })?;
            fs::copy(source, path.join(file_name))?;
        }
        config.to_json_file(&path.join(MANIFEST_FILE))?;
        fs::write(path.join(PIPELINE_SOURCE_FILE), PIPELINE_SOURCE)?;

        info!(
            experiment = %config.name,
            path = %path.display(),
            estimator = regressor.name(),
            "experiment created"
        );
        Ok(Self {
            config,
            regressor,
            path,
        })
    }

    /// Attach to an experiment directory made earlier by [`create`](Self::create).
    pub fn open(config: ExperimentConfig, regressor: R) -> Result<Self> {
        config.validate()?;
        let path = config.experiment_dir();
        if !path.is_dir() {
            return Err(CounterfactualError::InvalidConfig(format!(
                "experiment directory '{}' does not exist",
                path.display()
            )));
        }
        Ok(Self {
            config,
            regressor,
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The estimator as configured at construction.
    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    /// Read `train/<dataset>.csv` or `test/<dataset>.csv`.
    pub fn load_split(&self, split: Split) -> Result<Dataset> {
        let path = self
            .config
            .layout
            .training_csv(split, &self.config.dataset);
        let dataset = read_csv(&path)?;
        info!(%split, rows = dataset.len(), path = %path.display(), "dataset loaded");
        Ok(dataset)
    }

    /// Fill missing predictors, select features and expand indicators.
    pub fn prepare_dataset(&self, dataset: &Dataset) -> Result<PreparedDataset> {
        features::prepare_dataset(&self.config.features, dataset)
    }

    /// Randomized search on a seeded subsample of `split`.
    ///
    /// Writes `best_params_<split>.json` and returns the tuned estimator; the
    /// runner's own estimator is left unchanged.
    pub fn tune_hyperparameters(&self, split: Split) -> Result<TuningOutcome<R>> {
        let tuning = &self.config.tuning;
        let dataset = self.load_split(split)?;
        let sample = subsample(&dataset, tuning.sample_fraction, tuning.seed)?;
        let prepared = self.prepare_dataset(&sample)?;
        prepared.require_target()?;

        let result = RandomizedSearch::from_config(tuning).fit(
            &self.regressor,
            &prepared.x,
            &prepared.y,
        )?;

        let path = self.best_params_path(split);
        write_json(&path, &result.best_params)?;
        info!(
            params = %result.best_params,
            best_score = result.best_score,
            path = %path.display(),
            "best hyperparameters saved"
        );

        Ok(TuningOutcome {
            best_params: result.best_params,
            best_score: result.best_score,
            regressor: result.best_estimator,
            candidates: result.candidates,
            n_rows_sampled: sample.len(),
        })
    }

    /// Parameters saved by an earlier tuning run, if any.
    pub fn load_best_params(&self, split: Split) -> Result<Option<Hyperparameters>> {
        let path = self.best_params_path(split);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    /// Spatially grouped cross-validation of `regressor` on `split`, one pass
    /// per distance. Writes `crossval_predictions_<split>.csv`.
    pub fn crossval(
        &self,
        split: Split,
        regressor: &R,
        distances: &[f64],
    ) -> Result<CrossvalReport> {
        let dataset = self.load_split(split)?;
        let prepared = self.prepare_dataset(&dataset)?;

        let (table, scores) =
            SpatialCrossValidator::new(distances, self.config.crossval.n_splits)
                .with_layout(self.config.crossval.layout)
                .run(regressor, &prepared)?;

        let path = self.path.join(format!("crossval_predictions_{}.csv", split));
        write_csv(&path, &table)?;
        info!(rows = table.len(), path = %path.display(), "crossval predictions saved");

        Ok(CrossvalReport {
            split,
            path,
            scores,
            rows_written: table.len(),
        })
    }

    /// Fit `regressor` on the whole of `split` and persist it as
    /// `trained_model_<split>.json`.
    pub fn train_model(&self, split: Split, regressor: &R) -> Result<TrainedModel<R::Fitted>> {
        let dataset = self.load_split(split)?;
        let prepared = self.prepare_dataset(&dataset)?;
        prepared.require_target()?;

        info!(
            estimator = regressor.name(),
            rows = prepared.x.n_rows(),
            features = prepared.x.n_cols(),
            "training beginning"
        );
        let fitted = regressor.fit(&prepared.x, &prepared.y)?;

        let trained = TrainedModel {
            estimator: regressor.name().to_string(),
            split,
            params: regressor.params(),
            encoder: prepared.encoder,
            n_rows: prepared.x.n_rows(),
            model: fitted,
        };

        let path = self.trained_model_path(split);
        write_json(&path, &trained)?;
        info!(path = %path.display(), "trained model saved");
        Ok(trained)
    }

    /// Restore a model saved by [`train_model`](Self::train_model).
    pub fn load_trained_model(&self, split: Split) -> Result<TrainedModel<R::Fitted>> {
        read_json(&self.trained_model_path(split))
    }

    /// Apply `model` to the application dataset `name` and write
    /// `<name>.csv` with `ET_pred` and `ag_ET = ET - ET_pred` appended.
    pub fn predictions(
        &self,
        name: &str,
        model: &TrainedModel<R::Fitted>,
    ) -> Result<PredictionReport> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(CounterfactualError::InvalidConfig(format!(
                "application dataset name '{}' is not a file name",
                name
            )));
        }

        let dataset = read_csv(&self.config.layout.application_csv(name))?;
        let (prepared, predicted) = model.predict(&dataset)?;

        let ag_et: Vec<f64> = prepared
            .y
            .iter()
            .zip(&predicted)
            .map(|(observed, pred)| observed - pred)
            .collect();

        let table = prepared
            .data
            .with_column(PREDICTION_COLUMN, format_values(&predicted))?
            .with_column(AG_ET_COLUMN, format_values(&ag_et))?;

        let path = self.path.join(format!("{}.csv", name));
        write_csv(&path, &table)?;
        info!(application = name, rows = table.len(), path = %path.display(), "predictions saved");

        Ok(PredictionReport {
            name: name.to_string(),
            path,
            rows_written: table.len(),
            unknown_levels: prepared.unknown_levels,
        })
    }

    fn best_params_path(&self, split: Split) -> PathBuf {
        self.path.join(format!("best_params_{}.json", split))
    }

    fn trained_model_path(&self, split: Split) -> PathBuf {
        self.path.join(format!("trained_model_{}.json", split))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| CounterfactualError::SerializationError(e.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CounterfactualError::SerializationError(e.to_string()))
}
