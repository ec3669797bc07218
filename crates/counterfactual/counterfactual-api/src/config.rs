//! Experiment configuration types.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use counterfactual_spi::{CounterfactualError, Hyperparameters, ParamValue, Result, Split};
use serde::{Deserialize, Serialize};

/// Numeric predictor columns used when none are configured.
pub const DEFAULT_FEATURES: [&str; 8] = [
    "x", "y", "Elevation", "Slope", "Soil", "Aspect", "TWI", "PET",
];

/// Spatial bin sizes in meters, coarsest first.
pub const DEFAULT_DISTANCES: [f64; 6] = [50_000.0, 20_000.0, 10_000.0, 5_000.0, 2_000.0, 1.0];

fn default_target() -> String {
    counterfactual_spi::ET_COLUMN.to_string()
}

/// Feature preparation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Numeric predictor columns, in matrix order.
    pub columns: Vec<String>,
    /// Expand `month` into one indicator column per level.
    pub month: bool,
    /// Expand `year` into one indicator column per level.
    pub year: bool,
    /// Pass missing predictor cells through as `NaN` instead of the sentinel.
    pub nans_ok: bool,
    /// Target column.
    #[serde(default = "default_target")]
    pub target: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            columns: DEFAULT_FEATURES.iter().map(|s| s.to_string()).collect(),
            month: true,
            year: true,
            nans_ok: false,
            target: default_target(),
        }
    }
}

impl FeatureConfig {
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn month(mut self, enabled: bool) -> Self {
        self.month = enabled;
        self
    }

    pub fn year(mut self, enabled: bool) -> Self {
        self.year = enabled;
        self
    }

    pub fn nans_ok(mut self, tolerated: bool) -> Self {
        self.nans_ok = tolerated;
        self
    }
}

/// Discrete hyperparameter grid sampled by the randomized search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace(BTreeMap<String, Vec<ParamValue>>);

impl Default for SearchSpace {
    fn default() -> Self {
        Self::random_forest()
    }
}

impl SearchSpace {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Forest grid: 100 tree counts in [100, 2000], depths 10..=110 step 10
    /// plus unlimited, fixed split/leaf minimums and 2 or 3 features per split.
    pub fn random_forest() -> Self {
        let n_estimators: Vec<ParamValue> = (0..100)
            .map(|i| {
                if i == 99 {
                    ParamValue::Int(2000)
                } else {
                    ParamValue::Int((100.0 + i as f64 * 1900.0 / 99.0) as i64)
                }
            })
            .collect();

        let mut max_depth: Vec<ParamValue> =
            (0..11).map(|i| ParamValue::Int(10 + i * 10)).collect();
        max_depth.push(ParamValue::None);

        Self::new()
            .with("n_estimators", n_estimators)
            .with("max_depth", max_depth)
            .with("min_samples_split", vec![ParamValue::Int(200)])
            .with("min_samples_leaf", vec![ParamValue::Int(100)])
            .with("max_features", vec![ParamValue::Int(2), ParamValue::Int(3)])
    }

    /// Add or replace the candidate values of one parameter.
    pub fn with(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.to_string(), values);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct grid points.
    pub fn combinations(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(Vec::len).product()
    }

    /// Grid point at `index` (mixed-radix over the parameters in name order,
    /// last parameter varying fastest).
    pub fn candidate(&self, index: usize) -> Hyperparameters {
        let mut remaining = index;
        let mut picked: Vec<(&String, &ParamValue)> = Vec::with_capacity(self.0.len());
        for (name, values) in self.0.iter().rev() {
            let radix = values.len().max(1);
            picked.push((name, &values[remaining % radix]));
            remaining /= radix;
        }

        let mut params = Hyperparameters::new();
        for (name, value) in picked {
            params.insert(name, value.clone());
        }
        params
    }

    fn validate(&self) -> Result<()> {
        if let Some((name, _)) = self.0.iter().find(|(_, v)| v.is_empty()) {
            return Err(CounterfactualError::InvalidConfig(format!(
                "search space parameter '{}' has no candidate values",
                name
            )));
        }
        Ok(())
    }
}

/// Randomized hyperparameter search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Fraction of rows sampled before searching. Each ~1 km grid cell holds
    /// ~200 pixels, so 0.5% still covers many independent cells.
    pub sample_fraction: f64,
    /// Number of sampled grid points.
    pub n_iter: usize,
    /// K-fold splits used to score each candidate.
    pub cv_folds: usize,
    /// Seed for subsampling and candidate sampling.
    pub seed: u64,
    pub space: SearchSpace,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            sample_fraction: 0.005,
            n_iter: 100,
            cv_folds: 3,
            seed: 42,
            space: SearchSpace::default(),
        }
    }
}

impl TuningConfig {
    pub fn sample_fraction(mut self, fraction: f64) -> Self {
        self.sample_fraction = fraction;
        self
    }

    pub fn n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter.max(1);
        self
    }

    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds.max(2);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn space(mut self, space: SearchSpace) -> Self {
        self.space = space;
        self
    }
}

/// How the per-distance cross-validation passes are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossvalLayout {
    /// Rows repeated once per distance with `fold_size`, `cv_fold` and `ET_pred`.
    #[default]
    Long,
    /// One row per observation with an `ET_pred_<distance>` column per distance.
    Wide,
}

/// Spatial cross-validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossvalConfig {
    /// Bin sizes in meters.
    pub distances: Vec<f64>,
    /// Grouped folds per distance.
    pub n_splits: usize,
    pub layout: CrossvalLayout,
}

impl Default for CrossvalConfig {
    fn default() -> Self {
        Self {
            distances: DEFAULT_DISTANCES.to_vec(),
            n_splits: 5,
            layout: CrossvalLayout::Long,
        }
    }
}

impl CrossvalConfig {
    pub fn distances(mut self, distances: &[f64]) -> Self {
        self.distances = distances.to_vec();
        self
    }

    pub fn n_splits(mut self, n_splits: usize) -> Self {
        self.n_splits = n_splits;
        self
    }

    pub fn layout(mut self, layout: CrossvalLayout) -> Self {
        self.layout = layout;
        self
    }
}

/// Where input datasets live and where experiments are written, relative to
/// an explicit project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayout {
    pub root: PathBuf,
    /// Holds `train/<dataset>.csv` and `test/<dataset>.csv`.
    pub training_dir: PathBuf,
    /// Holds `<application>.csv` (agriculture, fallow subsets).
    pub application_dir: PathBuf,
    /// Parent of every experiment directory.
    pub experiments_dir: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            training_dir: PathBuf::from("data/3_for_counterfactual/training_data"),
            application_dir: PathBuf::from("data/3_for_counterfactual/agriculture"),
            experiments_dir: PathBuf::from("data/4_for_analysis/ML_outputs/experiments"),
        }
    }
}

impl DataLayout {
    /// Default layout under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn training_csv(&self, split: Split, dataset: &str) -> PathBuf {
        self.root
            .join(&self.training_dir)
            .join(split.as_str())
            .join(format!("{}.csv", dataset))
    }

    pub fn application_csv(&self, name: &str) -> PathBuf {
        self.root
            .join(&self.application_dir)
            .join(format!("{}.csv", name))
    }

    pub fn experiment_dir(&self, name: &str) -> PathBuf {
        self.root.join(&self.experiments_dir).join(name)
    }
}

/// Which estimator an experiment is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorConfig {
    /// Bagged regression trees; `params` override the estimator defaults.
    RandomForest {
        #[serde(default)]
        params: Hyperparameters,
    },
    /// Training-mean baseline.
    Mean,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::RandomForest {
            params: Hyperparameters::new()
                .with("n_estimators", 100usize)
                .with("random_state", 0usize),
        }
    }
}

/// Complete description of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Experiment directory name.
    pub name: String,
    /// Training dataset name (`<dataset>.csv` under the train/test dirs).
    pub dataset: String,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub tuning: TuningConfig,
    #[serde(default)]
    pub crossval: CrossvalConfig,
    #[serde(default)]
    pub layout: DataLayout,
    /// Files copied into the experiment directory on creation.
    #[serde(default)]
    pub provenance: Vec<PathBuf>,
}

impl ExperimentConfig {
    /// Configuration with defaults for everything but the names.
    pub fn new(name: &str, dataset: &str) -> Self {
        Self {
            name: name.to_string(),
            dataset: dataset.to_string(),
            features: FeatureConfig::default(),
            estimator: EstimatorConfig::default(),
            tuning: TuningConfig::default(),
            crossval: CrossvalConfig::default(),
            layout: DataLayout::default(),
            provenance: Vec::new(),
        }
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CounterfactualError::SerializationError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON.
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| CounterfactualError::SerializationError(e.to_string()))
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.layout.experiment_dir(&self.name)
    }

    /// Reject configurations that would fail later in the pipeline.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CounterfactualError::InvalidConfig(msg));

        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) || self.name == ".." {
            return invalid(format!("experiment name '{}' is not a directory name", self.name));
        }
        if self.dataset.trim().is_empty() {
            return invalid("dataset name must not be empty".into());
        }
        if self.features.columns.is_empty() && !self.features.month && !self.features.year {
            return invalid("at least one feature column is required".into());
        }
        if !(self.tuning.sample_fraction > 0.0 && self.tuning.sample_fraction <= 1.0) {
            return invalid(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.tuning.sample_fraction
            ));
        }
        if self.tuning.n_iter == 0 {
            return invalid("n_iter must be >= 1".into());
        }
        if self.tuning.cv_folds < 2 {
            return invalid("tuning cv_folds must be >= 2".into());
        }
        self.tuning.space.validate()?;
        if self.crossval.n_splits < 2 {
            return invalid("crossval n_splits must be >= 2".into());
        }
        if self.crossval.distances.is_empty() {
            return invalid("at least one crossval distance is required".into());
        }
        if let Some(d) = self
            .crossval
            .distances
            .iter()
            .find(|d| !(d.is_finite() && **d > 0.0))
        {
            return invalid(format!("crossval distance must be positive, got {}", d));
        }
        Ok(())
    }
}
