//! Experiment configuration builder.

use std::path::PathBuf;

use counterfactual_spi::Result;

use crate::config::{
    CrossvalConfig, DataLayout, EstimatorConfig, ExperimentConfig, FeatureConfig, TuningConfig,
};

/// Builder for [`ExperimentConfig`].
///
/// # Example
///
/// ```rust,ignore
/// use counterfactual_api::{ExperimentBuilder, EstimatorConfig};
///
/// let config = ExperimentBuilder::new("trial_model", "fallow")
///     .data_root("/srv/et-project")
///     .month(true)
///     .year(true)
///     .estimator(EstimatorConfig::default())
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ExperimentBuilder {
    config: ExperimentConfig,
}

impl ExperimentBuilder {
    pub fn new(name: &str, dataset: &str) -> Self {
        Self {
            config: ExperimentConfig::new(name, dataset),
        }
    }

    /// Numeric predictor columns.
    pub fn features(mut self, columns: &[&str]) -> Self {
        self.config.features = self.config.features.with_columns(columns);
        self
    }

    pub fn feature_config(mut self, features: FeatureConfig) -> Self {
        self.config.features = features;
        self
    }

    pub fn month(mut self, enabled: bool) -> Self {
        self.config.features.month = enabled;
        self
    }

    pub fn year(mut self, enabled: bool) -> Self {
        self.config.features.year = enabled;
        self
    }

    pub fn nans_ok(mut self, tolerated: bool) -> Self {
        self.config.features.nans_ok = tolerated;
        self
    }

    pub fn estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.config.estimator = estimator;
        self
    }

    pub fn tuning(mut self, tuning: TuningConfig) -> Self {
        self.config.tuning = tuning;
        self
    }

    pub fn crossval(mut self, crossval: CrossvalConfig) -> Self {
        self.config.crossval = crossval;
        self
    }

    /// Project root; the default directory layout is resolved under it.
    pub fn data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.layout.root = root.into();
        self
    }

    pub fn layout(mut self, layout: DataLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// File to copy into the experiment directory on creation.
    pub fn provenance(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.provenance.push(path.into());
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ExperimentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrossvalLayout;

    #[test]
    fn test_builder_defaults() {
        let config = ExperimentBuilder::new("trial", "fallow").build().unwrap();
        assert_eq!(config.name, "trial");
        assert_eq!(config.dataset, "fallow");
        assert!(!config.features.nans_ok);
        assert!(config.provenance.is_empty());
    }

    #[test]
    fn test_builder_custom() {
        let config = ExperimentBuilder::new("trial", "natural")
            .features(&["Elevation", "PET"])
            .month(false)
            .year(true)
            .nans_ok(true)
            .estimator(EstimatorConfig::Mean)
            .crossval(
                CrossvalConfig::default()
                    .distances(&[10_000.0, 1_000.0])
                    .layout(CrossvalLayout::Wide),
            )
            .data_root("/data")
            .provenance("run.json")
            .build()
            .unwrap();

        assert_eq!(config.features.columns, vec!["Elevation", "PET"]);
        assert!(!config.features.month);
        assert!(config.features.nans_ok);
        assert_eq!(config.crossval.distances, vec![10_000.0, 1_000.0]);
        assert_eq!(config.layout.root, PathBuf::from("/data"));
        assert_eq!(config.provenance, vec![PathBuf::from("run.json")]);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let result = ExperimentBuilder::new("", "fallow").build();
        assert!(result.is_err());

        let result = ExperimentBuilder::new("trial", "fallow")
            .crossval(CrossvalConfig::default().n_splits(1))
            .build();
        assert!(result.is_err());
    }
}
