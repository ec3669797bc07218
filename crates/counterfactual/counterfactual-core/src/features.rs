//! Feature preparation: missing-value substitution, predictor selection and
//! one-hot expansion of the month/year columns.
//!
//! The indicator vocabulary is captured in a [`FeatureEncoder`]. A model
//! carries the encoder it was trained with, so application datasets are
//! encoded against the training vocabulary instead of their own.

use std::collections::BTreeSet;

use counterfactual_api::FeatureConfig;
use counterfactual_spi::{
    is_missing_cell, CounterfactualError, Dataset, FeatureMatrix, Result, MISSING_SENTINEL,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::table::format_value;

pub const MONTH_COLUMN: &str = "month";
pub const YEAR_COLUMN: &str = "year";

/// Fitted feature vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    columns: Vec<String>,
    month_levels: Option<Vec<String>>,
    year_levels: Option<Vec<String>>,
    nans_ok: bool,
    target: String,
}

/// Output of feature preparation.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    /// Predictor matrix: numeric columns, then month and year indicators.
    pub x: FeatureMatrix,
    /// Target values (`NaN` where missing).
    pub y: Vec<f64>,
    /// Source table after substitution, with indicator columns appended.
    pub data: Dataset,
    /// Vocabulary used to build `x`.
    pub encoder: FeatureEncoder,
    /// Non-missing category cells absent from the vocabulary.
    pub unknown_levels: usize,
}

impl PreparedDataset {
    /// Number of rows whose target is missing.
    pub fn missing_targets(&self) -> usize {
        self.y.iter().filter(|v| v.is_nan()).count()
    }

    /// Fail if any row lacks a target value.
    pub fn require_target(&self) -> Result<()> {
        match self.missing_targets() {
            0 => Ok(()),
            rows => Err(CounterfactualError::MissingTarget {
                column: self.encoder.target.clone(),
                rows,
            }),
        }
    }
}

impl FeatureEncoder {
    /// Learn indicator levels from `dataset`.
    pub fn fit(config: &FeatureConfig, dataset: &Dataset) -> Result<Self> {
        let month_levels = if config.month {
            Some(levels(dataset, MONTH_COLUMN)?)
        } else {
            None
        };
        let year_levels = if config.year {
            Some(levels(dataset, YEAR_COLUMN)?)
        } else {
            None
        };

        Ok(Self {
            columns: config.columns.clone(),
            month_levels,
            year_levels,
            nans_ok: config.nans_ok,
            target: config.target.clone(),
        })
    }

    /// Numeric predictor columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn month_levels(&self) -> Option<&[String]> {
        self.month_levels.as_deref()
    }

    pub fn year_levels(&self) -> Option<&[String]> {
        self.year_levels.as_deref()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn nans_ok(&self) -> bool {
        self.nans_ok
    }

    /// Matrix column names, in order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.columns.clone();
        for (prefix, levels) in self.indicator_groups() {
            names.extend(levels.iter().map(|l| indicator_name(prefix, l)));
        }
        names
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
            + self.month_levels.as_ref().map_or(0, Vec::len)
            + self.year_levels.as_ref().map_or(0, Vec::len)
    }

    fn indicator_groups(&self) -> Vec<(&'static str, &[String])> {
        let mut groups = Vec::new();
        if let Some(levels) = &self.month_levels {
            groups.push((MONTH_COLUMN, levels.as_slice()));
        }
        if let Some(levels) = &self.year_levels {
            groups.push((YEAR_COLUMN, levels.as_slice()));
        }
        groups
    }

    /// Columns that receive the missing-value sentinel.
    fn predictor_columns(&self) -> Vec<String> {
        let mut cols = self.columns.clone();
        for (prefix, _) in self.indicator_groups() {
            cols.push(prefix.to_string());
        }
        cols
    }

    /// Encode `dataset` with this vocabulary.
    pub fn transform(&self, dataset: &Dataset) -> Result<PreparedDataset> {
        let mut data = dataset.clone();
        if !self.nans_ok {
            data.fill_missing(&self.predictor_columns(), &format_value(MISSING_SENTINEL))?;
        }

        let mut names = Vec::with_capacity(self.n_features());
        let mut columns = Vec::with_capacity(self.n_features());

        for name in &self.columns {
            let mut values = data.numeric_column(name)?;
            if !self.nans_ok {
                for v in values.iter_mut().filter(|v| v.is_nan()) {
                    *v = MISSING_SENTINEL;
                }
            }
            names.push(name.clone());
            columns.push(values);
        }

        let mut unknown_levels = 0;
        let mut indicator_cells: Vec<(String, Vec<String>)> = Vec::new();
        for (prefix, levels) in self.indicator_groups() {
            let cells: Vec<String> = data
                .categorical_column(prefix)?
                .iter()
                .map(|c| normalize_level(c))
                .collect();
            unknown_levels += cells
                .iter()
                .filter(|c| !is_missing_cell(c) && !levels.contains(c))
                .count();

            for level in levels {
                let values: Vec<f64> = cells
                    .iter()
                    .map(|c| if c == level { 1.0 } else { 0.0 })
                    .collect();
                let name = indicator_name(prefix, level);
                indicator_cells.push((
                    name.clone(),
                    values.iter().map(|&v| format_value(v)).collect(),
                ));
                names.push(name);
                columns.push(values);
            }
        }

        if unknown_levels > 0 {
            warn!(
                unknown_levels,
                "category levels not seen during fitting encode as all-zero indicators"
            );
        }

        let y = data.numeric_column(&self.target)?;
        for (name, cells) in indicator_cells {
            data.set_column(&name, cells)?;
        }

        let x = FeatureMatrix::from_columns(names, columns, data.len())?;
        Ok(PreparedDataset {
            x,
            y,
            data,
            encoder: self.clone(),
            unknown_levels,
        })
    }
}

/// Fit a vocabulary on `dataset` and encode it.
///
/// The indicator columns are exactly the month/year levels present in this
/// dataset.
pub fn prepare_dataset(config: &FeatureConfig, dataset: &Dataset) -> Result<PreparedDataset> {
    let mut filled = dataset.clone();
    if !config.nans_ok {
        let mut cols = config.columns.clone();
        if config.month {
            cols.push(MONTH_COLUMN.to_string());
        }
        if config.year {
            cols.push(YEAR_COLUMN.to_string());
        }
        filled.fill_missing(&cols, &format_value(MISSING_SENTINEL))?;
    }

    let encoder = FeatureEncoder::fit(config, &filled)?;
    encoder.transform(&filled)
}

/// Encode `dataset` against an existing vocabulary.
pub fn prepare_with(encoder: &FeatureEncoder, dataset: &Dataset) -> Result<PreparedDataset> {
    encoder.transform(dataset)
}

fn indicator_name(prefix: &str, level: &str) -> String {
    format!("{}_{}", prefix, level)
}

/// Canonical spelling of a category cell: numbers print in shortest form, so
/// `6`, `6.0` and `06` are the same level.
fn normalize_level(cell: &str) -> String {
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => format_value(v),
        _ => cell.to_string(),
    }
}

/// Distinct non-missing levels, numerically sorted when every level is a number.
fn levels(dataset: &Dataset, column: &str) -> Result<Vec<String>> {
    let distinct: BTreeSet<String> = dataset
        .categorical_column(column)?
        .iter()
        .filter(|c| !is_missing_cell(c))
        .map(|c| normalize_level(c))
        .collect();

    let mut levels: Vec<String> = distinct.into_iter().collect();
    let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.parse::<f64>().ok()).collect();
    if let Some(keys) = numeric {
        let mut paired: Vec<(f64, String)> = keys.into_iter().zip(levels).collect();
        paired.sort_by(|a, b| a.0.total_cmp(&b.0));
        levels = paired.into_iter().map(|(_, l)| l).collect();
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::from_records(
            vec![
                "x".into(),
                "y".into(),
                "Elevation".into(),
                "ET".into(),
                "month".into(),
                "year".into(),
            ],
            vec![
                vec!["-120.0".into(), "38.0".into(), "100".into(), "2.0".into(), "10".into(), "2018".into()],
                vec!["-120.1".into(), "38.1".into(), "".into(), "3.0".into(), "9".into(), "2019".into()],
                vec!["-120.2".into(), "38.2".into(), "120".into(), "4.0".into(), "10".into(), "2019".into()],
            ],
        )
        .unwrap()
    }

    fn config() -> FeatureConfig {
        FeatureConfig::default().with_columns(&["x", "y", "Elevation"])
    }

    #[test]
    fn test_prepare_shapes() {
        let prepared = prepare_dataset(&config(), &dataset()).unwrap();

        assert_eq!(prepared.x.n_rows(), 3);
        assert_eq!(prepared.y.len(), 3);
        // 3 numeric + 2 months + 2 years
        assert_eq!(prepared.x.n_cols(), 7);
        assert_eq!(
            prepared.x.columns(),
            &["x", "y", "Elevation", "month_9", "month_10", "year_2018", "year_2019"]
        );
        assert_eq!(prepared.y, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sentinel_substitution() {
        let prepared = prepare_dataset(&config(), &dataset()).unwrap();
        assert_eq!(prepared.x.get(1, 2), MISSING_SENTINEL);
        assert_eq!(prepared.data.column("Elevation").unwrap()[1], "-9999");
    }

    #[test]
    fn test_nans_ok_passes_missing_through() {
        let prepared = prepare_dataset(&config().nans_ok(true), &dataset()).unwrap();
        assert!(prepared.x.get(1, 2).is_nan());
        assert_eq!(prepared.data.column("Elevation").unwrap()[1], "");
    }

    #[test]
    fn test_one_hot_values() {
        let prepared = prepare_dataset(&config(), &dataset()).unwrap();
        // row 0: month 10, year 2018
        assert_eq!(&prepared.x.row(0)[3..], &[0.0, 1.0, 1.0, 0.0]);
        // row 1: month 9, year 2019
        assert_eq!(&prepared.x.row(1)[3..], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(prepared.data.column("month_9").unwrap(), vec!["0", "1", "0"]);
    }

    #[test]
    fn test_categorical_expansion_disabled() {
        let prepared =
            prepare_dataset(&config().month(false).year(false), &dataset()).unwrap();
        assert_eq!(prepared.x.n_cols(), 3);
        assert!(prepared.encoder.month_levels().is_none());
    }

    #[test]
    fn test_vocabulary_follows_current_dataset() {
        let only_2019 = dataset().select_rows(&[1, 2]);
        let prepared = prepare_dataset(&config(), &only_2019).unwrap();
        assert_eq!(prepared.encoder.year_levels().unwrap(), &["2019"]);
        assert_eq!(prepared.x.n_cols(), 3 + 2 + 1);
    }

    #[test]
    fn test_prepare_with_reuses_training_vocabulary() {
        let trained = prepare_dataset(&config(), &dataset()).unwrap();
        let application = dataset().select_rows(&[1]);

        let applied = prepare_with(&trained.encoder, &application).unwrap();
        assert_eq!(applied.x.columns(), trained.x.columns());
        assert_eq!(applied.unknown_levels, 0);
    }

    #[test]
    fn test_unknown_level_encodes_as_zeros() {
        let trained = prepare_dataset(&config(), &dataset()).unwrap();
        let mut application = dataset().select_rows(&[0]);
        application.set_column("year", vec!["2021".into()]).unwrap();

        let applied = prepare_with(&trained.encoder, &application).unwrap();
        assert_eq!(applied.unknown_levels, 1);
        assert_eq!(&applied.x.row(0)[5..], &[0.0, 0.0]);
    }

    #[test]
    fn test_numeric_levels_match_across_spellings() {
        let mut trained_on = dataset();
        trained_on
            .set_column("month", vec!["10.0".into(), "9.0".into(), "10.0".into()])
            .unwrap();
        let trained = prepare_dataset(&config(), &trained_on).unwrap();
        assert_eq!(trained.encoder.month_levels().unwrap(), &["9", "10"]);

        let applied = prepare_with(&trained.encoder, &dataset()).unwrap();
        assert_eq!(applied.unknown_levels, 0);
        assert_eq!(applied.x.columns(), trained.x.columns());
        assert_eq!(&applied.x.row(0)[3..5], &[0.0, 1.0]);
        assert_eq!(&applied.x.row(1)[3..5], &[1.0, 0.0]);
    }

    #[test]
    fn test_mixed_spellings_share_one_indicator() {
        let mut ds = dataset();
        ds.set_column("month", vec!["6".into(), "6.0".into(), "7".into()])
            .unwrap();
        let prepared = prepare_dataset(&config().year(false), &ds).unwrap();

        assert_eq!(
            prepared.x.columns(),
            &["x", "y", "Elevation", "month_6", "month_7"]
        );
        assert_eq!(prepared.x.column_values(3), vec![1.0, 1.0, 0.0]);
        assert_eq!(prepared.data.column("month_6").unwrap(), vec!["1", "1", "0"]);
    }

    #[test]
    fn test_indicator_only_features_keep_row_count() {
        let mut ds = dataset();
        ds.set_column("month", vec!["".into(), "".into(), "".into()])
            .unwrap();
        let cfg = FeatureConfig::default()
            .with_columns(&[])
            .year(false)
            .nans_ok(true);

        let prepared = prepare_dataset(&cfg, &ds).unwrap();
        assert_eq!(prepared.x.n_cols(), 0);
        assert_eq!(prepared.x.n_rows(), prepared.y.len());
        assert_eq!(prepared.x.n_rows(), 3);
    }

    #[test]
    fn test_missing_target_detected() {
        let mut ds = dataset();
        ds.set_column("ET", vec!["1".into(), "".into(), "NA".into()]).unwrap();
        let prepared = prepare_dataset(&config(), &ds).unwrap();
        assert_eq!(prepared.missing_targets(), 2);
        assert!(matches!(
            prepared.require_target(),
            Err(CounterfactualError::MissingTarget { rows: 2, .. })
        ));
    }

    #[test]
    fn test_missing_feature_column() {
        let cfg = FeatureConfig::default().with_columns(&["TWI"]);
        assert!(matches!(
            prepare_dataset(&cfg, &dataset()),
            Err(CounterfactualError::MissingColumn(c)) if c == "TWI"
        ));
    }
}
