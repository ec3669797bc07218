//! Counterfactual workflow error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while preparing data, fitting estimators or writing
/// experiment outputs.
///
/// Configuration errors, data errors and estimator errors all end up here.
/// None of them are recovered; callers are expected to fix the input and
/// re-run.
#[derive(Error, Debug)]
pub enum CounterfactualError {
    /// The experiment directory already exists.
    #[error("Path already exists: {}", .0.display())]
    PathExists(PathBuf),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Split selector other than `train` or `test`.
    #[error("Invalid split '{0}': must be 'train' or 'test'")]
    InvalidSplit(String),

    /// Hyperparameter name not understood by the estimator.
    #[error("Estimator '{estimator}' does not support hyperparameter '{name}'")]
    UnsupportedHyperparameter { estimator: String, name: String },

    /// A required column is absent from the dataset.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A cell could not be parsed as a number.
    #[error("Cannot parse '{value}' in column '{column}' (row {row})")]
    ParseError {
        column: String,
        row: usize,
        value: String,
    },

    /// Rows used for fitting carry no target value.
    #[error("Target column '{column}' is missing in {rows} row(s)")]
    MissingTarget { column: String, rows: usize },

    /// Not enough rows or groups for the operation.
    #[error("Insufficient data: need at least {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Feature matrix does not have the shape the estimator expects.
    #[error("Shape mismatch: expected {expected} feature columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Estimator fitting failed.
    #[error("Model fitting failed: {0}")]
    FitError(String),

    /// Estimator prediction failed.
    #[error("Prediction failed: {0}")]
    PredictionError(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    CsvError(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_exists_error() {
        let error = CounterfactualError::PathExists(PathBuf::from("/tmp/exp/trial"));
        assert_eq!(error.to_string(), "Path already exists: /tmp/exp/trial");
    }

    #[test]
    fn test_invalid_split_error() {
        let error = CounterfactualError::InvalidSplit("validation".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid split 'validation': must be 'train' or 'test'"
        );
    }

    #[test]
    fn test_unsupported_hyperparameter_error() {
        let error = CounterfactualError::UnsupportedHyperparameter {
            estimator: "mean".to_string(),
            name: "n_estimators".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Estimator 'mean' does not support hyperparameter 'n_estimators'"
        );
    }

    #[test]
    fn test_parse_error() {
        let error = CounterfactualError::ParseError {
            column: "Slope".to_string(),
            row: 7,
            value: "steep".to_string(),
        };
        assert_eq!(error.to_string(), "Cannot parse 'steep' in column 'Slope' (row 7)");
    }

    #[test]
    fn test_missing_target_error() {
        let error = CounterfactualError::MissingTarget {
            column: "ET".to_string(),
            rows: 3,
        };
        assert!(error.to_string().contains("ET"));
        assert!(error.to_string().contains("3 row(s)"));
    }

    #[test]
    fn test_shape_mismatch_error() {
        let error = CounterfactualError::ShapeMismatch {
            expected: 12,
            actual: 10,
        };
        assert_eq!(
            error.to_string(),
            "Shape mismatch: expected 12 feature columns, got 10"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error: CounterfactualError = io.into();
        assert!(matches!(error, CounterfactualError::Io(_)));
        assert!(error.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>() {}
        assert_std_error::<CounterfactualError>();
    }
}
