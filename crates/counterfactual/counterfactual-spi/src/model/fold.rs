//! Cross-validation partition.

/// Row indices on each side of one cross-validation fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Rows the estimator is fitted on.
    pub train: Vec<usize>,
    /// Held-out rows that receive out-of-fold predictions.
    pub test: Vec<usize>,
}

impl Fold {
    pub fn new(train: Vec<usize>, test: Vec<usize>) -> Self {
        Self { train, test }
    }
}
