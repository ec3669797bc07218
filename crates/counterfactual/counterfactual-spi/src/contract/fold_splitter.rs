//! Cross-validation splitter trait.

use crate::model::Fold;
use crate::Result;

/// Partitions row indices into train/held-out folds.
pub trait FoldSplitter: Send + Sync {
    /// Generate folds over `n_rows` rows.
    ///
    /// `groups`, when given, holds one label per row; rows sharing a label
    /// must land on the same side of every fold.
    fn split(&self, n_rows: usize, groups: Option<&[String]>) -> Result<Vec<Fold>>;

    /// Requested number of folds.
    fn n_splits(&self) -> usize;
}
