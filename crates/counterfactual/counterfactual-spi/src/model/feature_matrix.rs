//! Dense predictor matrix.

use crate::error::CounterfactualError;
use crate::Result;

/// Row-major matrix of predictor values with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build a matrix of `n_rows` observations from column vectors.
    ///
    /// The row count is explicit so a matrix without columns still keeps the
    /// observation count of the table it came from.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>, n_rows: usize) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(CounterfactualError::ShapeMismatch {
                expected: names.len(),
                actual: columns.len(),
            });
        }

        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(CounterfactualError::ShapeMismatch {
                expected: n_rows,
                actual: bad.len(),
            });
        }

        let n_cols = columns.len();
        let mut data = vec![0.0; n_rows * n_cols];
        for (j, column) in columns.iter().enumerate() {
            for (i, &value) in column.iter().enumerate() {
                data[i * n_cols + j] = value;
            }
        }

        Ok(Self {
            columns: names,
            data,
            n_rows,
        })
    }

    /// Build a matrix from rows of equal width.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let n_cols = names.len();
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(CounterfactualError::ShapeMismatch {
                    expected: n_cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            columns: names,
            data,
            n_rows: rows.len(),
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column names, in matrix order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// One observation.
    pub fn row(&self, i: usize) -> &[f64] {
        let n_cols = self.n_cols();
        &self.data[i * n_cols..(i + 1) * n_cols]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols() + col]
    }

    /// Values of one column.
    pub fn column_values(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows).map(|i| self.get(i, col)).collect()
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols());
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            columns: self.columns.clone(),
            data,
            n_rows: indices.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_columns_is_row_major() {
        let m = FeatureMatrix::from_columns(
            names(&["a", "b"]),
            vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]],
            3,
        )
        .unwrap();

        assert_eq!(m.n_rows(), 3);
        assert_eq!(m.n_cols(), 2);
        assert_eq!(m.row(1), &[2.0, 20.0]);
        assert_eq!(m.column_values(1), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_from_columns_ragged() {
        let result = FeatureMatrix::from_columns(
            names(&["a", "b"]),
            vec![vec![1.0, 2.0], vec![1.0]],
            2,
        );
        assert!(matches!(
            result,
            Err(CounterfactualError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_from_rows_width_checked() {
        let result = FeatureMatrix::from_rows(names(&["a", "b"]), &[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            result,
            Err(CounterfactualError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_select_rows() {
        let m = FeatureMatrix::from_rows(
            names(&["a"]),
            &[vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();
        let s = m.select_rows(&[2, 0]);
        assert_eq!(s.n_rows(), 2);
        assert_eq!(s.row(0), &[3.0]);
        assert_eq!(s.row(1), &[1.0]);
    }

    #[test]
    fn test_empty_matrix() {
        let m = FeatureMatrix::from_columns(names(&["a"]), vec![vec![]], 0).unwrap();
        assert_eq!(m.n_rows(), 0);
        assert_eq!(m.rows().count(), 0);
    }

    #[test]
    fn test_no_columns_keeps_row_count() {
        let m = FeatureMatrix::from_columns(vec![], vec![], 4).unwrap();
        assert_eq!(m.n_rows(), 4);
        assert_eq!(m.n_cols(), 0);
        assert_eq!(m.rows().count(), 4);
        assert!(m.row(3).is_empty());
    }
}
