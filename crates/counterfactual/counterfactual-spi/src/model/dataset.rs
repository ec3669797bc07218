//! Tabular dataset of spatial-temporal pixel samples.

use crate::error::CounterfactualError;
use crate::Result;

/// Observed evapotranspiration column.
pub const ET_COLUMN: &str = "ET";
/// Longitude column.
pub const X_COLUMN: &str = "x";
/// Latitude column.
pub const Y_COLUMN: &str = "y";
/// Value substituted for missing predictor cells when missing values are not tolerated.
pub const MISSING_SENTINEL: f64 = -9999.0;

/// Whether a raw cell denotes a missing value.
pub fn is_missing_cell(cell: &str) -> bool {
    matches!(
        cell.trim(),
        "" | "NA" | "N/A" | "NaN" | "nan" | "NAN" | "null" | "None"
    )
}

/// A table of observations, one row per pixel sample.
///
/// Cells are kept as the strings read from disk so that columns the workflow
/// never touches are written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Dataset {
    /// Create an empty dataset with the given header row.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            records: Vec::new(),
        }
    }

    /// Create a dataset from a header row and records.
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        let mut dataset = Self::new(headers);
        for record in records {
            dataset.push_record(record)?;
        }
        Ok(dataset)
    }

    /// Append a record; its width must match the header row.
    pub fn push_record(&mut self, record: Vec<String>) -> Result<()> {
        if record.len() != self.headers.len() {
            return Err(CounterfactualError::CsvError(format!(
                "record {} has {} fields, expected {}",
                self.records.len(),
                record.len(),
                self.headers.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Position of a column in the header row.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| CounterfactualError::MissingColumn(name.to_string()))
    }

    /// Raw cells of a column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self.records.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Parse a column as numbers. Missing cells become `NaN`.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column_index(name)?;
        self.records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let cell = record[idx].trim();
                if is_missing_cell(cell) {
                    return Ok(f64::NAN);
                }
                cell.parse::<f64>()
                    .map_err(|_| CounterfactualError::ParseError {
                        column: name.to_string(),
                        row,
                        value: cell.to_string(),
                    })
            })
            .collect()
    }

    /// Read a column as category labels (trimmed cells).
    pub fn categorical_column(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.column_index(name)?;
        Ok(self
            .records
            .iter()
            .map(|r| r[idx].trim().to_string())
            .collect())
    }

    /// Append a column, or replace it if a column with that name exists.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.records.len() {
            return Err(CounterfactualError::ShapeMismatch {
                expected: self.records.len(),
                actual: values.len(),
            });
        }

        match self.headers.iter().position(|h| h == name) {
            Some(idx) => {
                for (record, value) in self.records.iter_mut().zip(values) {
                    record[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (record, value) in self.records.iter_mut().zip(values) {
                    record.push(value);
                }
            }
        }
        Ok(())
    }

    /// Builder-style [`Dataset::set_column`].
    pub fn with_column(mut self, name: &str, values: Vec<String>) -> Result<Self> {
        self.set_column(name, values)?;
        Ok(self)
    }

    /// Replace missing cells in the named columns with `value`.
    ///
    /// Returns the number of cells filled.
    pub fn fill_missing(&mut self, columns: &[String], value: &str) -> Result<usize> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Result<Vec<_>>>()?;

        let mut filled = 0;
        for record in &mut self.records {
            for &idx in &indices {
                if is_missing_cell(&record[idx]) {
                    record[idx] = value.to_string();
                    filled += 1;
                }
            }
        }
        Ok(filled)
    }

    /// New dataset holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            headers: self.headers.clone(),
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
        }
    }

    /// Concatenate the rows of `other` below this dataset.
    ///
    /// Both datasets must have identical header rows.
    pub fn append(&mut self, other: Dataset) -> Result<()> {
        if self.headers.is_empty() && self.records.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.headers != other.headers {
            return Err(CounterfactualError::CsvError(format!(
                "cannot concatenate tables with different columns: {:?} vs {:?}",
                self.headers, other.headers
            )));
        }
        self.records.extend(other.records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_records(
            vec!["x".into(), "y".into(), "ET".into(), "Soil".into()],
            vec![
                vec!["-120.5".into(), "38.1".into(), "2.5".into(), "3".into()],
                vec!["-120.4".into(), "38.2".into(), "".into(), "NA".into()],
                vec!["-120.3".into(), "38.3".into(), "1.0".into(), "4".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_numeric_column_missing_is_nan() {
        let ds = sample();
        let et = ds.numeric_column("ET").unwrap();
        assert_eq!(et.len(), 3);
        assert_eq!(et[0], 2.5);
        assert!(et[1].is_nan());
    }

    #[test]
    fn test_numeric_column_parse_error() {
        let ds = Dataset::from_records(vec!["Slope".into()], vec![vec!["steep".into()]]).unwrap();
        let err = ds.numeric_column("Slope").unwrap_err();
        assert!(matches!(err, CounterfactualError::ParseError { row: 0, .. }));
    }

    #[test]
    fn test_missing_column() {
        let ds = sample();
        assert!(matches!(
            ds.numeric_column("TWI"),
            Err(CounterfactualError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_record_width_checked() {
        let mut ds = Dataset::new(vec!["a".into(), "b".into()]);
        assert!(ds.push_record(vec!["1".into()]).is_err());
    }

    #[test]
    fn test_set_column_appends_and_replaces() {
        let mut ds = sample();
        ds.set_column("ET_pred", vec!["1".into(), "2".into(), "3".into()])
            .unwrap();
        assert_eq!(ds.n_columns(), 5);
        ds.set_column("ET_pred", vec!["4".into(), "5".into(), "6".into()])
            .unwrap();
        assert_eq!(ds.n_columns(), 5);
        assert_eq!(ds.column("ET_pred").unwrap(), vec!["4", "5", "6"]);
    }

    #[test]
    fn test_set_column_length_checked() {
        let mut ds = sample();
        assert!(matches!(
            ds.set_column("bad", vec!["1".into()]),
            Err(CounterfactualError::ShapeMismatch { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_fill_missing() {
        let mut ds = sample();
        let filled = ds.fill_missing(&["Soil".to_string()], "-9999").unwrap();
        assert_eq!(filled, 1);
        assert_eq!(ds.column("Soil").unwrap(), vec!["3", "-9999", "4"]);
        // ET untouched
        assert!(ds.numeric_column("ET").unwrap()[1].is_nan());
    }

    #[test]
    fn test_select_rows_and_append() {
        let ds = sample();
        let mut picked = ds.select_rows(&[2, 0]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.column("x").unwrap(), vec!["-120.3", "-120.5"]);

        picked.append(ds.clone()).unwrap();
        assert_eq!(picked.len(), 5);

        let other = Dataset::new(vec!["z".into()]);
        assert!(picked.append(other).is_err());
    }

    #[test]
    fn test_append_into_empty() {
        let mut acc = Dataset::default();
        acc.append(sample()).unwrap();
        assert_eq!(acc.len(), 3);
        assert_eq!(acc.n_columns(), 4);
    }

    #[test]
    fn test_is_missing_cell() {
        assert!(is_missing_cell(""));
        assert!(is_missing_cell(" NaN "));
        assert!(is_missing_cell("NA"));
        assert!(!is_missing_cell("0"));
        assert!(!is_missing_cell("-9999"));
    }
}
