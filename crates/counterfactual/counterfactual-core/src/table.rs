//! CSV reading and writing for [`Dataset`]s.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use counterfactual_spi::{CounterfactualError, Dataset, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Load a CSV file with a header row.
pub fn read_csv(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|e| {
        CounterfactualError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CounterfactualError::CsvError(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut dataset = Dataset::new(headers);
    for result in reader.records() {
        let record = result.map_err(|e| CounterfactualError::CsvError(e.to_string()))?;
        dataset.push_record(record.iter().map(String::from).collect())?;
    }

    Ok(dataset)
}

/// Write a dataset as CSV, header row first, no index column.
pub fn write_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| CounterfactualError::CsvError(e.to_string()))?;

    writer
        .write_record(dataset.headers())
        .map_err(|e| CounterfactualError::CsvError(e.to_string()))?;
    for record in dataset.records() {
        writer
            .write_record(record)
            .map_err(|e| CounterfactualError::CsvError(e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render a number for a CSV cell. `NaN` becomes an empty cell.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{}", value)
    }
}

/// Render a column of numbers.
pub fn format_values(values: &[f64]) -> Vec<String> {
    values.iter().map(|&v| format_value(v)).collect()
}

/// Seeded random subset of `fraction` of the rows, without replacement.
pub fn subsample(dataset: &Dataset, fraction: f64, seed: u64) -> Result<Dataset> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(CounterfactualError::InvalidConfig(format!(
            "sample fraction must be in (0, 1], got {}",
            fraction
        )));
    }

    let n = (dataset.len() as f64 * fraction).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let indices = rand::seq::index::sample(&mut rng, dataset.len(), n).into_vec();
    Ok(dataset.select_rows(&indices))
}
