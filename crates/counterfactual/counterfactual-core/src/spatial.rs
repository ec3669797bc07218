//! Spatial binning of coordinates into cross-validation groups.
//!
//! A bin size in meters is converted to degrees with fixed approximations,
//! each coordinate is floored to its bin, and the two binned coordinates are
//! joined into a label. Rows sharing a label are spatially co-located.

use counterfactual_spi::{CounterfactualError, Result};

/// Approximate meters per degree of longitude at the study latitude.
pub const METERS_PER_DEGREE_LON: f64 = 89_000.0;
/// Approximate meters per degree of latitude.
pub const METERS_PER_DEGREE_LAT: f64 = 111_000.0;

/// Grid of square-ish cells of a fixed size in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialBinning {
    distance: f64,
    x_size: f64,
    y_size: f64,
}

impl SpatialBinning {
    pub fn new(distance_m: f64) -> Result<Self> {
        if !(distance_m.is_finite() && distance_m > 0.0) {
            return Err(CounterfactualError::InvalidConfig(format!(
                "bin size must be a positive distance, got {}",
                distance_m
            )));
        }

        Ok(Self {
            distance: distance_m,
            x_size: distance_m / METERS_PER_DEGREE_LON,
            y_size: distance_m / METERS_PER_DEGREE_LAT,
        })
    }

    /// Bin size in meters.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Cell size in degrees (longitude, latitude).
    pub fn cell_size(&self) -> (f64, f64) {
        (self.x_size, self.y_size)
    }

    /// Group label of one point: `"<binned x>,<binned y>"`.
    pub fn label(&self, x: f64, y: f64) -> String {
        let bx = (x / self.x_size).floor() * self.x_size;
        let by = (y / self.y_size).floor() * self.y_size;
        format!("{},{}", bx, by)
    }

    /// Labels for paired coordinate columns.
    pub fn labels(&self, xs: &[f64], ys: &[f64]) -> Vec<String> {
        xs.iter()
            .zip(ys.iter())
            .map(|(&x, &y)| self.label(x, y))
            .collect()
    }
}
