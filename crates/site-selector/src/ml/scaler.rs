//! Median/IQR feature scaling

use crate::{AnalysisError, Result};
use serde::Serialize;

/// Centers each feature on its median and divides by its interquartile range
#[derive(Debug, Clone, Default, Serialize)]
pub struct RobustScaler {
    center: Vec<f64>,
    scale: Vec<f64>,
}

impl RobustScaler {
    pub fn fit(x: &[Vec<f64>]) -> Result<Self> {
        let width = x.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(AnalysisError::Model("cannot fit scaler on empty data".into()));
        }

        let mut center = Vec::with_capacity(width);
        let mut scale = Vec::with_capacity(width);
        for j in 0..width {
            let mut column: Vec<f64> = x.iter().map(|row| row[j]).collect();
            column.sort_by(f64::total_cmp);
            center.push(percentile(&column, 50.0));
            let iqr = percentile(&column, 75.0) - percentile(&column, 25.0);
            // Constant features pass through unscaled
            scale.push(if iqr == 0.0 { 1.0 } else { iqr });
        }
        Ok(Self { center, scale })
    }

    pub fn transform_one(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(v, (c, s))| (v - c) / s)
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform_one(row)).collect()
    }

    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

/// Percentile of sorted data with linear interpolation between ranks
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
