//! Standard (z-score) feature scaling

use crate::error::{ClaimsightError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters for a fitted column
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScaleParams {
    mean: f64,
    std: f64,
}

/// Per-column standard scaler: `(x - mean) / std`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    params: BTreeMap<String, ScaleParams>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
        }
    }

    /// Fit mean and sample standard deviation for one column.
    /// A zero-variance column scales by 1 so values map to 0.
    pub fn fit(&mut self, name: &str, values: &[f64]) {
        let n = values.len();
        if n == 0 {
            self.params.insert(
                name.to_string(),
                ScaleParams {
                    mean: 0.0,
                    std: 1.0,
                },
            );
            return;
        }

        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n < 2 {
            1.0
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            let s = var.sqrt();
            if s == 0.0 {
                1.0
            } else {
                s
            }
        };

        self.params
            .insert(name.to_string(), ScaleParams { mean, std });
    }

    /// Scale one column with its fitted parameters.
    pub fn transform(&self, name: &str, values: &[f64]) -> Result<Vec<f64>> {
        let params = self.params.get(name).ok_or_else(|| {
            ClaimsightError::Prediction(format!("scaler is not fitted for column {}", name))
        })?;
        Ok(values
            .iter()
            .map(|v| (v - params.mean) / params.std)
            .collect())
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_mean_is_zero() {
        let mut scaler = StandardScaler::new();
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        scaler.fit("a", &values);
        let scaled = scaler.transform("a", &values).unwrap();

        let mean: f64 = scaled.iter().sum::<f64>() / scaled.len() as f64;
        assert!(mean.abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_scales_to_zero() {
        let mut scaler = StandardScaler::new();
        let values = [7.0, 7.0, 7.0];
        scaler.fit("a", &values);
        let scaled = scaler.transform("a", &values).unwrap();
        assert!(scaled.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unfitted_column_fails() {
        let scaler = StandardScaler::new();
        assert!(scaler.transform("missing", &[1.0]).is_err());
    }
}
