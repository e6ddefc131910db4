//! Missing value imputation
//!
//! Numeric columns are filled with the column median computed at fit
//! time; categorical columns are filled with the literal "Unknown".

use crate::error::{ClaimsightError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fill value used for missing categorical entries.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Imputer for the fixed claim schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    numeric_fill: BTreeMap<String, f64>,
}

impl Imputer {
    pub fn new() -> Self {
        Self {
            numeric_fill: BTreeMap::new(),
        }
    }

    /// Record the median of the present values as the fill value for a
    /// numeric column. A column with no present values falls back to 0.
    pub fn fit_numeric(&mut self, name: &str, values: &[Option<f64>]) {
        let mut present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
        let fill = if present.is_empty() {
            0.0
        } else {
            present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let mid = present.len() / 2;
            if present.len() % 2 == 0 {
                (present[mid - 1] + present[mid]) / 2.0
            } else {
                present[mid]
            }
        };
        self.numeric_fill.insert(name.to_string(), fill);
    }

    /// Fill missing numeric values with the fitted median.
    pub fn fill_numeric(&self, name: &str, values: &[Option<f64>]) -> Result<Vec<f64>> {
        let fill = self.numeric_fill.get(name).copied().ok_or_else(|| {
            ClaimsightError::Prediction(format!("imputer has no fill value for column {}", name))
        })?;
        Ok(values.iter().map(|v| v.unwrap_or(fill)).collect())
    }

    /// Fill missing categorical values with `"Unknown"`.
    pub fn fill_categorical(&self, values: &[Option<String>]) -> Vec<String> {
        values
            .iter()
            .map(|v| v.clone().unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()))
            .collect()
    }

    /// Fitted fill value for a numeric column, if present.
    pub fn numeric_fill(&self, name: &str) -> Option<f64> {
        self.numeric_fill.get(name).copied()
    }
}

impl Default for Imputer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_fill_odd() {
        let mut imputer = Imputer::new();
        imputer.fit_numeric("age", &[Some(1.0), Some(3.0), Some(9.0), None]);
        assert_eq!(imputer.numeric_fill("age"), Some(3.0));
    }

    #[test]
    fn test_median_fill_even() {
        let mut imputer = Imputer::new();
        imputer.fit_numeric("bmi", &[Some(1.0), Some(3.0), Some(5.0), Some(9.0)]);
        assert_eq!(imputer.numeric_fill("bmi"), Some(4.0));
    }

    #[test]
    fn test_fill_numeric_replaces_missing() {
        let mut imputer = Imputer::new();
        imputer.fit_numeric("age", &[Some(2.0), Some(4.0), None]);
        let filled = imputer.fill_numeric("age", &[Some(2.0), None]).unwrap();
        assert_eq!(filled, vec![2.0, 3.0]);
    }

    #[test]
    fn test_fill_categorical_unknown() {
        let imputer = Imputer::new();
        let filled = imputer.fill_categorical(&[Some("Male".to_string()), None]);
        assert_eq!(filled, vec!["Male".to_string(), "Unknown".to_string()]);
    }

    #[test]
    fn test_all_missing_column_falls_back_to_zero() {
        let mut imputer = Imputer::new();
        imputer.fit_numeric("premium_annual_inr", &[None, None]);
        assert_eq!(imputer.numeric_fill("premium_annual_inr"), Some(0.0));
    }
}
