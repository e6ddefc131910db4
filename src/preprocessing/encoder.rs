//! One-hot encoding for categorical features
//!
//! Categories are stored sorted so the design-matrix layout is
//! deterministic across fits of the same data. Values unseen at fit
//! time encode as an all-zero block.

use crate::error::{ClaimsightError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One-hot encoder over named categorical columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: BTreeMap<String, Vec<String>>,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Record the sorted distinct categories of one column.
    pub fn fit(&mut self, name: &str, values: &[String]) {
        let mut distinct: Vec<String> = values.to_vec();
        distinct.sort();
        distinct.dedup();
        self.categories.insert(name.to_string(), distinct);
    }

    /// Encode a single value as a one-hot block for the named column.
    pub fn encode(&self, name: &str, value: &str) -> Result<Vec<f64>> {
        let categories = self.categories.get(name).ok_or_else(|| {
            ClaimsightError::Prediction(format!("encoder is not fitted for column {}", name))
        })?;
        let mut block = vec![0.0; categories.len()];
        if let Ok(idx) = categories.binary_search_by(|c| c.as_str().cmp(value)) {
            block[idx] = 1.0;
        }
        Ok(block)
    }

    /// Number of one-hot columns produced for the named column.
    pub fn width(&self, name: &str) -> usize {
        self.categories.get(name).map(|c| c.len()).unwrap_or(0)
    }

    /// Sorted categories of the named column.
    pub fn categories(&self, name: &str) -> &[String] {
        self.categories
            .get(name)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted() -> OneHotEncoder {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(
            "region",
            &[
                "South".to_string(),
                "North".to_string(),
                "North".to_string(),
                "East".to_string(),
            ],
        );
        encoder
    }

    #[test]
    fn test_categories_are_sorted_and_deduped() {
        let encoder = fitted();
        assert_eq!(encoder.categories("region"), &["East", "North", "South"]);
        assert_eq!(encoder.width("region"), 3);
    }

    #[test]
    fn test_encode_known_value() {
        let encoder = fitted();
        assert_eq!(encoder.encode("region", "North").unwrap(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_encode_unknown_value_is_all_zero() {
        let encoder = fitted();
        assert_eq!(encoder.encode("region", "West").unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unfitted_column_fails() {
        let encoder = OneHotEncoder::new();
        assert!(encoder.encode("gender", "Male").is_err());
    }
}
