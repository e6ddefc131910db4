//! Feature preprocessing for the claim prediction pipeline
//!
//! Fixed tabular schema: three numeric features (median-imputed, then
//! standard-scaled) and three categorical features (imputed with
//! "Unknown", then one-hot encoded in deterministic order). The fitted
//! pipeline is serializable so a trained artifact can be reloaded with
//! identical encoding behavior.

mod encoder;
mod imputer;
mod scaler;

pub use encoder::OneHotEncoder;
pub use imputer::Imputer;
pub use scaler::StandardScaler;

use crate::error::{ClaimsightError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Numeric feature columns, in design-matrix order.
pub const NUMERIC_FEATURES: [&str; 3] = ["age", "bmi", "premium_annual_inr"];

/// Categorical feature columns, in design-matrix order.
pub const CATEGORICAL_FEATURES: [&str; 3] = ["gender", "smoker", "region"];

/// Regression target column.
pub const TARGET_COLUMN: &str = "claim_amount_inr";

/// Columns an uploaded dataset must contain.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "age",
    "bmi",
    "gender",
    "smoker",
    "region",
    "premium_annual_inr",
    "claim_amount_inr",
];

/// Extract a column as `Option<f64>` values, casting integers as needed.
/// Non-finite values are treated as missing.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| ClaimsightError::MissingColumns(vec![name.to_string()]))?;
    let casted = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .map_err(|e| ClaimsightError::Data(e.to_string()))?;
    let ca = casted
        .f64()
        .map_err(|e| ClaimsightError::Data(e.to_string()))?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect())
}

/// Extract a column as `Option<String>` values.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| ClaimsightError::MissingColumns(vec![name.to_string()]))?;
    let series = column.as_materialized_series();
    let ca = series
        .str()
        .map_err(|e| ClaimsightError::Data(e.to_string()))?;
    Ok(ca.into_iter().map(|v| v.map(|s| s.to_string())).collect())
}

/// Fitted preprocessing pipeline: impute, scale numerics, one-hot
/// encode categoricals. Emits a row-major design matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePipeline {
    imputer: Imputer,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    is_fitted: bool,
}

impl FeaturePipeline {
    pub fn new() -> Self {
        Self {
            imputer: Imputer::new(),
            scaler: StandardScaler::new(),
            encoder: OneHotEncoder::new(),
            is_fitted: false,
        }
    }

    /// Fit imputation, scaling, and encoding parameters to the data.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        for name in NUMERIC_FEATURES {
            let raw = numeric_column(df, name)?;
            self.imputer.fit_numeric(name, &raw);
            let filled = self.imputer.fill_numeric(name, &raw)?;
            self.scaler.fit(name, &filled);
        }
        for name in CATEGORICAL_FEATURES {
            let raw = string_column(df, name)?;
            let filled = self.imputer.fill_categorical(&raw);
            self.encoder.fit(name, &filled);
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform a frame into a design matrix of shape
    /// `(n_rows, n_features)`. Unseen categorical levels encode as an
    /// all-zero block rather than raising.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ClaimsightError::Prediction(
                "feature pipeline is not fitted".to_string(),
            ));
        }

        let n_rows = df.height();
        let mut numeric_cols: Vec<Vec<f64>> = Vec::with_capacity(NUMERIC_FEATURES.len());
        for name in NUMERIC_FEATURES {
            let raw = numeric_column(df, name)?;
            let filled = self.imputer.fill_numeric(name, &raw)?;
            numeric_cols.push(self.scaler.transform(name, &filled)?);
        }

        let mut categorical_cols: Vec<Vec<String>> = Vec::with_capacity(CATEGORICAL_FEATURES.len());
        for name in CATEGORICAL_FEATURES {
            let raw = string_column(df, name)?;
            categorical_cols.push(self.imputer.fill_categorical(&raw));
        }

        let width = self.n_features();
        let mut matrix = Array2::zeros((n_rows, width));
        for row in 0..n_rows {
            let mut offset = 0usize;
            for col in &numeric_cols {
                matrix[[row, offset]] = col[row];
                offset += 1;
            }
            for (name, col) in CATEGORICAL_FEATURES.iter().zip(&categorical_cols) {
                let block = self.encoder.encode(name, &col[row])?;
                for (i, v) in block.iter().enumerate() {
                    matrix[[row, offset + i]] = *v;
                }
                offset += block.len();
            }
        }

        Ok(matrix)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Total width of the design matrix.
    pub fn n_features(&self) -> usize {
        NUMERIC_FEATURES.len()
            + CATEGORICAL_FEATURES
                .iter()
                .map(|name| self.encoder.width(name))
                .sum::<usize>()
    }

    /// Column names of the design matrix, e.g. `age`, `gender_Male`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
        for name in CATEGORICAL_FEATURES {
            for category in self.encoder.categories(name) {
                names.push(format!("{}_{}", name, category));
            }
        }
        names
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new("age".into(), &[25.0, 40.0, 55.0, 30.0]),
            Column::new("bmi".into(), &[22.0, 28.0, 31.0, 24.5]),
            Column::new("gender".into(), &["Male", "Female", "Male", "Female"]),
            Column::new("smoker".into(), &["No", "Yes", "No", "No"]),
            Column::new("region".into(), &["North", "South", "East", "West"]),
            Column::new(
                "premium_annual_inr".into(),
                &[15000.0, 22000.0, 30000.0, 18000.0],
            ),
            Column::new(
                "claim_amount_inr".into(),
                &[12000.0, 45000.0, 28000.0, 9000.0],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_fit_transform_shape() {
        let df = sample_frame();
        let mut pipeline = FeaturePipeline::new();
        let matrix = pipeline.fit_transform(&df).unwrap();

        // 3 numerics + 2 genders + 2 smoker levels + 4 regions
        assert_eq!(matrix.ncols(), 11);
        assert_eq!(matrix.nrows(), 4);
        assert_eq!(pipeline.feature_names().len(), 11);
    }

    #[test]
    fn test_numeric_columns_are_standardized() {
        let df = sample_frame();
        let mut pipeline = FeaturePipeline::new();
        let matrix = pipeline.fit_transform(&df).unwrap();

        let age_mean: f64 = matrix.column(0).sum() / matrix.nrows() as f64;
        assert!(age_mean.abs() < 1e-9);
    }

    #[test]
    fn test_unseen_category_encodes_as_zero_block() {
        let df = sample_frame();
        let mut pipeline = FeaturePipeline::new();
        pipeline.fit(&df).unwrap();

        let probe = DataFrame::new(vec![
            Column::new("age".into(), &[30.0]),
            Column::new("bmi".into(), &[25.0]),
            Column::new("gender".into(), &["Male"]),
            Column::new("smoker".into(), &["No"]),
            Column::new("region".into(), &["Central"]),
            Column::new("premium_annual_inr".into(), &[15000.0]),
        ])
        .unwrap();

        let matrix = pipeline.transform(&probe).unwrap();
        // Region block is the last four columns; an unseen region must be all zeros.
        let region_block = matrix.slice(ndarray::s![0, 7..]);
        assert!(region_block.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let pipeline = FeaturePipeline::new();
        assert!(pipeline.transform(&sample_frame()).is_err());
    }
}
