//! Dataset store
//!
//! Uploaded CSV files live under the data directory. A mutable pointer
//! tracks the current dataset with last-writer-wins semantics (matching
//! the source system; concurrent uploads race on the pointer and the
//! newest write wins). `latest` falls back to the most recently
//! modified CSV on disk when no pointer is set.

use crate::error::{ClaimsightError, Result};
use crate::predict::PredictionRecord;
use crate::preprocessing::REQUIRED_COLUMNS;
use chrono::Utc;
use parking_lot::RwLock;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadedDataset {
    pub path: PathBuf,
    pub filename: String,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// CSV dataset store with a current-dataset pointer
pub struct DatasetStore {
    data_dir: PathBuf,
    current: RwLock<Option<PathBuf>>,
}

impl DatasetStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            current: RwLock::new(None),
        }
    }

    /// Validate and persist an uploaded CSV, then point the store at it.
    pub fn upload(&self, bytes: &[u8], filename: &str) -> Result<UploadedDataset> {
        if !filename.to_lowercase().ends_with(".csv") {
            return Err(ClaimsightError::InvalidRequest(
                "Only CSV files are allowed".to_string(),
            ));
        }
        if bytes.is_empty() {
            return Err(ClaimsightError::InvalidRequest(
                "Uploaded file is empty".to_string(),
            ));
        }

        let df = parse_csv_bytes(bytes)?;
        validate_columns(&df)?;

        std::fs::create_dir_all(&self.data_dir)?;
        let clean_name = sanitize_filename(filename);
        let path = self.data_dir.join(&clean_name);
        std::fs::write(&path, bytes)?;

        *self.current.write() = Some(path.clone());
        info!(path = %path.display(), rows = df.height(), "Dataset uploaded");

        Ok(UploadedDataset {
            path,
            filename: clean_name,
            rows: df.height(),
            columns: df
                .get_column_names()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }

    /// Path of the current dataset: the pointer if its file still
    /// exists, else the newest CSV in the data directory.
    pub fn latest_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.current.read().clone() {
            if path.exists() {
                return Ok(path);
            }
        }

        let mut candidates: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        if let Ok(entries) = std::fs::read_dir(&self.data_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_csv = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false);
                if is_csv {
                    if let Ok(meta) = entry.metadata() {
                        if let Ok(modified) = meta.modified() {
                            candidates.push((path, modified));
                        }
                    }
                }
            }
        }

        candidates.sort_by_key(|(_, modified)| *modified);
        candidates
            .pop()
            .map(|(path, _)| path)
            .ok_or(ClaimsightError::NoDataset)
    }

    /// Load the current dataset.
    pub fn load_latest(&self) -> Result<DataFrame> {
        let path = self.latest_path()?;
        load_csv(&path)
    }

    /// Current dataset plus logged predictions appended as rows, each
    /// prediction standing in for a claim amount.
    pub fn snapshot_with_predictions(&self, records: &[PredictionRecord]) -> Result<DataFrame> {
        let base = normalized_frame(&self.load_latest()?)?;
        if records.is_empty() {
            return Ok(base);
        }
        let additions = predictions_frame(records)?;
        Ok(base.vstack(&additions)?)
    }
}

/// Load and parse a CSV file.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let file = std::fs::File::open(path)?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| ClaimsightError::Data(e.to_string()))
}

fn parse_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| ClaimsightError::InvalidRequest(format!("Invalid CSV file: {}", e)))
}

/// Check the required claim schema, listing any missing columns.
pub fn validate_columns(df: &DataFrame) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.iter().any(|p| p == *col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClaimsightError::MissingColumns(missing))
    }
}

/// Replace path-hostile characters and stamp the name so repeated
/// uploads of the same file never collide.
fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = cleaned.strip_suffix(".csv").unwrap_or(&cleaned);
    format!("{}_{}.csv", stem, Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Select the required columns in schema order with uniform dtypes so
/// frames from different sources can be stacked.
pub fn normalized_frame(df: &DataFrame) -> Result<DataFrame> {
    validate_columns(df)?;
    let selected = df.select(REQUIRED_COLUMNS)?;
    let mut columns: Vec<Column> = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for col in selected.get_columns() {
        if matches!(col.dtype(), DataType::String) {
            columns.push(col.clone());
        } else {
            columns.push(
                col.as_materialized_series()
                    .cast(&DataType::Float64)?
                    .into(),
            );
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// Build a frame from prediction records in the dataset schema.
pub fn predictions_frame(records: &[PredictionRecord]) -> Result<DataFrame> {
    let ages: Vec<f64> = records.iter().map(|r| r.input_data.age).collect();
    let bmis: Vec<f64> = records.iter().map(|r| r.input_data.bmi).collect();
    let genders: Vec<String> = records.iter().map(|r| r.input_data.gender.clone()).collect();
    let smokers: Vec<String> = records.iter().map(|r| r.input_data.smoker.clone()).collect();
    let regions: Vec<String> = records.iter().map(|r| r.input_data.region.clone()).collect();
    let premiums: Vec<f64> = records
        .iter()
        .map(|r| r.input_data.premium_or_default())
        .collect();
    let claims: Vec<f64> = records.iter().map(|r| r.prediction).collect();

    Ok(DataFrame::new(vec![
        Column::new("age".into(), ages),
        Column::new("bmi".into(), bmis),
        Column::new("gender".into(), genders),
        Column::new("smoker".into(), smokers),
        Column::new("region".into(), regions),
        Column::new("premium_annual_inr".into(), premiums),
        Column::new("claim_amount_inr".into(), claims),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::ClaimFeatures;

    const VALID_CSV: &str = "age,bmi,gender,smoker,region,premium_annual_inr,claim_amount_inr\n\
        25,22.0,Male,No,North,15000,12000\n\
        40,28.5,Female,Yes,South,22000,45000\n";

    fn store() -> (tempfile::TempDir, DatasetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path().join("data"));
        (dir, store)
    }

    #[test]
    fn test_upload_and_load_latest() {
        let (_dir, store) = store();
        let uploaded = store.upload(VALID_CSV.as_bytes(), "claims.csv").unwrap();
        assert_eq!(uploaded.rows, 2);
        assert!(uploaded.filename.starts_with("claims_"));

        let df = store.load_latest().unwrap();
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_upload_rejects_non_csv() {
        let (_dir, store) = store();
        assert!(store.upload(b"hello", "claims.txt").is_err());
    }

    #[test]
    fn test_upload_rejects_missing_columns() {
        let (_dir, store) = store();
        let csv = "age,bmi\n25,22.0\n";
        let err = store.upload(csv.as_bytes(), "claims.csv").unwrap_err();
        match err {
            ClaimsightError::MissingColumns(missing) => {
                assert!(missing.contains(&"smoker".to_string()));
                assert!(missing.contains(&"claim_amount_inr".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_latest_fails_with_no_dataset() {
        let (_dir, store) = store();
        assert!(matches!(store.load_latest(), Err(ClaimsightError::NoDataset)));
    }

    #[test]
    fn test_filename_is_sanitized() {
        let (_dir, store) = store();
        let uploaded = store
            .upload(VALID_CSV.as_bytes(), "../evil path!.csv")
            .unwrap();
        assert!(!uploaded.filename.contains('/'));
        assert!(!uploaded.filename.contains(' '));
        assert!(!uploaded.filename.contains('!'));
    }

    #[test]
    fn test_snapshot_appends_predictions() {
        let (_dir, store) = store();
        store.upload(VALID_CSV.as_bytes(), "claims.csv").unwrap();

        let records = vec![PredictionRecord {
            user_email: "a@example.com".to_string(),
            input_data: ClaimFeatures {
                age: 30.0,
                bmi: 25.0,
                gender: "Male".to_string(),
                smoker: "No".to_string(),
                region: "North".to_string(),
                premium_annual_inr: Some(15000.0),
            },
            prediction: 18000.0,
            confidence: 0.8,
            created_at: Utc::now(),
        }];

        let df = store.snapshot_with_predictions(&records).unwrap();
        assert_eq!(df.height(), 3);
    }
}
