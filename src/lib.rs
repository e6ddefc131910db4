//! Claimsight - insurance claim prediction service
//!
//! A REST backend that serves a tabular claim-amount regression model:
//! user signup/login, CSV dataset upload, model retraining, analytics
//! endpoints, and emailed prediction reports.
//!
//! # Modules
//!
//! - [`auth`] - User accounts, password hashing, session tokens
//! - [`data`] - Dataset store: CSV uploads and the current-dataset pointer
//! - [`preprocessing`] - Imputation, scaling, one-hot encoding
//! - [`model`] - Regression forest, training routine, artifact slot
//! - [`predict`] - Prediction service and prediction history
//! - [`stats`] - Descriptive statistics and claims analytics
//! - [`notify`] - Email report delivery with retries and audit records
//! - [`remote`] - Optional remote table mirror (PostgREST)
//! - [`server`] - HTTP server with the REST API

pub mod auth;
pub mod data;
pub mod error;
pub mod model;
pub mod notify;
pub mod predict;
pub mod preprocessing;
pub mod remote;
pub mod server;
pub mod stats;

pub use error::{ClaimsightError, Result};
