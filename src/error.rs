//! Error taxonomy for the insight engine
//!
//! The analytical core only ever fails with `InvalidInput` or
//! `InsufficientData`. `Source` belongs to the service layer, where records
//! are fetched from the surrounding application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InsightError {
  /// Malformed record. Never clamped or dropped: silent correction would
  /// skew every statistic downstream.
  #[error("Invalid exercise record {record_id}: {reason}")]
  InvalidInput { record_id: String, reason: String },

  #[error("Need at least {required} exercise records for anomaly detection (found {actual})")]
  InsufficientData { required: usize, actual: usize },

  #[error("Failed to load exercise records: {message}")]
  Source { message: String },
}

impl InsightError {
  pub fn invalid(record_id: impl Into<String>, reason: impl Into<String>) -> Self {
    InsightError::InvalidInput {
      record_id: record_id.into(),
      reason: reason.into(),
    }
  }
}
