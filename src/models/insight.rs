use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::history::HistorySeries;

use super::exercise::{ExerciseCategory, Intensity};

/// Per-point anomaly output, positionally aligned with the sorted series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
  pub is_anomaly: Vec<bool>,
  pub severity: Vec<f64>,
  pub expected_values: Vec<f64>,
  pub timestamps: Vec<NaiveDate>,
}

/// A flagged session joined back to its actual value, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedSession {
  pub index: usize,
  pub date: NaiveDate,
  pub exercise_name: String,
  pub actual: f64,
  pub expected: f64,
  pub severity: f64,
}

impl AnomalyReport {
  pub fn len(&self) -> usize {
    self.is_anomaly.len()
  }

  pub fn is_empty(&self) -> bool {
    self.is_anomaly.is_empty()
  }

  pub fn anomaly_count(&self) -> usize {
    self.is_anomaly.iter().filter(|flag| **flag).count()
  }

  /// Flagged sessions with the actual calorie value next to the expected one.
  /// `series` must be the series the report was computed from.
  pub fn flagged(&self, series: &HistorySeries) -> Vec<FlaggedSession> {
    let scores = self
      .is_anomaly
      .iter()
      .zip(&self.severity)
      .zip(&self.expected_values);

    series
      .points()
      .iter()
      .zip(scores)
      .enumerate()
      .filter(|(_, (_, ((flag, _), _)))| **flag)
      .map(|(i, (point, ((_, severity), expected)))| FlaggedSession {
        index: i,
        date: point.date,
        exercise_name: point.exercise_name.clone(),
        actual: point.calories as f64,
        expected: *expected,
        severity: *severity,
      })
      .collect()
  }

  /// One-line outcome for the history view
  pub fn summary_message(&self) -> String {
    match self.anomaly_count() {
      0 => "Exercise patterns look consistent and healthy.".to_string(),
      n => format!(
        "Found {} unusual pattern(s). Consider reviewing these sessions - they might indicate overexertion or data entry errors.",
        n
      ),
    }
  }
}

/// A proposed next workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
  pub exercise_type: ExerciseCategory,
  /// Minutes
  pub duration: u32,
  pub intensity: Intensity,
  pub confidence_score: f64,
  pub reason: String,
}
