//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Record factories
//! - Calorie series fixtures
//! - An in-memory record source

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::InsightError;
use crate::models::{ExerciseRecord, Intensity};
use crate::service::RecordSource;

pub const TEST_STUDENT: &str = "student-1";

/// First day of every generated series
pub fn base_date() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid fixture date")
}

pub fn date_str(days_after_base: i64) -> String {
  (base_date() + Duration::days(days_after_base))
    .format("%Y-%m-%d")
    .to_string()
}

/// ---------------------------------------------------------------------------
/// Record Factories
/// ---------------------------------------------------------------------------

/// A 30 minute run for the default test student
pub fn make_record(id: &str, date: &str, calories: i64, intensity: Intensity) -> ExerciseRecord {
  ExerciseRecord {
    id: id.to_string(),
    student_id: TEST_STUDENT.to_string(),
    exercise_name: "Running".to_string(),
    duration: 30,
    calories,
    date: date.to_string(),
    intensity,
  }
}

pub fn make_record_for(student_id: &str, id: &str, date: &str, calories: i64) -> ExerciseRecord {
  ExerciseRecord {
    student_id: student_id.to_string(),
    ..make_record(id, date, calories, Intensity::Medium)
  }
}

/// Fully specified session, for recommendation scenarios
pub fn make_session(
  id: &str,
  days_after_base: i64,
  exercise_name: &str,
  duration: i64,
  intensity: Intensity,
) -> ExerciseRecord {
  ExerciseRecord {
    id: id.to_string(),
    student_id: TEST_STUDENT.to_string(),
    exercise_name: exercise_name.to_string(),
    duration,
    calories: duration * 8,
    date: date_str(days_after_base),
    intensity,
  }
}

/// One medium-intensity record per day, starting at `base_date()`
pub fn calorie_records(values: &[i64]) -> Vec<ExerciseRecord> {
  values
    .iter()
    .enumerate()
    .map(|(i, &calories)| {
      make_record(&(i + 1).to_string(), &date_str(i as i64), calories, Intensity::Medium)
    })
    .collect()
}

/// ---------------------------------------------------------------------------
/// In-memory Record Source
/// ---------------------------------------------------------------------------

/// Record source backed by a map, counting how often it is queried
#[derive(Default)]
pub struct InMemorySource {
  records: HashMap<String, Vec<ExerciseRecord>>,
  pub loads: AtomicUsize,
}

impl InMemorySource {
  pub fn with_student(mut self, student_id: &str, records: Vec<ExerciseRecord>) -> Self {
    self.records.insert(student_id.to_string(), records);
    self
  }

  pub fn load_count(&self) -> usize {
    self.loads.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl RecordSource for InMemorySource {
  async fn load_records(&self, student_id: &str) -> Result<Vec<ExerciseRecord>, InsightError> {
    self.loads.fetch_add(1, Ordering::SeqCst);
    self
      .records
      .get(student_id)
      .cloned()
      .ok_or_else(|| InsightError::Source {
        message: format!("Student not found: {}", student_id),
      })
  }
}
