//! Normalized exercise history
//!
//! Both engines read the same `HistorySeries`: records validated once,
//! deduplicated by id, and sorted by date (stable on same-day ties) so the
//! two analyses never disagree about ordering or validity.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

use crate::error::InsightError;
use crate::models::{ExerciseCategory, ExerciseRecord, Intensity, CALORIES_RANGE, DURATION_RANGE};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// ---------------------------------------------------------------------------
/// Series Points
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
  pub date: NaiveDate,
  pub calories: i64,
  /// Minutes
  pub duration: i64,
  pub intensity: Intensity,
  pub exercise_name: String,
  pub category: Option<ExerciseCategory>,
}

impl SeriesPoint {
  /// Intensity-weighted minutes (low 1x, medium 2x, high 3x)
  pub fn load(&self) -> f64 {
    self.duration as f64 * self.intensity.load_multiplier()
  }

  /// Lowercased, trimmed exercise label used for variety counting
  pub fn exercise_key(&self) -> String {
    self.exercise_name.trim().to_lowercase()
  }
}

/// ---------------------------------------------------------------------------
/// History Series
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistorySeries {
  student_id: Option<String>,
  points: Vec<SeriesPoint>,
}

impl HistorySeries {
  /// Validate, deduplicate and sort a student's records.
  ///
  /// Fails on the first invalid record in input order. Records sharing an id
  /// collapse to the first occurrence. Records from more than one student are
  /// rejected.
  pub fn build(records: &[ExerciseRecord]) -> Result<Self, InsightError> {
    let mut seen_ids = HashSet::new();
    let mut student_id: Option<&str> = None;
    let mut points = Vec::with_capacity(records.len());

    for record in records {
      let point = validate_record(record)?;

      match student_id {
        None => student_id = Some(record.student_id.as_str()),
        Some(sid) if sid != record.student_id => {
          tracing::warn!(record_id = %record.id, "records span multiple students");
          return Err(InsightError::invalid(
            &record.id,
            format!(
              "belongs to student {} but series is for student {}",
              record.student_id, sid
            ),
          ));
        }
        Some(_) => {}
      }

      if !seen_ids.insert(record.id.as_str()) {
        tracing::debug!(record_id = %record.id, "dropping duplicate record id");
        continue;
      }

      points.push(point);
    }

    // sort_by_key is stable: same-day sessions keep their input order
    points.sort_by_key(|p| p.date);

    Ok(Self {
      student_id: student_id.map(str::to_string),
      points,
    })
  }

  pub fn student_id(&self) -> Option<&str> {
    self.student_id.as_deref()
  }

  pub fn points(&self) -> &[SeriesPoint] {
    &self.points
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Calorie values aligned to sorted order
  pub fn values(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.calories as f64).collect()
  }

  pub fn dates(&self) -> Vec<NaiveDate> {
    self.points.iter().map(|p| p.date).collect()
  }

  pub fn intensities(&self) -> Vec<Intensity> {
    self.points.iter().map(|p| p.intensity).collect()
  }

  pub fn latest_date(&self) -> Option<NaiveDate> {
    self.points.last().map(|p| p.date)
  }

  /// The last `n` points ending at each index (inclusive). Lazy and
  /// restartable: every call, or clone, starts again from index 0.
  pub fn sliding_window(&self, n: usize) -> SlidingWindow<'_> {
    SlidingWindow {
      points: &self.points,
      size: n,
      next_end: 0,
    }
  }

  /// SHA-256 over the normalized series content. Identical histories hash
  /// identically regardless of input order or duplicate records.
  pub fn content_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.student_id.as_deref().unwrap_or("").as_bytes());
    for p in &self.points {
      hasher.update(b"\x1e");
      hasher.update(p.date.format(DATE_FORMAT).to_string().as_bytes());
      hasher.update(b"\x1f");
      hasher.update(p.calories.to_le_bytes());
      hasher.update(p.duration.to_le_bytes());
      hasher.update(p.intensity.as_str().as_bytes());
      hasher.update(b"\x1f");
      hasher.update(p.exercise_name.as_bytes());
    }
    format!("{:x}", hasher.finalize())
  }
}

fn validate_record(record: &ExerciseRecord) -> Result<SeriesPoint, InsightError> {
  let (min_duration, max_duration) = DURATION_RANGE;
  if record.duration < min_duration || record.duration > max_duration {
    tracing::warn!(record_id = %record.id, duration = record.duration, "invalid duration");
    return Err(InsightError::invalid(
      &record.id,
      format!(
        "duration must be between {} and {} minutes (got {})",
        min_duration, max_duration, record.duration
      ),
    ));
  }

  let (min_calories, max_calories) = CALORIES_RANGE;
  if record.calories < min_calories || record.calories > max_calories {
    tracing::warn!(record_id = %record.id, calories = record.calories, "invalid calories");
    return Err(InsightError::invalid(
      &record.id,
      format!(
        "calories must be between {} and {} (got {})",
        min_calories, max_calories, record.calories
      ),
    ));
  }

  let date = NaiveDate::parse_from_str(record.date.trim(), DATE_FORMAT).map_err(|_| {
    tracing::warn!(record_id = %record.id, date = %record.date, "unparsable date");
    InsightError::invalid(
      &record.id,
      format!("unparsable date {:?}, expected YYYY-MM-DD", record.date),
    )
  })?;

  if record.exercise_name.trim().is_empty() {
    return Err(InsightError::invalid(&record.id, "exercise name is empty"));
  }

  Ok(SeriesPoint {
    date,
    calories: record.calories,
    duration: record.duration,
    intensity: record.intensity,
    exercise_name: record.exercise_name.trim().to_string(),
    category: ExerciseCategory::classify(&record.exercise_name),
  })
}

/// ---------------------------------------------------------------------------
/// Sliding Window
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SlidingWindow<'a> {
  points: &'a [SeriesPoint],
  size: usize,
  next_end: usize,
}

impl<'a> Iterator for SlidingWindow<'a> {
  type Item = &'a [SeriesPoint];

  fn next(&mut self) -> Option<Self::Item> {
    if self.next_end >= self.points.len() {
      return None;
    }
    let end = self.next_end + 1;
    let start = end.saturating_sub(self.size);
    self.next_end += 1;
    Some(&self.points[start..end])
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.points.len().saturating_sub(self.next_end);
    (remaining, Some(remaining))
  }
}

impl ExactSizeIterator for SlidingWindow<'_> {}

/// ---------------------------------------------------------------------------
/// History Summary (dashboard / history view aggregates)
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
  pub total_sessions: usize,
  pub total_calories: i64,
  pub total_minutes: i64,
  pub avg_calories_per_session: Option<f64>,
  pub calories_per_minute: Option<f64>,
  /// Session counts keyed by category label; unclassified names count as "Other"
  pub sessions_by_category: BTreeMap<String, usize>,
  pub sessions_by_intensity: BTreeMap<String, usize>,
  /// Trailing 7 days ending at the latest record date, oldest first
  pub last_7_days: Vec<DailyTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
  pub date: NaiveDate,
  pub calories: i64,
  pub minutes: i64,
}

impl HistorySummary {
  pub fn compute(series: &HistorySeries) -> Self {
    let points = series.points();
    let total_sessions = points.len();
    let total_calories: i64 = points.iter().map(|p| p.calories).sum();
    let total_minutes: i64 = points.iter().map(|p| p.duration).sum();

    let avg_calories_per_session = if total_sessions > 0 {
      Some(total_calories as f64 / total_sessions as f64)
    } else {
      None
    };
    let calories_per_minute = if total_minutes > 0 {
      Some(total_calories as f64 / total_minutes as f64)
    } else {
      None
    };

    let mut sessions_by_category = BTreeMap::new();
    let mut sessions_by_intensity = BTreeMap::new();
    for p in points {
      let label = p.category.map_or("Other", |c| c.as_str());
      *sessions_by_category.entry(label.to_string()).or_insert(0) += 1;
      *sessions_by_intensity
        .entry(p.intensity.as_str().to_string())
        .or_insert(0) += 1;
    }

    let last_7_days = match series.latest_date() {
      Some(latest) => (0..7)
        .rev()
        .map(|days_back| {
          let date = latest - Duration::days(days_back);
          let day_points = points.iter().filter(move |p| p.date == date);
          DailyTotal {
            date,
            calories: day_points.clone().map(|p| p.calories).sum(),
            minutes: day_points.map(|p| p.duration).sum(),
          }
        })
        .collect(),
      None => Vec::new(),
    };

    Self {
      total_sessions,
      total_calories,
      total_minutes,
      avg_calories_per_session,
      calories_per_minute,
      sessions_by_category,
      sessions_by_intensity,
      last_7_days,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
