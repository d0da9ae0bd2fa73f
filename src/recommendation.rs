//! Next-workout recommendation engine
//!
//! Three signals are read from recent history:
//! - recency-weighted intensity load (overtraining risk)
//! - variety gap (distinct exercise types vs target)
//! - recovery signal (recent hard sessions, or a run of light days)
//!
//! Every catalog category is scored with one reproducible formula and the
//! justification is assembled from whichever signals moved that score.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::InsightConfig;
use crate::history::{HistorySeries, SeriesPoint};
use crate::models::{ExerciseCategory, Intensity, Recommendation};

/// Confidence weights
const BASE_CONFIDENCE: f64 = 0.5;
const RECOVERY_WEIGHT: f64 = 0.25;
const OVERTRAINING_WEIGHT: f64 = 0.2;
const VARIETY_WEIGHT: f64 = 0.15;

/// Signal magnitude below which a term is not worth mentioning
const NOTABLE_SIGNAL: f64 = 0.25;

/// ---------------------------------------------------------------------------
/// Catalog
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
  pub category: ExerciseCategory,
  pub min_duration: u32,
  pub max_duration: u32,
  pub default_intensity: Intensity,
}

pub const CATALOG: [CatalogEntry; 4] = [
  CatalogEntry {
    category: ExerciseCategory::Cardio,
    min_duration: 20,
    max_duration: 45,
    default_intensity: Intensity::Medium,
  },
  CatalogEntry {
    category: ExerciseCategory::StrengthTraining,
    min_duration: 30,
    max_duration: 60,
    default_intensity: Intensity::Medium,
  },
  CatalogEntry {
    category: ExerciseCategory::FlexibilityRecovery,
    min_duration: 15,
    max_duration: 30,
    default_intensity: Intensity::Low,
  },
  CatalogEntry {
    category: ExerciseCategory::CrossTraining,
    min_duration: 30,
    max_duration: 50,
    default_intensity: Intensity::Medium,
  },
];

impl CatalogEntry {
  /// Intensity actually prescribed: Cardio and Strength step up to high when
  /// the recovery signal calls for progression.
  fn prescribed_intensity(&self, recovery: &RecoverySignal) -> Intensity {
    match (recovery, self.category) {
      (
        RecoverySignal::Progression { .. },
        ExerciseCategory::Cardio | ExerciseCategory::StrengthTraining,
      ) => Intensity::High,
      _ => self.default_intensity,
    }
  }

  /// Interpolate within the duration range: high load shortens, light load
  /// lengthens. Rounded to the nearest 5 minutes.
  fn duration_for(&self, overtraining_risk: f64) -> u32 {
    let t = (0.5 - 0.5 * overtraining_risk).clamp(0.0, 1.0);
    let span = (self.max_duration - self.min_duration) as f64;
    let raw = self.min_duration as f64 + t * span;
    let rounded = ((raw / 5.0).round() * 5.0) as u32;
    rounded.clamp(self.min_duration, self.max_duration)
  }
}

/// ---------------------------------------------------------------------------
/// History Features
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoverySignal {
  /// Most recent session(s) were high intensity. Strength 1.0 for two in a
  /// row, 0.5 for one.
  Recovery { strength: f64, high_sessions: usize },
  /// Daily load has been light for `low_days` consecutive days
  Progression { low_days: usize },
  Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryFeatures {
  pub latest_date: NaiveDate,
  pub lookback_sessions: usize,
  /// Recency-decayed intensity-weighted minutes
  pub load: f64,
  pub reference_load: f64,
  /// load / reference - 1, clamped to [-1, 1]
  pub overtraining_risk: f64,
  pub distinct_types: usize,
  pub variety_target: usize,
  /// Share of the variety target still missing, in [0, 1]
  pub variety_gap: f64,
  pub recovery: RecoverySignal,
}

impl HistoryFeatures {
  /// None for an empty series
  pub fn extract(series: &HistorySeries, config: &InsightConfig) -> Option<Self> {
    let latest_date = series.latest_date()?;
    let days_ago = |p: &SeriesPoint| (latest_date - p.date).num_days();

    // Time-bounded first, then count-bounded (whichever is smaller)
    let in_window: Vec<&SeriesPoint> = series
      .points()
      .iter()
      .filter(|p| days_ago(*p) < config.lookback_days)
      .collect();
    let skip = in_window.len().saturating_sub(config.lookback_records);
    let lookback = &in_window[skip..];

    // Unvalidated configs must not turn the load into NaN
    let half_life = config.half_life_days.max(f64::EPSILON);
    let reference_load = config.reference_load.max(f64::EPSILON);
    let load: f64 = lookback
      .iter()
      .map(|p| p.load() * 0.5_f64.powf(days_ago(*p) as f64 / half_life))
      .sum();
    let overtraining_risk = (load / reference_load - 1.0).clamp(-1.0, 1.0);

    let distinct_types = lookback
      .iter()
      .map(|p| p.exercise_key())
      .collect::<HashSet<_>>()
      .len();
    let target = config.variety_target.max(1);
    let variety_gap =
      (target.saturating_sub(distinct_types) as f64 / target as f64).clamp(0.0, 1.0);

    let recovery = Self::recovery_signal(series, lookback, latest_date, config);

    Some(Self {
      latest_date,
      lookback_sessions: lookback.len(),
      load,
      reference_load,
      overtraining_risk,
      distinct_types,
      variety_target: target,
      variety_gap,
      recovery,
    })
  }

  fn recovery_signal(
    series: &HistorySeries,
    lookback: &[&SeriesPoint],
    latest_date: NaiveDate,
    config: &InsightConfig,
  ) -> RecoverySignal {
    let recent_high = lookback
      .iter()
      .rev()
      .take(2)
      .take_while(|p| p.intensity == Intensity::High)
      .count();

    match recent_high {
      2 => {
        return RecoverySignal::Recovery {
          strength: 1.0,
          high_sessions: 2,
        }
      }
      1 => {
        return RecoverySignal::Recovery {
          strength: 0.5,
          high_sessions: 1,
        }
      }
      _ => {}
    }

    let low_days = Self::low_load_streak(series, latest_date, config);
    if low_days >= config.low_load_streak_days {
      RecoverySignal::Progression { low_days }
    } else {
      RecoverySignal::Neutral
    }
  }

  /// Consecutive calendar days, ending at the latest session, whose total
  /// load stayed under the daily threshold. Never reaches back past the
  /// first recorded session or the lookback window.
  fn low_load_streak(
    series: &HistorySeries,
    latest_date: NaiveDate,
    config: &InsightConfig,
  ) -> usize {
    let first_date = match series.points().first() {
      Some(p) => p.date,
      None => return 0,
    };
    let horizon = (latest_date - first_date).num_days().min(config.lookback_days - 1);

    let mut streak = 0;
    for days_back in 0..=horizon {
      let day = latest_date - Duration::days(days_back);
      let day_load: f64 = series
        .points()
        .iter()
        .filter(|p| p.date == day)
        .map(|p| p.load())
        .sum();
      if day_load >= config.low_load_daily_threshold {
        break;
      }
      streak += 1;
    }
    streak
  }
}

/// ---------------------------------------------------------------------------
/// Candidate Scoring
/// ---------------------------------------------------------------------------

/// The three bounded terms feeding the confidence formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTerms {
  pub recovery_alignment: f64,
  pub overtraining_risk: f64,
  pub variety_bonus: f64,
}

impl ScoreTerms {
  fn compute(category: ExerciseCategory, intensity: Intensity, features: &HistoryFeatures) -> Self {
    let recovery_alignment = match features.recovery {
      RecoverySignal::Recovery { strength, .. } => {
        strength
          * match intensity {
            Intensity::Low => 1.0,
            Intensity::Medium => -0.5,
            Intensity::High => -1.0,
          }
      }
      RecoverySignal::Progression { .. } => match intensity {
        Intensity::High => 1.0,
        Intensity::Medium => 0.5,
        Intensity::Low => -0.5,
      },
      RecoverySignal::Neutral => 0.0,
    };

    // Light sessions relieve accumulated load rather than adding to it
    let intensity_factor = match intensity {
      Intensity::High => 1.0,
      Intensity::Medium => 0.5,
      Intensity::Low => -0.5,
    };
    let overtraining_risk = features.overtraining_risk * intensity_factor;

    let variety_bonus = match category {
      ExerciseCategory::CrossTraining => features.variety_gap,
      ExerciseCategory::Cardio | ExerciseCategory::StrengthTraining => -features.variety_gap,
      ExerciseCategory::FlexibilityRecovery => 0.0,
    };

    Self {
      recovery_alignment: recovery_alignment.clamp(-1.0, 1.0),
      overtraining_risk: overtraining_risk.clamp(-1.0, 1.0),
      variety_bonus: variety_bonus.clamp(-1.0, 1.0),
    }
  }

  /// clamp(0.5 + 0.25*recovery - 0.2*risk + 0.15*variety, 0, 1), to 2 dp
  pub fn confidence(&self) -> f64 {
    let raw = BASE_CONFIDENCE + RECOVERY_WEIGHT * self.recovery_alignment
      - OVERTRAINING_WEIGHT * self.overtraining_risk
      + VARIETY_WEIGHT * self.variety_bonus;
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
  }
}

/// ---------------------------------------------------------------------------
/// Engine
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecommendationEngine {
  config: InsightConfig,
}

impl RecommendationEngine {
  pub fn new(config: &InsightConfig) -> Self {
    Self {
      config: config.clone(),
    }
  }

  /// Ranked next-workout suggestions, highest confidence first.
  ///
  /// Total for any valid series: an empty history yields the cold-start
  /// suggestion instead of an error.
  pub fn recommend(&self, series: &HistorySeries) -> Vec<Recommendation> {
    let features = match HistoryFeatures::extract(series, &self.config) {
      Some(features) => features,
      None => {
        tracing::debug!("no exercise history, returning cold-start recommendation");
        return vec![cold_start()];
      }
    };

    tracing::debug!(
      lookback_sessions = features.lookback_sessions,
      load = features.load,
      risk = features.overtraining_risk,
      distinct_types = features.distinct_types,
      recovery = ?features.recovery,
      "extracted recommendation features"
    );

    let mut recommendations: Vec<Recommendation> = CATALOG
      .iter()
      .map(|entry| score_candidate(entry, &features))
      .collect();

    recommendations.sort_by(rank_order);
    recommendations.truncate(self.config.max_recommendations.max(1));

    tracing::info!(
      count = recommendations.len(),
      top = %recommendations[0].exercise_type,
      confidence = recommendations[0].confidence_score,
      "generated recommendations"
    );

    recommendations
  }
}

/// Convenience wrapper: `RecommendationEngine::new(config).recommend(series)`
pub fn recommend(series: &HistorySeries, config: &InsightConfig) -> Vec<Recommendation> {
  RecommendationEngine::new(config).recommend(series)
}

/// Highest confidence first, then declared category priority
fn rank_order(a: &Recommendation, b: &Recommendation) -> Ordering {
  b.confidence_score
    .total_cmp(&a.confidence_score)
    .then_with(|| a.exercise_type.priority().cmp(&b.exercise_type.priority()))
}

fn cold_start() -> Recommendation {
  Recommendation {
    exercise_type: ExerciseCategory::Cardio,
    duration: 30,
    intensity: Intensity::Medium,
    confidence_score: BASE_CONFIDENCE,
    reason: "No exercise history yet - a moderate 30 minute cardio session is a safe starting point."
      .to_string(),
  }
}

fn score_candidate(entry: &CatalogEntry, features: &HistoryFeatures) -> Recommendation {
  let intensity = entry.prescribed_intensity(&features.recovery);
  let terms = ScoreTerms::compute(entry.category, intensity, features);
  let duration = entry.duration_for(features.overtraining_risk);

  Recommendation {
    exercise_type: entry.category,
    duration,
    intensity,
    confidence_score: terms.confidence(),
    reason: justify(entry.category, intensity, &terms, features),
  }
}

/// ---------------------------------------------------------------------------
/// Justification
/// ---------------------------------------------------------------------------

fn justify(
  category: ExerciseCategory,
  intensity: Intensity,
  terms: &ScoreTerms,
  features: &HistoryFeatures,
) -> String {
  let mut reasons: Vec<String> = Vec::new();

  match features.recovery {
    RecoverySignal::Recovery { high_sessions, .. } => {
      let sessions = if high_sessions == 1 {
        "your last session was".to_string()
      } else {
        format!("your last {} sessions were", high_sessions)
      };
      if terms.recovery_alignment > 0.0 {
        reasons.push(format!(
          "{} high intensity, so {} intensity work helps you absorb the recent high load",
          sessions, intensity
        ));
      } else {
        reasons.push(format!(
          "{} high intensity, so {} intensity {} now adds to the recent high load",
          sessions,
          intensity,
          category.as_str().to_lowercase()
        ));
      }
    }
    RecoverySignal::Progression { low_days } => {
      if terms.recovery_alignment > 0.0 {
        reasons.push(format!(
          "training load has stayed light for {} consecutive days, leaving room to progress to {} intensity",
          low_days, intensity
        ));
      } else {
        reasons.push(format!(
          "after {} consecutive light days a {} intensity session does little to build fitness",
          low_days, intensity
        ));
      }
    }
    RecoverySignal::Neutral => {}
  }

  if features.overtraining_risk >= NOTABLE_SIGNAL {
    reasons.push(format!(
      "recent training load is high ({:.0} vs {:.0} reference intensity-minutes), so the session is kept short",
      features.load, features.reference_load
    ));
  } else if features.overtraining_risk <= -NOTABLE_SIGNAL {
    reasons.push(format!(
      "recent training load is light ({:.0} intensity-minutes), so a longer session is affordable",
      features.load
    ));
  }

  if terms.variety_bonus > 0.0 {
    reasons.push(format!(
      "only {} distinct exercise type(s) in your recent sessions (target {}), and mixing modalities broadens your training",
      features.distinct_types, features.variety_target
    ));
  } else if terms.variety_bonus < 0.0 {
    reasons.push(format!(
      "only {} distinct exercise type(s) recently (target {}), so more single-modality {} is less valuable",
      features.distinct_types,
      features.variety_target,
      category.as_str().to_lowercase()
    ));
  }

  if reasons.is_empty() {
    reasons.push(format!(
      "recent training is balanced, and a steady {} session maintains your routine",
      category.as_str().to_lowercase()
    ));
  }

  let mut text = reasons.join("; ");
  if let Some(first) = text.get(0..1) {
    let upper = first.to_uppercase();
    text.replace_range(0..1, &upper);
  }
  text.push('.');
  text
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::ExerciseRecord;
  use crate::test_utils::{calorie_records, make_session};

  fn series(records: &[ExerciseRecord]) -> HistorySeries {
    HistorySeries::build(records).unwrap()
  }

  fn hard_finish_records() -> Vec<ExerciseRecord> {
    vec![
      make_session("1", 0, "Running", 45, Intensity::Medium),
      make_session("2", 1, "Weight Training", 40, Intensity::Medium),
      make_session("3", 2, "Yoga", 30, Intensity::Low),
      make_session("4", 3, "Running", 60, Intensity::High),
      make_session("5", 4, "Cycling", 60, Intensity::High),
    ]
  }

  #[test]
  fn test_cold_start() {
    // Act
    let recs = recommend(&HistorySeries::default(), &InsightConfig::default());

    // Assert: exactly one moderate cardio suggestion
    assert_eq!(recs.len(), 1);
    let rec = &recs[0];
    assert_eq!(rec.exercise_type, ExerciseCategory::Cardio);
    assert_eq!(rec.intensity, Intensity::Medium);
    assert_eq!(rec.duration, 30);
    assert_eq!(rec.confidence_score, 0.5);
    assert!(rec.reason.contains("No exercise history"));
  }

  #[test]
  fn test_two_high_sessions_bias_toward_recovery() {
    // Arrange
    let series = series(&hard_finish_records());

    // Act
    let recs = recommend(&series, &InsightConfig::default());

    // Assert: recovery work on top, justified by the recent hard sessions
    let top = &recs[0];
    assert_eq!(top.exercise_type, ExerciseCategory::FlexibilityRecovery);
    assert_eq!(top.intensity, Intensity::Low);
    assert!(top.reason.contains("last 2 sessions were high intensity"), "{}", top.reason);
    assert!(top.reason.contains("high load"), "{}", top.reason);
    assert!(recs[1..].iter().all(|r| r.confidence_score < top.confidence_score));
  }

  #[test]
  fn test_recovery_features() {
    let series = series(&hard_finish_records());

    let features = HistoryFeatures::extract(&series, &InsightConfig::default()).unwrap();

    assert_eq!(
      features.recovery,
      RecoverySignal::Recovery {
        strength: 1.0,
        high_sessions: 2
      }
    );
    assert_eq!(features.distinct_types, 4);
    assert_eq!(features.variety_gap, 0.0);
    // 180 + 180*2^(-1/3) + 30*2^(-2/3) + 80*2^(-1) + 90*2^(-4/3)
    assert!((features.load - 417.5).abs() < 1.0, "load {}", features.load);
    assert!(features.overtraining_risk > 0.7);
  }

  #[test]
  fn test_single_high_session_is_half_strength_recovery() {
    let records = vec![
      make_session("1", 0, "Running", 30, Intensity::Medium),
      make_session("2", 1, "Running", 30, Intensity::Low),
      make_session("3", 2, "Running", 30, Intensity::High),
    ];

    let features = HistoryFeatures::extract(&series(&records), &InsightConfig::default()).unwrap();

    assert_eq!(
      features.recovery,
      RecoverySignal::Recovery {
        strength: 0.5,
        high_sessions: 1
      }
    );
  }

  #[test]
  fn test_light_streak_biases_toward_progression() {
    // Arrange: six easy days, three different activities
    let names = ["Walking", "Stretching", "Swimming"];
    let records: Vec<ExerciseRecord> = (0..6)
      .map(|day| make_session(&day.to_string(), day, names[day as usize % 3], 20, Intensity::Low))
      .collect();
    let series = series(&records);

    // Act
    let features = HistoryFeatures::extract(&series, &InsightConfig::default()).unwrap();
    let recs = recommend(&series, &InsightConfig::default());

    // Assert
    assert_eq!(features.recovery, RecoverySignal::Progression { low_days: 6 });
    let top = &recs[0];
    assert_eq!(top.exercise_type, ExerciseCategory::Cardio);
    assert_eq!(top.intensity, Intensity::High);
    assert!(top.reason.contains("6 consecutive days"), "{}", top.reason);
    assert!(top.duration >= 35, "light load should lengthen the session");
  }

  #[test]
  fn test_streak_does_not_reach_before_first_session() {
    // Two light days of history is not enough evidence for progression
    let records = vec![
      make_session("1", 0, "Walking", 20, Intensity::Low),
      make_session("2", 1, "Walking", 20, Intensity::Low),
    ];

    let features = HistoryFeatures::extract(&series(&records), &InsightConfig::default()).unwrap();

    assert_eq!(features.recovery, RecoverySignal::Neutral);
  }

  #[test]
  fn test_low_variety_favours_cross_training() {
    // Arrange: the same run every other day
    let records: Vec<ExerciseRecord> = (0..5)
      .map(|i| make_session(&i.to_string(), i * 2, "Running", 30, Intensity::Medium))
      .collect();

    // Act
    let recs = recommend(&series(&records), &InsightConfig::default());

    // Assert
    let top = &recs[0];
    assert_eq!(top.exercise_type, ExerciseCategory::CrossTraining);
    assert!(top.reason.contains("1 distinct exercise type"), "{}", top.reason);
    let cardio = recs
      .iter()
      .find(|r| r.exercise_type == ExerciseCategory::Cardio)
      .unwrap();
    assert!(cardio.confidence_score < top.confidence_score);
    assert!(cardio.reason.contains("less valuable"), "{}", cardio.reason);
  }

  #[test]
  fn test_lookback_bounds() {
    // 20 daily sessions: the count bound (10) is the tighter one
    let records = calorie_records(&[300; 20]);
    let features = HistoryFeatures::extract(&series(&records), &InsightConfig::default()).unwrap();
    assert_eq!(features.lookback_sessions, 10);

    // Old history outside 14 days is ignored entirely
    let records = vec![
      make_session("old-1", 0, "Swimming", 60, Intensity::High),
      make_session("old-2", 1, "Cycling", 60, Intensity::High),
      make_session("new", 30, "Running", 30, Intensity::Medium),
    ];
    let features = HistoryFeatures::extract(&series(&records), &InsightConfig::default()).unwrap();
    assert_eq!(features.lookback_sessions, 1);
    assert_eq!(features.distinct_types, 1);
    assert_eq!(features.load, 60.0);
  }

  #[test]
  fn test_confidence_bounded_under_extreme_load() {
    let records: Vec<ExerciseRecord> = (0..10)
      .map(|i| make_session(&i.to_string(), i, "Running", 240, Intensity::High))
      .collect();

    let recs = recommend(
      &series(&records),
      &InsightConfig {
        max_recommendations: 4,
        ..InsightConfig::default()
      },
    );

    assert_eq!(recs.len(), 4);
    for rec in &recs {
      assert!((0.0..=1.0).contains(&rec.confidence_score));
      assert!(rec.duration > 0);
    }
    // High load shortens everything to the bottom of its range
    let cardio = recs
      .iter()
      .find(|r| r.exercise_type == ExerciseCategory::Cardio)
      .unwrap();
    assert_eq!(cardio.duration, 20);
  }

  #[test]
  fn test_ties_broken_by_category_priority() {
    let records = hard_finish_records();

    let recs = recommend(
      &series(&records),
      &InsightConfig {
        max_recommendations: 4,
        ..InsightConfig::default()
      },
    );

    // Cardio, Strength and Cross-training score identically here
    let tail: Vec<ExerciseCategory> = recs[1..].iter().map(|r| r.exercise_type).collect();
    assert_eq!(
      tail,
      vec![
        ExerciseCategory::Cardio,
        ExerciseCategory::StrengthTraining,
        ExerciseCategory::CrossTraining,
      ]
    );
    assert_eq!(recs[1].confidence_score, recs[3].confidence_score);
  }

  #[test]
  fn test_recommend_is_idempotent_and_order_invariant() {
    let records = hard_finish_records();
    let mut shuffled = records.clone();
    shuffled.reverse();
    shuffled.swap(1, 3);
    let config = InsightConfig::default();

    let a = serde_json::to_string(&recommend(&series(&records), &config)).unwrap();
    let b = serde_json::to_string(&recommend(&series(&records), &config)).unwrap();
    let c = serde_json::to_string(&recommend(&series(&shuffled), &config)).unwrap();

    assert_eq!(a, b);
    assert_eq!(a, c);
  }

  #[test]
  fn test_score_terms_formula() {
    let terms = ScoreTerms {
      recovery_alignment: 1.0,
      overtraining_risk: -0.5,
      variety_bonus: 0.0,
    };
    // 0.5 + 0.25 + 0.1
    assert_eq!(terms.confidence(), 0.85);

    let saturated = ScoreTerms {
      recovery_alignment: 1.0,
      overtraining_risk: -1.0,
      variety_bonus: 1.0,
    };
    assert_eq!(saturated.confidence(), 1.0);
  }

  #[test]
  fn test_degenerate_config_keeps_scores_finite() {
    // Arrange: zero half-life and reference load bypass validation
    let config = InsightConfig {
      half_life_days: 0.0,
      reference_load: 0.0,
      ..InsightConfig::default()
    };
    let series = series(&hard_finish_records());

    // Act
    let features = HistoryFeatures::extract(&series, &config).unwrap();
    let recs = recommend(&series, &config);

    // Assert: only the latest day's sessions carry weight
    assert_eq!(features.load, 180.0);
    assert_eq!(features.overtraining_risk, 1.0);
    for rec in &recs {
      assert!(rec.confidence_score.is_finite());
      assert!((0.0..=1.0).contains(&rec.confidence_score));
    }
  }
}
