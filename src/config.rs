//! Engine configuration
//!
//! One flat options struct threaded into every engine call. Nothing here is
//! global: tests build their own `InsightConfig` to probe boundary thresholds.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

pub const DEFAULT_MIN_SAMPLES: usize = 5;
pub const DEFAULT_BASELINE_WINDOW: usize = 5;
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;
pub const DEFAULT_SIGMA_FLOOR: f64 = 1.0;
pub const DEFAULT_RELATIVE_SIGMA_FLOOR: f64 = 0.05;
pub const DEFAULT_MIN_BASELINE_POINTS: usize = 1;

pub const DEFAULT_HALF_LIFE_DAYS: f64 = 3.0;
pub const DEFAULT_VARIETY_TARGET: usize = 3;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 14;
pub const DEFAULT_LOOKBACK_RECORDS: usize = 10;
pub const DEFAULT_REFERENCE_LOAD: f64 = 240.0;
pub const DEFAULT_LOW_LOAD_DAILY_THRESHOLD: f64 = 60.0;
pub const DEFAULT_LOW_LOAD_STREAK_DAYS: usize = 3;
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 3;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {key}: {value:?}")]
  Invalid { key: String, value: String },

  #[error("{key} out of range: {reason}")]
  OutOfRange { key: String, reason: String },
}

/// ---------------------------------------------------------------------------
/// Insight Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
  // Anomaly detection
  /// Minimum series length before anomaly detection runs
  pub min_samples: usize,
  /// Number of prior points in each baseline window
  pub baseline_window: usize,
  /// Deviation (in baseline standard deviations) at which a point is flagged
  pub z_threshold: f64,
  /// Absolute floor on the baseline standard deviation
  pub sigma_floor: f64,
  /// Floor on the baseline standard deviation as a fraction of the baseline mean
  pub relative_sigma_floor: f64,
  /// Points with fewer prior points than this have no baseline
  pub min_baseline_points: usize,

  // Recommendations
  pub half_life_days: f64,
  pub variety_target: usize,
  pub lookback_days: i64,
  pub lookback_records: usize,
  /// Recency-weighted load considered a "normal" training week
  pub reference_load: f64,
  /// Daily intensity-weighted minutes below which a day counts as light
  pub low_load_daily_threshold: f64,
  pub low_load_streak_days: usize,
  pub max_recommendations: usize,
}

impl Default for InsightConfig {
  fn default() -> Self {
    Self {
      min_samples: DEFAULT_MIN_SAMPLES,
      baseline_window: DEFAULT_BASELINE_WINDOW,
      z_threshold: DEFAULT_Z_THRESHOLD,
      sigma_floor: DEFAULT_SIGMA_FLOOR,
      relative_sigma_floor: DEFAULT_RELATIVE_SIGMA_FLOOR,
      min_baseline_points: DEFAULT_MIN_BASELINE_POINTS,
      half_life_days: DEFAULT_HALF_LIFE_DAYS,
      variety_target: DEFAULT_VARIETY_TARGET,
      lookback_days: DEFAULT_LOOKBACK_DAYS,
      lookback_records: DEFAULT_LOOKBACK_RECORDS,
      reference_load: DEFAULT_REFERENCE_LOAD,
      low_load_daily_threshold: DEFAULT_LOW_LOAD_DAILY_THRESHOLD,
      low_load_streak_days: DEFAULT_LOW_LOAD_STREAK_DAYS,
      max_recommendations: DEFAULT_MAX_RECOMMENDATIONS,
    }
  }
}

impl InsightConfig {
  /// Load overrides from `INSIGHT_*` environment variables (and `.env`).
  /// Unset variables keep their defaults.
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();

    let defaults = Self::default();
    let config = Self {
      min_samples: env_or("INSIGHT_MIN_SAMPLES", defaults.min_samples)?,
      baseline_window: env_or("INSIGHT_BASELINE_WINDOW", defaults.baseline_window)?,
      z_threshold: env_or("INSIGHT_Z_THRESHOLD", defaults.z_threshold)?,
      sigma_floor: env_or("INSIGHT_SIGMA_FLOOR", defaults.sigma_floor)?,
      relative_sigma_floor: env_or("INSIGHT_RELATIVE_SIGMA_FLOOR", defaults.relative_sigma_floor)?,
      min_baseline_points: env_or("INSIGHT_MIN_BASELINE_POINTS", defaults.min_baseline_points)?,
      half_life_days: env_or("INSIGHT_HALF_LIFE_DAYS", defaults.half_life_days)?,
      variety_target: env_or("INSIGHT_VARIETY_TARGET", defaults.variety_target)?,
      lookback_days: env_or("INSIGHT_LOOKBACK_DAYS", defaults.lookback_days)?,
      lookback_records: env_or("INSIGHT_LOOKBACK_RECORDS", defaults.lookback_records)?,
      reference_load: env_or("INSIGHT_REFERENCE_LOAD", defaults.reference_load)?,
      low_load_daily_threshold: env_or(
        "INSIGHT_LOW_LOAD_DAILY_THRESHOLD",
        defaults.low_load_daily_threshold,
      )?,
      low_load_streak_days: env_or("INSIGHT_LOW_LOAD_STREAK_DAYS", defaults.low_load_streak_days)?,
      max_recommendations: env_or("INSIGHT_MAX_RECOMMENDATIONS", defaults.max_recommendations)?,
    };

    config.validate()?;
    Ok(config)
  }

  /// Reject settings the engines cannot run with
  pub fn validate(&self) -> Result<(), ConfigError> {
    fn out_of_range(key: &str, reason: &str) -> Result<(), ConfigError> {
      Err(ConfigError::OutOfRange {
        key: key.to_string(),
        reason: reason.to_string(),
      })
    }

    if self.min_samples < 1 {
      return out_of_range("min_samples", "must be at least 1");
    }
    if self.baseline_window < 1 {
      return out_of_range("baseline_window", "must be at least 1");
    }
    if !(self.z_threshold.is_finite() && self.z_threshold > 0.0) {
      return out_of_range("z_threshold", "must be a positive number");
    }
    if !(self.sigma_floor.is_finite() && self.sigma_floor > 0.0) {
      return out_of_range("sigma_floor", "must be a positive number");
    }
    if !(self.relative_sigma_floor.is_finite() && self.relative_sigma_floor >= 0.0) {
      return out_of_range("relative_sigma_floor", "must be zero or positive");
    }
    if self.min_baseline_points < 1 {
      return out_of_range("min_baseline_points", "must be at least 1");
    }
    if !(self.half_life_days.is_finite() && self.half_life_days > 0.0) {
      return out_of_range("half_life_days", "must be a positive number");
    }
    if self.variety_target < 1 {
      return out_of_range("variety_target", "must be at least 1");
    }
    if self.lookback_days < 1 {
      return out_of_range("lookback_days", "must be at least 1");
    }
    if self.lookback_records < 1 {
      return out_of_range("lookback_records", "must be at least 1");
    }
    if !(self.reference_load.is_finite() && self.reference_load > 0.0) {
      return out_of_range("reference_load", "must be a positive number");
    }
    if !(self.low_load_daily_threshold.is_finite() && self.low_load_daily_threshold >= 0.0) {
      return out_of_range("low_load_daily_threshold", "must be zero or positive");
    }
    if self.low_load_streak_days < 1 {
      return out_of_range("low_load_streak_days", "must be at least 1");
    }
    if self.max_recommendations < 1 {
      return out_of_range("max_recommendations", "must be at least 1");
    }
    Ok(())
  }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
  match env::var(key) {
    Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
      key: key.to_string(),
      value: raw,
    }),
    Err(_) => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  fn test_defaults_are_valid() {
    let config = InsightConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.min_samples, 5);
    assert_eq!(config.baseline_window, 5);
    assert_eq!(config.z_threshold, 2.0);
    assert_eq!(config.half_life_days, 3.0);
    assert_eq!(config.variety_target, 3);
    assert_eq!(config.lookback_days, 14);
    assert_eq!(config.lookback_records, 10);
  }

  #[test]
  #[serial]
  fn test_from_env_overrides() {
    temp_env::with_vars(
      [
        ("INSIGHT_BASELINE_WINDOW", Some("7")),
        ("INSIGHT_Z_THRESHOLD", Some("2.5")),
        ("INSIGHT_MIN_SAMPLES", None),
      ],
      || {
        let config = InsightConfig::from_env().unwrap();
        assert_eq!(config.baseline_window, 7);
        assert_eq!(config.z_threshold, 2.5);
        assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);
      },
    );
  }

  #[test]
  #[serial]
  fn test_from_env_rejects_garbage() {
    temp_env::with_var("INSIGHT_HALF_LIFE_DAYS", Some("three"), || {
      let err = InsightConfig::from_env().unwrap_err();
      assert_eq!(
        err,
        ConfigError::Invalid {
          key: "INSIGHT_HALF_LIFE_DAYS".to_string(),
          value: "three".to_string(),
        }
      );
    });
  }

  #[test]
  #[serial]
  fn test_from_env_rejects_out_of_range() {
    temp_env::with_var("INSIGHT_BASELINE_WINDOW", Some("0"), || {
      let err = InsightConfig::from_env().unwrap_err();
      assert!(matches!(err, ConfigError::OutOfRange { ref key, .. } if key == "baseline_window"));
    });
  }

  #[test]
  fn test_validate_rejects_non_positive_threshold() {
    let config = InsightConfig {
      z_threshold: 0.0,
      ..InsightConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn test_partial_json_uses_defaults() {
    let config: InsightConfig = serde_json::from_str(r#"{"baseline_window": 3}"#).unwrap();
    assert_eq!(config.baseline_window, 3);
    assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);
  }
}
