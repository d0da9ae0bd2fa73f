//! Rolling-baseline anomaly detection over calorie history
//!
//! Each session is compared with the mean and population standard deviation
//! of the sessions just before it. A session far enough from its own recent
//! baseline is flagged, and the baseline mean is reported as the value that
//! was expected instead.

use serde::{Deserialize, Serialize};

use crate::config::InsightConfig;
use crate::error::InsightError;
use crate::history::{HistorySeries, SeriesPoint};
use crate::models::AnomalyReport;

/// ---------------------------------------------------------------------------
/// Baseline Statistics
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
  pub count: usize,
  pub mean: f64,
  /// Population standard deviation (divides by `count`)
  pub std_dev: f64,
}

impl BaselineStats {
  /// None for an empty window
  pub fn from_window(window: &[SeriesPoint]) -> Option<Self> {
    if window.is_empty() {
      return None;
    }
    let count = window.len();
    let mean = window.iter().map(|p| p.calories as f64).sum::<f64>() / count as f64;
    let variance = window
      .iter()
      .map(|p| {
        let d = p.calories as f64 - mean;
        d * d
      })
      .sum::<f64>()
      / count as f64;

    Some(Self {
      count,
      mean,
      std_dev: variance.sqrt(),
    })
  }
}

/// Outcome for a single point
#[derive(Debug, Clone, Copy, PartialEq)]
struct PointAssessment {
  is_anomaly: bool,
  severity: f64,
  expected: f64,
}

/// ---------------------------------------------------------------------------
/// Detector
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
  min_samples: usize,
  baseline_window: usize,
  z_threshold: f64,
  sigma_floor: f64,
  relative_sigma_floor: f64,
  min_baseline_points: usize,
}

impl AnomalyDetector {
  pub fn new(config: &InsightConfig) -> Self {
    Self {
      min_samples: config.min_samples,
      baseline_window: config.baseline_window,
      z_threshold: config.z_threshold,
      sigma_floor: config.sigma_floor,
      relative_sigma_floor: config.relative_sigma_floor,
      min_baseline_points: config.min_baseline_points.max(1),
    }
  }

  pub fn min_samples(&self) -> usize {
    self.min_samples
  }

  /// Score every point of `series` against its trailing baseline.
  ///
  /// Output arrays are aligned with the sorted series, not with the order the
  /// records were originally supplied in.
  pub fn detect(&self, series: &HistorySeries) -> Result<AnomalyReport, InsightError> {
    if series.len() < self.min_samples {
      return Err(InsightError::InsufficientData {
        required: self.min_samples,
        actual: series.len(),
      });
    }

    tracing::debug!(
      points = series.len(),
      window = self.baseline_window,
      threshold = self.z_threshold,
      "detecting calorie anomalies"
    );

    // Baseline for point i is the window ending at i-1; point 0 gets none.
    let empty: &[SeriesPoint] = &[];
    let baselines = std::iter::once(empty).chain(series.sliding_window(self.baseline_window));

    let n = series.len();
    let mut report = AnomalyReport {
      is_anomaly: Vec::with_capacity(n),
      severity: Vec::with_capacity(n),
      expected_values: Vec::with_capacity(n),
      timestamps: Vec::with_capacity(n),
    };

    for (point, baseline) in series.points().iter().zip(baselines) {
      let assessment = self.assess(point.calories as f64, baseline);
      report.is_anomaly.push(assessment.is_anomaly);
      report.severity.push(assessment.severity);
      report.expected_values.push(assessment.expected);
      report.timestamps.push(point.date);
    }

    tracing::info!(
      points = n,
      anomalies = report.anomaly_count(),
      "anomaly detection complete"
    );

    Ok(report)
  }

  fn assess(&self, value: f64, baseline: &[SeriesPoint]) -> PointAssessment {
    let stats = match BaselineStats::from_window(baseline) {
      Some(stats) if stats.count >= self.min_baseline_points => stats,
      _ => {
        return PointAssessment {
          is_anomaly: false,
          severity: 0.0,
          expected: value,
        }
      }
    };

    // Perfectly constant baseline: any change at all is a full-scale anomaly
    if stats.std_dev == 0.0 {
      let deviates = value != stats.mean;
      return PointAssessment {
        is_anomaly: deviates,
        severity: if deviates { 1.0 } else { 0.0 },
        expected: stats.mean,
      };
    }

    let floor = self.sigma_floor.max(self.relative_sigma_floor * stats.mean.abs());
    let z = (value - stats.mean).abs() / stats.std_dev.max(floor);

    PointAssessment {
      is_anomaly: z >= self.z_threshold,
      severity: (z / (self.z_threshold * 2.0)).clamp(0.0, 1.0),
      expected: stats.mean,
    }
  }
}

/// Convenience wrapper: `AnomalyDetector::new(config).detect(series)`
pub fn detect(
  series: &HistorySeries,
  config: &InsightConfig,
) -> Result<AnomalyReport, InsightError> {
  AnomalyDetector::new(config).detect(series)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
