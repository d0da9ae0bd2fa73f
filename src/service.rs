//! Insight service
//!
//! Orchestrates record loading, normalization and both engines for callers.
//! Records come from an async `RecordSource`. Results can be memoized per
//! (student, history content) with single-flight semantics: concurrent
//! identical requests share one computation.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::anomaly::AnomalyDetector;
use crate::config::InsightConfig;
use crate::error::InsightError;
use crate::history::{HistorySeries, HistorySummary};
use crate::models::{AnomalyReport, ExerciseRecord, FlaggedSession, Recommendation};
use crate::recommendation::RecommendationEngine;

/// ---------------------------------------------------------------------------
/// Record Source
/// ---------------------------------------------------------------------------

/// Loads a student's exercise records from wherever the application keeps them
#[async_trait]
pub trait RecordSource: Send + Sync {
  async fn load_records(&self, student_id: &str) -> Result<Vec<ExerciseRecord>, InsightError>;
}

/// ---------------------------------------------------------------------------
/// Memo Cache
/// ---------------------------------------------------------------------------

/// One slot per student, holding the result for their latest history content
struct MemoSlot<T> {
  content_hash: String,
  cell: Arc<OnceCell<T>>,
}

impl<T> MemoSlot<T> {
  fn new(content_hash: String) -> Self {
    Self {
      content_hash,
      cell: Arc::new(OnceCell::new()),
    }
  }
}

type Memo<T> = DashMap<String, MemoSlot<T>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
  pub lookups: usize,
  pub computations: usize,
  /// Slots currently held across both result kinds
  pub entries: usize,
}

#[derive(Default)]
struct MemoCache {
  recommendations: Memo<Vec<Recommendation>>,
  anomalies: Memo<AnomalyReport>,
  lookups: AtomicUsize,
  computations: AtomicUsize,
}

impl MemoCache {
  /// Return the cached value for (`student_id`, `content_hash`), computing it
  /// at most once. A newer hash replaces the student's slot. A failed
  /// computation removes the slot so the next caller retries.
  async fn get_or_compute<T, F>(
    &self,
    memo: &Memo<T>,
    student_id: &str,
    content_hash: String,
    compute: F,
  ) -> Result<T, InsightError>
  where
    T: Clone,
    F: FnOnce() -> Result<T, InsightError>,
  {
    self.lookups.fetch_add(1, Ordering::SeqCst);

    let cell = {
      let mut slot = memo
        .entry(student_id.to_string())
        .or_insert_with(|| MemoSlot::new(content_hash.clone()));
      if slot.content_hash != content_hash {
        tracing::debug!(student_id, "history changed, replacing cached result");
        *slot = MemoSlot::new(content_hash.clone());
      }
      slot.cell.clone()
    };

    let result = cell
      .get_or_try_init(|| async move {
        self.computations.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(student_id, "insight cache miss");
        compute()
      })
      .await
      .map(|value| value.clone());

    if result.is_err() {
      memo.remove_if(student_id, |_, slot| {
        slot.content_hash == content_hash && slot.cell.get().is_none()
      });
    }

    result
  }

  fn stats(&self) -> CacheStats {
    CacheStats {
      lookups: self.lookups.load(Ordering::SeqCst),
      computations: self.computations.load(Ordering::SeqCst),
      entries: self.recommendations.len() + self.anomalies.len(),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Results
/// ---------------------------------------------------------------------------

/// Everything the history view needs in one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightBundle {
  pub student_id: String,
  pub recommendations: Vec<Recommendation>,
  /// None when detection could not run; see `warnings`
  pub anomalies: Option<AnomalyReport>,
  pub warnings: Vec<String>,
}

/// An anomaly report joined back to the sessions it flagged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReview {
  pub student_id: String,
  pub report: AnomalyReport,
  pub flagged: Vec<FlaggedSession>,
  pub message: String,
}

/// ---------------------------------------------------------------------------
/// Service
/// ---------------------------------------------------------------------------

pub struct InsightService<S> {
  source: S,
  config: InsightConfig,
  detector: AnomalyDetector,
  engine: RecommendationEngine,
  cache: Option<MemoCache>,
}

impl<S: RecordSource> InsightService<S> {
  pub fn new(source: S, config: InsightConfig) -> Self {
    Self {
      source,
      detector: AnomalyDetector::new(&config),
      engine: RecommendationEngine::new(&config),
      config,
      cache: None,
    }
  }

  /// Enable single-flight memoization of engine results
  pub fn with_cache(mut self) -> Self {
    self.cache = Some(MemoCache::default());
    self
  }

  pub fn config(&self) -> &InsightConfig {
    &self.config
  }

  /// None when caching is disabled
  pub fn cache_stats(&self) -> Option<CacheStats> {
    self.cache.as_ref().map(MemoCache::stats)
  }

  /// Ranked next-workout suggestions for a student
  pub async fn get_recommendations(
    &self,
    student_id: &str,
  ) -> Result<Vec<Recommendation>, InsightError> {
    tracing::info!(student_id, "generating recommendations");
    let series = self.load_series(student_id).await?;
    self.recommend_series(student_id, &series).await
  }

  /// Anomaly report over caller-supplied records.
  ///
  /// Records are validated first, so a malformed record is always reported.
  /// The sample size is then checked on the deduplicated series.
  pub async fn detect_anomalies(
    &self,
    student_id: &str,
    records: &[ExerciseRecord],
  ) -> Result<AnomalyReport, InsightError> {
    let (_, report) = self.detect_records(student_id, records).await?;
    Ok(report)
  }

  /// Same as `detect_anomalies`, with flagged sessions and the summary line
  pub async fn review_anomalies(
    &self,
    student_id: &str,
    records: &[ExerciseRecord],
  ) -> Result<AnomalyReview, InsightError> {
    let (series, report) = self.detect_records(student_id, records).await?;
    Ok(AnomalyReview {
      student_id: student_id.to_string(),
      flagged: report.flagged(&series),
      message: report.summary_message(),
      report,
    })
  }

  /// Recommendations and anomalies from a single load of the student's history.
  ///
  /// A detection failure does not fail the bundle: its message is surfaced
  /// as a warning and `anomalies` is left empty.
  pub async fn get_insights(&self, student_id: &str) -> Result<InsightBundle, InsightError> {
    tracing::info!(student_id, "building insight bundle");
    let series = self.load_series(student_id).await?;

    let (recommendations, anomalies) = tokio::join!(
      self.recommend_series(student_id, &series),
      self.detect_series(student_id, &series),
    );

    let mut warnings = Vec::new();
    let anomalies = match anomalies {
      Ok(report) => Some(report),
      Err(e) => {
        tracing::debug!(student_id, error = %e, "anomaly detection skipped");
        warnings.push(e.to_string());
        None
      }
    };

    Ok(InsightBundle {
      student_id: student_id.to_string(),
      recommendations: recommendations?,
      anomalies,
      warnings,
    })
  }

  /// Descriptive totals over the student's whole history
  pub async fn summarize(&self, student_id: &str) -> Result<HistorySummary, InsightError> {
    let series = self.load_series(student_id).await?;
    Ok(HistorySummary::compute(&series))
  }

  async fn load_series(&self, student_id: &str) -> Result<HistorySeries, InsightError> {
    let records = self.source.load_records(student_id).await.map_err(|e| {
      tracing::warn!(student_id, error = %e, "failed to load exercise records");
      e
    })?;
    build_owned_series(student_id, &records)
  }

  async fn detect_records(
    &self,
    student_id: &str,
    records: &[ExerciseRecord],
  ) -> Result<(HistorySeries, AnomalyReport), InsightError> {
    tracing::info!(student_id, records = records.len(), "detecting anomalies");
    let series = build_owned_series(student_id, records)?;

    let required = self.detector.min_samples();
    if series.len() < required {
      return Err(InsightError::InsufficientData {
        required,
        actual: series.len(),
      });
    }

    let report = self.detect_series(student_id, &series).await?;
    Ok((series, report))
  }

  async fn recommend_series(
    &self,
    student_id: &str,
    series: &HistorySeries,
  ) -> Result<Vec<Recommendation>, InsightError> {
    match &self.cache {
      Some(cache) => {
        cache
          .get_or_compute(&cache.recommendations, student_id, series.content_hash(), || {
            Ok(self.engine.recommend(series))
          })
          .await
      }
      None => Ok(self.engine.recommend(series)),
    }
  }

  async fn detect_series(
    &self,
    student_id: &str,
    series: &HistorySeries,
  ) -> Result<AnomalyReport, InsightError> {
    match &self.cache {
      Some(cache) => {
        cache
          .get_or_compute(&cache.anomalies, student_id, series.content_hash(), || {
            self.detector.detect(series)
          })
          .await
      }
      None => self.detector.detect(series),
    }
  }
}

/// Build a series, rejecting the first record that belongs to someone else
fn build_owned_series(
  student_id: &str,
  records: &[ExerciseRecord],
) -> Result<HistorySeries, InsightError> {
  if let Some(foreign) = records.iter().find(|r| r.student_id != student_id) {
    tracing::warn!(
      student_id,
      record_id = %foreign.id,
      owner = %foreign.student_id,
      "record belongs to another student"
    );
    return Err(InsightError::invalid(
      &foreign.id,
      format!("belongs to student {}, not {}", foreign.student_id, student_id),
    ));
  }
  HistorySeries::build(records)
}
