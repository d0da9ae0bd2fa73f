pub mod anomaly;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod recommendation;
pub mod service;

#[cfg(test)]
mod test_utils;

pub use anomaly::AnomalyDetector;
pub use config::{ConfigError, InsightConfig};
pub use error::InsightError;
pub use history::{HistorySeries, HistorySummary};
pub use models::{AnomalyReport, ExerciseCategory, ExerciseRecord, Intensity, Recommendation};
pub use recommendation::RecommendationEngine;
pub use service::{AnomalyReview, InsightBundle, InsightService, RecordSource};

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();
}
