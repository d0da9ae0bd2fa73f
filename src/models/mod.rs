pub mod exercise;
pub mod insight;

pub use exercise::{ExerciseCategory, ExerciseRecord, Intensity, CALORIES_RANGE, DURATION_RANGE};
pub use insight::{AnomalyReport, FlaggedSession, Recommendation};
