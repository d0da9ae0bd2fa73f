use serde::{Deserialize, Serialize};

/// Valid duration range in minutes (inclusive)
pub const DURATION_RANGE: (i64, i64) = (1, 300);

/// Valid calorie range (inclusive)
pub const CALORIES_RANGE: (i64, i64) = (1, 2000);

/// A single logged exercise session, as supplied by the logging layer.
///
/// `date` stays as the raw wire string ("YYYY-MM-DD"); it is parsed and
/// validated when a `HistorySeries` is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRecord {
  pub id: String,
  pub student_id: String,
  pub exercise_name: String,
  /// Minutes
  pub duration: i64,
  pub calories: i64,
  pub date: String,
  pub intensity: Intensity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
  Low,
  Medium,
  High,
}

impl Intensity {
  /// Training-load multiplier applied to session minutes
  pub fn load_multiplier(&self) -> f64 {
    match self {
      Intensity::Low => 1.0,
      Intensity::Medium => 2.0,
      Intensity::High => 3.0,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Intensity::Low => "low",
      Intensity::Medium => "medium",
      Intensity::High => "high",
    }
  }
}

impl std::fmt::Display for Intensity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Intensity {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      other => Err(format!("Unknown intensity: {}", other)),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Exercise Categories
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseCategory {
  #[serde(rename = "Cardio")]
  Cardio,
  #[serde(rename = "Strength Training")]
  StrengthTraining,
  #[serde(rename = "Flexibility/Recovery")]
  FlexibilityRecovery,
  #[serde(rename = "Cross-training")]
  CrossTraining,
}

const CARDIO_KEYWORDS: &[&str] = &[
  "run", "jog", "cycl", "bike", "biking", "swim", "walk", "row", "hiit", "cardio", "dance",
  "jump", "skip", "elliptical", "hike", "sprint", "spin",
];

const STRENGTH_KEYWORDS: &[&str] = &[
  "weight", "strength", "push-up", "pushup", "push up", "pull-up", "pullup", "pull up",
  "squat", "lift", "press", "deadlift", "resistance", "bench", "curl", "lunge", "plank",
  "sit-up", "situp", "crunch",
];

const FLEXIBILITY_KEYWORDS: &[&str] = &[
  "yoga", "stretch", "pilates", "mobility", "foam", "recovery", "tai chi", "flexibility",
  "cool down", "cooldown",
];

const CROSS_TRAINING_KEYWORDS: &[&str] = &["cross", "circuit", "crossfit", "boot camp", "bootcamp"];

impl ExerciseCategory {
  /// All categories in tie-break priority order
  pub const ALL: [ExerciseCategory; 4] = [
    ExerciseCategory::Cardio,
    ExerciseCategory::StrengthTraining,
    ExerciseCategory::FlexibilityRecovery,
    ExerciseCategory::CrossTraining,
  ];

  /// Tie-break priority: lower ranks first
  pub fn priority(&self) -> u8 {
    match self {
      ExerciseCategory::Cardio => 0,
      ExerciseCategory::StrengthTraining => 1,
      ExerciseCategory::FlexibilityRecovery => 2,
      ExerciseCategory::CrossTraining => 3,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ExerciseCategory::Cardio => "Cardio",
      ExerciseCategory::StrengthTraining => "Strength Training",
      ExerciseCategory::FlexibilityRecovery => "Flexibility/Recovery",
      ExerciseCategory::CrossTraining => "Cross-training",
    }
  }

  /// Map a free-form exercise name onto a category by keyword.
  /// Mixed-modality keywords win over single-modality ones ("circuit squats"
  /// is cross-training, "cooldown walk" is recovery).
  pub fn classify(exercise_name: &str) -> Option<Self> {
    let name = exercise_name.trim().to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| name.contains(k));

    if matches(CROSS_TRAINING_KEYWORDS) {
      Some(ExerciseCategory::CrossTraining)
    } else if matches(FLEXIBILITY_KEYWORDS) {
      Some(ExerciseCategory::FlexibilityRecovery)
    } else if matches(STRENGTH_KEYWORDS) {
      Some(ExerciseCategory::StrengthTraining)
    } else if matches(CARDIO_KEYWORDS) {
      Some(ExerciseCategory::Cardio)
    } else {
      None
    }
  }
}

impl std::fmt::Display for ExerciseCategory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}
