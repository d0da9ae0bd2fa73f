use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use student_insight_lib::{
  init_tracing, ExerciseRecord, InsightConfig, InsightError, InsightService, RecordSource,
};

#[derive(Parser)]
#[command(
  name = "student-insight",
  about = "Anomaly detection and workout recommendations for student exercise logs",
  version,
  long_about = None
)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Flag sessions whose calories deviate from the recent baseline
  Anomalies {
    #[command(flatten)]
    input: InputArgs,

    /// Prior sessions in each baseline window
    #[arg(long)]
    window: Option<usize>,

    /// Deviation (in standard deviations) at which a session is flagged
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum number of records before detection runs
    #[arg(long)]
    min_samples: Option<usize>,
  },

  /// Suggest next workouts from recent history
  Recommend {
    #[command(flatten)]
    input: InputArgs,

    /// Number of suggestions to return
    #[arg(long)]
    max: Option<usize>,

    /// Half-life of the training load decay, in days
    #[arg(long)]
    half_life: Option<f64>,
  },

  /// Recommendations and anomalies together
  Insights {
    #[command(flatten)]
    input: InputArgs,
  },

  /// Descriptive totals over the whole history
  Summary {
    #[command(flatten)]
    input: InputArgs,
  },
}

#[derive(Args)]
struct InputArgs {
  /// JSON file holding an array of exercise records
  #[arg(long)]
  input: PathBuf,

  /// Student to analyse (defaults to the owner of the first record)
  #[arg(long)]
  student: Option<String>,
}

/// Records read once from a JSON file
struct FileSource {
  records: Vec<ExerciseRecord>,
}

impl FileSource {
  fn open(path: &Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<ExerciseRecord> = serde_json::from_str(&raw)
      .with_context(|| format!("Failed to parse records in {}", path.display()))?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded exercise records");
    Ok(Self { records })
  }

  fn student_for(&self, requested: Option<String>) -> Result<String> {
    match requested.or_else(|| self.records.first().map(|r| r.student_id.clone())) {
      Some(student_id) => Ok(student_id),
      None => bail!("Input is empty; pass --student to get a cold-start recommendation"),
    }
  }
}

#[async_trait]
impl RecordSource for FileSource {
  async fn load_records(&self, student_id: &str) -> Result<Vec<ExerciseRecord>, InsightError> {
    Ok(
      self
        .records
        .iter()
        .filter(|r| r.student_id == student_id)
        .cloned()
        .collect(),
    )
  }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  init_tracing();

  let cli = Cli::parse();
  let mut config = InsightConfig::from_env().context("Invalid INSIGHT_* configuration")?;

  match cli.command {
    Commands::Anomalies {
      input,
      window,
      threshold,
      min_samples,
    } => {
      if let Some(window) = window {
        config.baseline_window = window;
      }
      if let Some(threshold) = threshold {
        config.z_threshold = threshold;
      }
      if let Some(min_samples) = min_samples {
        config.min_samples = min_samples;
      }
      config.validate()?;

      let source = FileSource::open(&input.input)?;
      let student_id = source.student_for(input.student)?;
      let records = source.load_records(&student_id).await?;
      let service = InsightService::new(source, config);

      let review = service.review_anomalies(&student_id, &records).await?;
      tracing::info!(
        %student_id,
        flagged = review.flagged.len(),
        "{}",
        review.message
      );

      print_json(&review)?;
    }
    Commands::Recommend { input, max, half_life } => {
      if let Some(max) = max {
        config.max_recommendations = max;
      }
      if let Some(half_life) = half_life {
        config.half_life_days = half_life;
      }
      config.validate()?;

      let source = FileSource::open(&input.input)?;
      let student_id = source.student_for(input.student)?;
      let service = InsightService::new(source, config);

      print_json(&service.get_recommendations(&student_id).await?)?;
    }
    Commands::Insights { input } => {
      let source = FileSource::open(&input.input)?;
      let student_id = source.student_for(input.student)?;
      let service = InsightService::new(source, config);

      let bundle = service.get_insights(&student_id).await?;
      for warning in &bundle.warnings {
        tracing::warn!(%student_id, "{}", warning);
      }
      print_json(&bundle)?;
    }
    Commands::Summary { input } => {
      let source = FileSource::open(&input.input)?;
      let student_id = source.student_for(input.student)?;
      let service = InsightService::new(source, config);

      print_json(&service.summarize(&student_id).await?)?;
    }
  }

  Ok(())
}
