use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::export::OutputFormat;
use crate::metrics::timeseries::Jump;
use crate::metrics::window::Windowed;
use crate::metrics::{ReportSettings, DEFAULT_TOP_LIMIT};

/// Top-level configuration for a metrics report run.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Registry snapshot input.
    pub input: InputConfig,

    /// Metric computation tunables.
    #[serde(default)]
    pub report: ReportConfig,

    /// Where and how the report is written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Background build configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Registry snapshot input.
#[derive(Debug, Deserialize)]
pub struct InputConfig {
    /// JSON snapshot of tenants, e-services and agreements.
    pub snapshot_path: PathBuf,
}

/// Metric computation tunables.
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// Entries kept by each "top" ranking. Default: 10.
    #[serde(default = "default_top_limit")]
    pub top_limit: usize,

    /// Pin "now" for reproducible reruns. Default: wall clock.
    #[serde(default)]
    pub reference_time: Option<DateTime<Utc>>,

    /// Bucket jump of the signup trend per window.
    #[serde(default)]
    pub signup_trend: SignupTrendConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_limit: default_top_limit(),
            reference_time: None,
            signup_trend: SignupTrendConfig::default(),
        }
    }
}

/// Bucket jump of the signup trend per window.
#[derive(Debug, Deserialize)]
pub struct SignupTrendConfig {
    /// Default: 1 week.
    #[serde(default = "default_six_months_jump")]
    pub last_six_months: Jump,

    /// Default: 2 weeks.
    #[serde(default = "default_twelve_months_jump")]
    pub last_twelve_months: Jump,

    /// Default: 1 month.
    #[serde(default = "default_from_the_beginning_jump")]
    pub from_the_beginning: Jump,
}

impl Default for SignupTrendConfig {
    fn default() -> Self {
        Self {
            last_six_months: default_six_months_jump(),
            last_twelve_months: default_twelve_months_jump(),
            from_the_beginning: default_from_the_beginning_jump(),
        }
    }
}

/// Where and how the report is written.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory, created if missing. Default: "./report".
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Formats to write. Default: json and csv.
    #[serde(default = "default_output_formats")]
    pub formats: Vec<OutputFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            formats: default_output_formats(),
        }
    }
}

/// Background build configuration.
#[derive(Debug, Deserialize)]
pub struct WorkerConfig {
    /// Builds slower than this log a warning. Default: 30s.
    #[serde(default = "default_slow_build_threshold", with = "humantime_serde")]
    pub slow_build_threshold: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            slow_build_threshold: default_slow_build_threshold(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_top_limit() -> usize {
    DEFAULT_TOP_LIMIT
}

fn default_six_months_jump() -> Jump {
    Jump::weeks(1)
}

fn default_twelve_months_jump() -> Jump {
    Jump::weeks(2)
}

fn default_from_the_beginning_jump() -> Jump {
    Jump::months(1)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./report")
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Json, OutputFormat::Csv]
}

fn default_slow_build_threshold() -> Duration {
    Duration::from_secs(30)
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.input.snapshot_path.as_os_str().is_empty() {
            bail!("input.snapshot_path is required");
        }

        if self.report.top_limit == 0 {
            bail!("report.top_limit must be positive");
        }

        let trend = &self.report.signup_trend;
        for (key, jump) in [
            ("last_six_months", trend.last_six_months),
            ("last_twelve_months", trend.last_twelve_months),
            ("from_the_beginning", trend.from_the_beginning),
        ] {
            jump.validate().with_context(|| format!("report.signup_trend.{key}"))?;
        }

        if self.output.dir.as_os_str().is_empty() {
            bail!("output.dir is required");
        }

        if self.output.formats.is_empty() {
            bail!("output.formats must name at least one format");
        }

        if self.worker.slow_build_threshold.is_zero() {
            bail!("worker.slow_build_threshold must be positive");
        }

        Ok(())
    }

    /// Settings handed to the report builder.
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            top_limit: self.report.top_limit,
            signup_jumps: self.report.signup_jumps(),
        }
    }
}

impl ReportConfig {
    fn signup_jumps(&self) -> Windowed<Jump> {
        Windowed {
            last_six_months: self.signup_trend.last_six_months,
            last_twelve_months: self.signup_trend.last_twelve_months,
            from_the_beginning: self.signup_trend.from_the_beginning,
        }
    }
}
