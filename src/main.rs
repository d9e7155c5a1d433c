use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use dtd_metrics::clock::{Clock, FixedClock, SystemClock};
use dtd_metrics::config::Config;
use dtd_metrics::export::Exporter;
use dtd_metrics::metrics::ReportBuilder;
use dtd_metrics::{source, worker};

/// Windowed onboarding and subscription metrics for the tenant registry.
#[derive(Parser)]
#[command(name = "dtd-metrics", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("dtd-metrics {}", version::full());
        return Ok(());
    }

    let config_path = cli
        .config
        .context("--config is required (use --help for usage)")?;

    let cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // The flag wins over the config file.
    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("invalid log level: {log_level}"))?;

    fmt().with_env_filter(filter).with_target(true).init();

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        config = %config_path.display(),
        "starting dtd-metrics",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(run(cfg))
}

async fn run(cfg: Config) -> Result<()> {
    let clock: Arc<dyn Clock> = match cfg.report.reference_time {
        Some(at) => {
            tracing::info!(reference_time = %at, "using pinned reference time");
            Arc::new(FixedClock::new(at))
        }
        None => Arc::new(SystemClock),
    };

    let builder = ReportBuilder::new(cfg.report_settings(), clock);
    let snapshot_path = cfg.input.snapshot_path.clone();

    let started = Instant::now();
    let output = worker::dispatch("report-build", move || {
        let snapshot = source::load_snapshot(&snapshot_path)?;
        builder.build(&snapshot)
    })
    .await?;

    let elapsed = started.elapsed();
    if elapsed > cfg.worker.slow_build_threshold {
        tracing::warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            threshold_ms = cfg.worker.slow_build_threshold.as_millis() as u64,
            "report build exceeded slow build threshold",
        );
    }

    let output = Arc::new(output);
    for format in &cfg.output.formats {
        let exporter = Exporter::for_format(*format, &cfg.output.dir);
        let name = exporter.name().to_string();
        let report = Arc::clone(&output);

        let written = worker::dispatch(&format!("export-{name}"), move || {
            exporter.export(&report)
        })
        .await?;

        tracing::info!(exporter = %name, files = written.len(), "export complete");
    }

    tracing::info!("dtd-metrics finished");

    Ok(())
}
