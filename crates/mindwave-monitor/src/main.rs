//! Mindwave Monitor - headless EEG/ECG session runner

mod app;
mod render;

use anyhow::{Context, Result};
use app::{MonitorApp, MonitorOptions};
use clap::Parser;
use mindwave_core::Goal;
use mindwave_processing::AnalysisConfig;
use mindwave_simulation::{DeviceConfig, RhythmProfile, StreamConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stream a simulated headset through the analysis pipeline
#[derive(Debug, Parser)]
#[command(name = "mindwave-monitor", version, about)]
struct Cli {
    /// Analysis configuration (JSON); defaults to the balanced profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session length in seconds; 0 runs until Ctrl-C
    #[arg(long, default_value_t = 60.0)]
    duration: f64,

    /// Simulated pattern: relaxed, focused, drowsy, stressed or meditative
    #[arg(long, default_value = "relaxed")]
    pattern: RhythmProfile,

    /// Band-power goal: anxiety, meditation or sleep
    #[arg(long, default_value = "anxiety")]
    goal: Goal,

    /// Seed for a reproducible device
    #[arg(long)]
    seed: Option<u64>,

    /// Probability of a device packet being lost
    #[arg(long, default_value_t = 0.0)]
    packet_loss: f32,

    /// Write the session document here when the run ends
    #[arg(long)]
    export: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

fn build_options(cli: Cli) -> Result<MonitorOptions> {
    let analysis = match &cli.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load analysis config from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    if !(cli.duration >= 0.0 && cli.duration.is_finite()) {
        anyhow::bail!("duration must be a non-negative number of seconds");
    }
    let duration = (cli.duration > 0.0).then(|| Duration::from_secs_f64(cli.duration));

    let stream = StreamConfig {
        device: DeviceConfig {
            sampling_rate: analysis.sample_rate,
            profile: cli.pattern,
            packet_loss: cli.packet_loss,
            seed: cli.seed,
            ..Default::default()
        },
        ..Default::default()
    };
    stream.validate().context("invalid device settings")?;

    Ok(MonitorOptions {
        analysis,
        stream,
        goal: cli.goal,
        duration,
        export: cli.export,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    info!(
        pattern = %cli.pattern,
        description = cli.pattern.description(),
        "starting Mindwave Monitor: device -> pipeline -> dashboard"
    );

    let options = build_options(cli)?;
    let app = MonitorApp::new(options)?;
    let summary = app.run().await?;

    info!(records = summary.records, last_state = %summary.last_state, "done");
    Ok(())
}
