//! leap_cube — interactive entry point.

use anyhow::{Context, Result};
use clap::Parser;
use leap_cube::app::{run, AppConfig};
use motion_accum::AccumulatorConfig;
use tracing_subscriber::EnvFilter;

/// Accumulate LeapMotion hand motion into a colour cube.
#[derive(Parser)]
#[command(name = "leap_cube")]
#[command(about = "LeapMotion hand-motion cube visualizer", long_about = None)]
#[command(version)]
struct Cli {
    /// A channel is applied only when its probability is above this
    #[arg(long, default_value_t = 0.4)]
    threshold: f32,

    /// Floor for the cumulative scale
    #[arg(long, default_value_t = 0.1)]
    min_scale: f32,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "motion_accum=trace")
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log))
        .with_context(|| format!("invalid log filter `{}`", cli.log))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║          Leap Cube — Hand Motion Accumulator                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let cfg = AppConfig {
        accumulator: AccumulatorConfig {
            confidence_threshold: cli.threshold,
            min_scale:            cli.min_scale,
        },
        ..AppConfig::default()
    };

    run(cfg).context("visualizer failed")
}
