mod live;

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use arq_lab_abstract::{RunConfig, RunConfigOverride, RunSummary};
use arq_lab_simulator::{ProtocolEngine, SimulationReport, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-Wait ARQ simulator")]
struct Args {
    /// Load a run configuration from a TOML file. Flags given on the command line win.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a scenario file and check its assertions.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of frames to deliver.
    #[arg(long)]
    frames: Option<u32>,

    /// Frame loss probability, 0.0 to 1.0.
    #[arg(long)]
    frame_loss: Option<f64>,

    /// ACK loss probability, 0.0 to 1.0.
    #[arg(long)]
    ack_loss: Option<f64>,

    #[arg(long)]
    timeout_factor: Option<f64>,

    /// One-way transit time in ms.
    #[arg(long)]
    hop_ms: Option<u64>,

    /// Apply random loss.
    #[arg(long, default_value_t = false)]
    noisy: bool,

    /// Wait for a `next` command before every new frame.
    #[arg(long, default_value_t = false)]
    step: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// Pace the run against the wall clock and read commands from stdin.
    #[arg(long, default_value_t = false)]
    live: bool,

    /// Simulated ms per wall-clock ms in live mode.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Abort once simulated time passes this many ms.
    #[arg(long, default_value_t = scenario_runner::DEFAULT_MAX_DURATION_MS)]
    max_time: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    info!("arq-lab-sim starting…");

    if args.scenario.is_some() && args.live {
        bail!("--scenario and --live cannot be used together");
    }

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path)?
    } else {
        let config = args.run_config()?;
        if args.live {
            if !(args.speed.is_finite() && args.speed > 0.0) {
                bail!("--speed must be a positive number");
            }
            live::run(config, args.speed, args.max_time).await?
        } else {
            run_headless(config, args.max_time)?
        }
    };

    if let Some(summary) = &report.summary {
        log_summary(summary);
    }

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn run_config(&self) -> Result<RunConfig> {
        let file = self.config.as_deref().map(load_config).transpose()?;
        Ok(self.merge(file.as_ref()))
    }

    /// Defaults, then the config file, then command-line flags.
    fn merge(&self, file: Option<&RunConfigOverride>) -> RunConfig {
        let mut config = RunConfig::default();
        if let Some(file) = file {
            file.apply_to(&mut config);
        }
        self.overrides().apply_to(&mut config);
        config
    }

    fn overrides(&self) -> RunConfigOverride {
        RunConfigOverride {
            frame_count: self.frames,
            frame_loss: self.frame_loss,
            ack_loss: self.ack_loss,
            timeout_factor: self.timeout_factor,
            hop_ms: self.hop_ms,
            noisy: self.noisy.then_some(true),
            step_mode: self.step.then_some(true),
            seed: self.seed,
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt::init();
}

fn run_headless(config: RunConfig, max_time: u64) -> Result<SimulationReport> {
    let mut engine = ProtocolEngine::new();
    engine
        .start(config.clone())
        .context("Invalid run configuration")?;
    if config.step_mode {
        warn!("Step mode without --live: steps are released automatically");
    }

    info!("Starting headless simulation…");
    engine
        .run_until_complete(max_time)
        .context("Simulation did not complete")?;
    info!("Simulation complete.");
    Ok(engine.export_report())
}

fn log_summary(summary: &RunSummary) {
    let stats = &summary.stats;
    info!(
        "Delivered {}/{} frames in {} ms",
        stats.successful_deliveries, summary.frame_count, summary.duration_ms
    );
    info!(
        "Transmissions: {}, retransmissions: {}, frames lost: {}, ACKs lost: {}",
        stats.total_transmissions, stats.retransmissions, stats.frames_lost, stats.acks_lost
    );
    info!(
        "Efficiency: {:.1}%, goodput: {:.3} frames/s",
        summary.efficiency * 100.0,
        summary.goodput
    );
}

/// A config file holds the same optional keys as a scenario's `[config]` table.
fn load_config(path: &Path) -> Result<RunConfigOverride> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Result<RunConfigOverride> {
    toml::from_str(content).context("Failed to parse config file")
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    info!("Trace written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() {
        let file = parse_config("frame_count = 7\nnoisy = true\nhop_ms = 900\n").unwrap();
        let args = Args::try_parse_from(["arq-lab-sim", "--frames", "3", "--seed", "5"]).unwrap();

        let config = args.merge(Some(&file));
        assert_eq!(config.frame_count, 3);
        assert_eq!(config.seed, 5);
        assert!(config.noisy);
        assert_eq!(config.hop_ms, 900);
        assert_eq!(config.timeout_factor, RunConfig::default().timeout_factor);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let file = parse_config("step_mode = true\n").unwrap();
        let args = Args::try_parse_from(["arq-lab-sim"]).unwrap();
        let config = args.merge(Some(&file));
        assert!(config.step_mode);
        assert!(!config.noisy);
        assert_eq!(config.frame_count, 5);
    }

    #[test]
    fn mistyped_config_value_is_rejected() {
        assert!(parse_config("frame_count = \"many\"\n").is_err());
    }
}
