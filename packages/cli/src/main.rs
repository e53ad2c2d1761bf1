#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Generates one synthetic origin-destination dataset per invocation.
//!
//! ```text
//! odsynth -c config.toml [--samples 200]
//! ```
//!
//! The configuration file selects the run mode. When routes are requested
//! and neither the file nor `--samples` gives a sample size, the operator
//! is asked for one.
//!
//! Uses `indicatif-log-bridge` (via [`odsynth_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod operator;

use std::path::PathBuf;

use clap::Parser;
use odsynth_pipeline::config::PipelineConfig;

use operator::TerminalOperator;

#[derive(Parser)]
#[command(name = "odsynth", about = "Synthetic origin-destination dataset generator")]
struct Cli {
    /// Path to the TOML run configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Number of records to send to the routing service
    #[arg(long)]
    samples: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = odsynth_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(&cli.config)?;
    if cli.samples.is_some() {
        config.samples = cli.samples;
        config.validate()?;
    }

    let operator = TerminalOperator::new(multi);
    let summary = match odsynth_pipeline::run(&config, &operator).await {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Run aborted: {e}");
            return Err(e.into());
        }
    };

    for path in &summary.outputs {
        log::info!("Saved {}", path.display());
    }
    if summary.failed > 0 {
        log::warn!(
            "{} record(s) failed; see {}",
            summary.failed,
            config.error_directory.display()
        );
    }

    Ok(())
}
