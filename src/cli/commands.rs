//! Command implementations for the PRMS animation processor CLI
//!
//! Sets up logging, builds the processor configuration from arguments and
//! dispatches to the batch processor.

use crate::cli::args::{Args, Commands, CompareArgs, LoggingArgs, SummarizeArgs};
use crate::config::RunConfig;
use crate::models::ProcessingStats;
use crate::processor::{BatchProcessor, SummaryKinds};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Main command runner
pub fn run(args: Args) -> Result<ProcessingStats> {
    setup_logging(&args.logging)?;
    debug!("Command line arguments: {:?}", args);

    let quiet = args.logging.quiet;
    match args.command {
        Commands::Summarize(summarize) => run_summarize(summarize, quiet),
        Commands::Compare(compare) => run_compare(compare, quiet),
    }
}

/// Set up structured logging
pub fn setup_logging(args: &LoggingArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("prms_animation={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

fn run_summarize(args: SummarizeArgs, quiet: bool) -> Result<ProcessingStats> {
    info!("Starting summaries from {}", args.config.display());

    let run = RunConfig::load(&args.config)
        .with_context(|| format!("Failed to load run file {}", args.config.display()))?;
    let processor = BatchProcessor::new(args.to_config())
        .context("Invalid processor configuration")?
        .with_quiet(quiet);

    processor
        .run_summaries(&run, SummaryKinds::from_flags(args.annual, args.monthly))
        .with_context(|| format!("Summarizing files listed in {}", args.config.display()))
}

fn run_compare(args: CompareArgs, quiet: bool) -> Result<ProcessingStats> {
    info!("Starting comparison against {}", args.baseline.display());

    let periods = expand_periods(&args.periods)?;
    let processor = BatchProcessor::new(args.to_config())
        .context("Invalid processor configuration")?
        .with_quiet(quiet);

    processor
        .run_comparison(&args.baseline, &periods)
        .with_context(|| format!("Comparing against baseline {}", args.baseline.display()))
}

/// Expand glob patterns; plain paths are kept as given
pub fn expand_periods(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut periods = Vec::new();

    for pattern in patterns {
        let matches: Vec<PathBuf> = glob::glob(pattern)
            .with_context(|| format!("Invalid period pattern '{}'", pattern))?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .collect();

        if matches.is_empty() {
            // Let the processor report the missing file
            periods.push(PathBuf::from(pattern));
        } else {
            periods.extend(matches);
        }
    }

    debug!("Expanded {} period patterns to {} files", patterns.len(), periods.len());
    Ok(periods)
}
