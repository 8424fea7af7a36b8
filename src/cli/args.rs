//! Command-line argument definitions for the PRMS animation processor
//!
//! Defines the CLI interface using the clap derive API.

use crate::config::{OutputFormat, ProcessorConfig, UnconfiguredPolicy};
use crate::constants::{DEFAULT_DIAGNOSTICS_FILE, DEFAULT_HRU_COLUMN, DEFAULT_OUTPUT_DIR};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the PRMS animation processor
///
/// Summarizes PRMS animation output by water year and month, and compares
/// future-period runs against a baseline run per HRU.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "prms-animation",
    version,
    about = "Summarize and compare PRMS animation (.nhru) output files",
    long_about = "Post-processes PRMS hydrological model animation files. The summarize command \
                  reduces each input file to annual (water-year) and monthly tables using \
                  per-variable operations from a run file. The compare command computes per-HRU \
                  means of a baseline and one or more period files, and the percent difference \
                  of each period from the baseline."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Annual and monthly summaries of the files listed in a run file
    Summarize(SummarizeArgs),
    /// Per-HRU means and percent differences against a baseline
    Compare(CompareArgs),
}

/// Verbosity flags shared by all commands
#[derive(Debug, Clone, ClapArgs)]
pub struct LoggingArgs {
    /// Increase logging verbosity
    #[arg(
        short = 'v',
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl LoggingArgs {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }
}

/// Arguments for the summarize command
#[derive(Debug, Clone, Parser)]
pub struct SummarizeArgs {
    /// PRMS run file listing input files and variable operations
    ///
    /// A line containing "Input path" is followed by the base directory; every
    /// line ending in .nhru names an input file; a line containing
    /// "operations------" starts the `variable,operation` block.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Output directory for summary files
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = DEFAULT_OUTPUT_DIR
    )]
    pub output: PathBuf,

    /// Write annual summaries (both kinds when neither flag is given)
    #[arg(long = "annual")]
    pub annual: bool,

    /// Write monthly summaries (both kinds when neither flag is given)
    #[arg(long = "monthly")]
    pub monthly: bool,

    /// Output file format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Animation)]
    pub format: OutputFormat,

    /// Handling of columns with no configured operation
    #[arg(long = "unconfigured", value_enum, default_value_t = UnconfiguredPolicy::Drop)]
    pub unconfigured: UnconfiguredPolicy,

    /// Name of the HRU identifier column
    #[arg(long = "hru-column", value_name = "NAME", default_value = DEFAULT_HRU_COLUMN)]
    pub hru_column: String,

    /// Group by calendar year even when the file starts in October
    #[arg(long = "no-water-year")]
    pub no_water_year: bool,

    /// Stop at the first file that fails
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,
}

impl SummarizeArgs {
    pub fn to_config(&self) -> ProcessorConfig {
        let mut config = ProcessorConfig::default()
            .with_output_dir(&self.output)
            .with_output_format(self.format)
            .with_unconfigured_policy(self.unconfigured)
            .with_hru_column(&self.hru_column);
        if self.no_water_year {
            config = config.without_water_year();
        }
        if self.fail_fast {
            config = config.with_fail_fast();
        }
        config
    }
}

/// Arguments for the compare command
#[derive(Debug, Clone, Parser)]
pub struct CompareArgs {
    /// Baseline animation file
    #[arg(short = 'b', long = "baseline", value_name = "FILE")]
    pub baseline: PathBuf,

    /// Period animation files or glob patterns
    #[arg(
        short = 'p',
        long = "period",
        value_name = "FILE|GLOB",
        num_args = 1..,
        required = true
    )]
    pub periods: Vec<String>,

    /// Average only the last N calendar years of each file
    #[arg(short = 'n', long = "nyears", value_name = "N")]
    pub nyears: Option<u32>,

    /// Output directory; hru_means/ and hru_pct_diff/ are created inside it
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = DEFAULT_OUTPUT_DIR
    )]
    pub output: PathBuf,

    /// Diagnostics report for non-finite percent differences
    #[arg(long = "diagnostics", value_name = "FILE", default_value = DEFAULT_DIAGNOSTICS_FILE)]
    pub diagnostics: PathBuf,

    /// Name of the HRU identifier column
    #[arg(long = "hru-column", value_name = "NAME", default_value = DEFAULT_HRU_COLUMN)]
    pub hru_column: String,
}

impl CompareArgs {
    pub fn to_config(&self) -> ProcessorConfig {
        ProcessorConfig::default()
            .with_output_dir(&self.output)
            .with_diagnostics_file(&self.diagnostics)
            .with_nyears(self.nyears)
            .with_hru_column(&self.hru_column)
    }
}
