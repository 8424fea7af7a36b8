//! Batch processing of animation files.
//!
//! Drives the per-file pipeline: parse, reduce (annual/monthly summaries or
//! baseline-vs-period comparisons), write. Files are handled one at a time;
//! a failing file is counted and skipped unless fail-fast is configured.

#[cfg(test)]
pub mod tests;

use crate::aggregate::Aggregator;
use crate::animation::AnimationFile;
use crate::config::{OutputFormat, ProcessorConfig, RunConfig};
use crate::constants::{
    ANIMATION_EXTENSION, ANIMATION_NAME_MARKER, HRU_MEANS_LABEL, HRU_PCT_DIFF_LABEL,
};
use crate::diagnostics::DiagnosticsReport;
use crate::error::Result;
use crate::models::{ProcessingStats, ReducedTable};
use crate::statistics::HruStatistics;
use crate::writer::AnimationWriter;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// Which reductions a summary run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryKinds {
    pub annual: bool,
    pub monthly: bool,
}

impl SummaryKinds {
    /// Neither flag set means both
    pub fn from_flags(annual: bool, monthly: bool) -> Self {
        if annual || monthly {
            Self { annual, monthly }
        } else {
            Self {
                annual: true,
                monthly: true,
            }
        }
    }
}

impl Default for SummaryKinds {
    fn default() -> Self {
        Self::from_flags(false, false)
    }
}

/// Sequential processor for a batch of animation files
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    config: ProcessorConfig,
    quiet: bool,
}

impl BatchProcessor {
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            quiet: false,
        })
    }

    /// Suppress the progress bar and summary block
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Annual and/or monthly summaries for every input file of a run
    pub fn run_summaries(&self, run: &RunConfig, kinds: SummaryKinds) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        run.validate()?;
        fs::create_dir_all(&self.config.output_dir)?;

        if !self.quiet {
            println!("{}", "Summarizing PRMS animation files".bright_green().bold());
            println!(
                "  {} {}",
                "Output:".bright_cyan(),
                self.config.output_dir.display()
            );
        }

        let aggregator = Aggregator::from_config(run, &self.config);
        let mut stats = ProcessingStats {
            output_dir: self.config.output_dir.clone(),
            ..Default::default()
        };

        let pb = self.progress_bar(run.input_files.len());
        for path in &run.input_files {
            pb.set_message(file_label(path));
            let result = self.summarize_file(&aggregator, path, kinds);
            pb.inc(1);

            match result {
                Ok(written) => {
                    stats.files_processed += 1;
                    stats.outputs_written += written;
                }
                Err(e) if self.config.continue_on_error => {
                    error!("Failed to process {}: {}", path.display(), e);
                    stats.files_failed += 1;
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
        }
        pb.finish_with_message("All animation files summarized");

        stats.processing_time_ms = start_time.elapsed().as_millis();
        self.print_summary(&stats);
        Ok(stats)
    }

    fn summarize_file(
        &self,
        aggregator: &Aggregator,
        path: &Path,
        kinds: SummaryKinds,
    ) -> Result<usize> {
        let source = AnimationFile::open(path, &self.config.hru_column)?;
        let writer = AnimationWriter::new(&source);
        let mut written = 0;

        if kinds.annual {
            let annual = aggregator.annual(&source.table)?;
            self.write(&writer, &annual, &self.summary_output_path(path, &annual.label))?;
            written += 1;
        }

        if kinds.monthly {
            for month in aggregator.monthly(&source.table)? {
                self.write(&writer, &month, &self.summary_output_path(path, &month.label))?;
                written += 1;
            }
        }

        debug!("{} outputs written for {}", written, path.display());
        Ok(written)
    }

    /// Per-HRU means of a baseline and each period, plus period percent differences
    pub fn run_comparison(&self, baseline: &Path, periods: &[PathBuf]) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        let means_dir = self.config.output_dir.join(HRU_MEANS_LABEL);
        let pct_dir = self.config.output_dir.join(HRU_PCT_DIFF_LABEL);
        fs::create_dir_all(&means_dir)?;
        fs::create_dir_all(&pct_dir)?;

        if !self.quiet {
            println!("{}", "Comparing PRMS animation files".bright_green().bold());
            println!("  {} {}", "Baseline:".bright_cyan(), baseline.display());
            println!("  {} {}", "Periods:".bright_cyan(), periods.len());
        }

        let report = DiagnosticsReport::create(self.config.diagnostics_path())?;
        let mut stats = ProcessingStats {
            output_dir: self.config.output_dir.clone(),
            ..Default::default()
        };

        // Without a baseline there is nothing to compare against
        let baseline_file = AnimationFile::open(baseline, &self.config.hru_column)?;
        let statistics = HruStatistics::new(&baseline_file.table, self.config.nyears)?;
        self.write(
            &AnimationWriter::new(&baseline_file),
            statistics.baseline_means(),
            &comparison_output_path(&means_dir, baseline, HRU_MEANS_LABEL),
        )?;
        stats.files_processed += 1;
        stats.outputs_written += 1;

        let pb = self.progress_bar(periods.len());
        for path in periods {
            pb.set_message(file_label(path));
            let result = self.compare_file(&statistics, &report, path, &means_dir, &pct_dir);
            pb.inc(1);

            match result {
                Ok(non_finite) => {
                    stats.files_processed += 1;
                    stats.outputs_written += 2;
                    if non_finite {
                        stats.non_finite_tables += 1;
                    }
                }
                Err(e) if self.config.continue_on_error => {
                    error!("Failed to process {}: {}", path.display(), e);
                    stats.files_failed += 1;
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e);
                }
            }
        }
        pb.finish_with_message("All periods compared");

        stats.processing_time_ms = start_time.elapsed().as_millis();
        self.print_summary(&stats);
        if stats.non_finite_tables > 0 && !self.quiet {
            println!(
                "  {} {}",
                "Diagnostics:".bright_yellow(),
                report.path().display()
            );
        }
        Ok(stats)
    }

    /// Returns whether the percent differences held non-finite values
    fn compare_file(
        &self,
        statistics: &HruStatistics,
        report: &DiagnosticsReport,
        path: &Path,
        means_dir: &Path,
        pct_dir: &Path,
    ) -> Result<bool> {
        let period = AnimationFile::open(path, &self.config.hru_column)?;
        let comparison = statistics.compare(&period.table)?;
        let writer = AnimationWriter::new(&period);

        self.write(
            &writer,
            &comparison.means,
            &comparison_output_path(means_dir, path, HRU_MEANS_LABEL),
        )?;
        self.write(
            &writer,
            &comparison.pct_diff,
            &comparison_output_path(pct_dir, path, HRU_PCT_DIFF_LABEL),
        )?;

        report.append(&comparison.non_finite)?;
        Ok(!comparison.non_finite.is_empty())
    }

    fn write(&self, writer: &AnimationWriter, table: &ReducedTable, path: &Path) -> Result<()> {
        writer.write(table, path, self.config.output_format)
    }

    fn summary_output_path(&self, input: &Path, label: &str) -> PathBuf {
        summary_output_path(&self.config.output_dir, input, label, self.config.output_format)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb
    }

    fn print_summary(&self, stats: &ProcessingStats) {
        info!(
            "Processed {} files ({} failed), {} outputs in {}ms",
            stats.files_processed,
            stats.files_failed,
            stats.outputs_written,
            stats.processing_time_ms
        );
        if self.quiet {
            return;
        }

        println!("\n{}", "Processing Summary".bright_green().bold());
        println!(
            "  {} {}ms",
            "Time elapsed:".bright_cyan(),
            stats.processing_time_ms.to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Files processed:".bright_cyan(),
            stats.files_processed.to_string().bright_white()
        );
        if stats.files_failed > 0 {
            println!(
                "  {} {}",
                "Files failed:".bright_red(),
                stats.files_failed.to_string().bright_red().bold()
            );
        }
        if stats.non_finite_tables > 0 {
            println!(
                "  {} {}",
                "Tables with non-finite values:".bright_yellow(),
                stats.non_finite_tables.to_string().bright_yellow().bold()
            );
        }
        println!(
            "  {} {}",
            "Outputs written:".bright_cyan(),
            stats.outputs_written.to_string().bright_white().bold()
        );
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Part of the file name before `animation`, e.g. `run.` for `run.animation.nhru`
pub fn output_prefix(input: &Path) -> String {
    let name = file_label(input);
    match name.find(ANIMATION_NAME_MARKER) {
        Some(pos) => name[..pos].to_string(),
        None => {
            let stem = input
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            format!("{}.", stem)
        }
    }
}

/// `<dir>/<prefix><label>.animation.nhru`, or `<dir>/<prefix><label>.csv`
pub fn summary_output_path(
    output_dir: &Path,
    input: &Path,
    label: &str,
    format: OutputFormat,
) -> PathBuf {
    let prefix = output_prefix(input);
    let name = match format {
        OutputFormat::Animation => format!(
            "{}{}.{}{}",
            prefix, label, ANIMATION_NAME_MARKER, ANIMATION_EXTENSION
        ),
        OutputFormat::Csv => format!("{}{}.csv", prefix, label),
    };
    output_dir.join(name)
}

/// `<dir>/<stem>.<label>.nhru`
pub fn comparison_output_path(dir: &Path, input: &Path, label: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    dir.join(format!("{}.{}{}", stem, label, ANIMATION_EXTENSION))
}
