//! Text report of non-finite percent differences
//!
//! Cleared once at the start of a comparison run, then appended per table.
//! A run without non-finite values leaves no report behind.

use crate::error::Result;
use crate::statistics::NonFiniteSummary;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    path: PathBuf,
}

impl DiagnosticsReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Start a fresh report, discarding entries from earlier runs
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let report = Self::new(path);
        match fs::remove_file(&report.path) {
            Ok(()) => debug!("Removed previous report {}", report.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry; empty summaries are skipped
    pub fn append(&self, summary: &NonFiniteSummary) -> Result<()> {
        if summary.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        write_entry(&mut out, summary)?;
        out.flush()?;

        debug!(
            "Recorded non-finite values for {} in {}",
            summary.table,
            self.path.display()
        );
        Ok(())
    }
}

fn write_entry<W: Write>(out: &mut W, summary: &NonFiniteSummary) -> std::io::Result<()> {
    writeln!(out, "{}", summary.table)?;
    writeln!(out, "(in percent differences)")?;

    writeln!(out, "Number of non-finite by column:")?;
    for (column, count) in &summary.counts {
        writeln!(out, "{} {}", column, count)?;
    }

    writeln!(out, "Indices of non-finite values:")?;
    for (column, ids) in &summary.indices {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        writeln!(out, "{}: {}", column, ids.join(" "))?;
    }

    writeln!(out)
}
