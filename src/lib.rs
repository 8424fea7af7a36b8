//! PRMS Animation Processor Library
//!
//! Post-processing for PRMS hydrological model "animation" output: delimited
//! text time series with a commented header block, one row per timestamp and
//! HRU (Hydrologic Response Unit).
//!
//! This library provides tools for:
//! - Sniffing the field delimiter and locating the header/data boundary
//! - Parsing header directives and data rows into a typed table
//! - Annual (water-year aware) and monthly reductions per HRU
//! - Per-HRU means and baseline-vs-period percent differences
//! - Writing reduced tables back in the animation layout, or as CSV

pub mod aggregate;
pub mod animation;
pub mod cli;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod header;
pub mod models;
pub mod processor;
pub mod sniffer;
pub mod statistics;
pub mod writer;

#[cfg(test)]
mod test_utils;

pub use aggregate::{Aggregator, hru_means};
pub use animation::AnimationFile;
pub use config::{Operation, OutputFormat, ProcessorConfig, RunConfig, UnconfiguredPolicy};
pub use diagnostics::DiagnosticsReport;
pub use error::{AnimationError, Result};
pub use models::{AnimationTable, ProcessingStats, ReducedTable};
pub use processor::{BatchProcessor, SummaryKinds};
pub use statistics::{HruStatistics, NonFiniteSummary};
pub use writer::AnimationWriter;
