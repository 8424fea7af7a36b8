//! Error handling for PRMS animation processing.
//!
//! Provides error types with context for file parsing, header directive
//! interpretation, aggregation and output failures.

use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Could not open or parse input file {path}: {reason}")]
    InputFile { path: PathBuf, reason: String },

    #[error("No 'timestamp' column header found in file: {path}")]
    MissingTimestampHeader { path: PathBuf },

    #[error("No format line after the column header in file: {path}")]
    MissingFormatLine { path: PathBuf },

    #[error("Malformed header directive '{line}': {source}")]
    MalformedDirective {
        line: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Invalid timestamp '{value}' at line {line} of {path}: {source}")]
    TimestampParse {
        path: PathBuf,
        line: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid value '{value}' for column {column} at line {line} of {path}")]
    InvalidValue {
        path: PathBuf,
        line: usize,
        column: String,
        value: String,
    },

    #[error("Row at line {line} of {path} has {found} fields, expected {expected}")]
    RowTooShort {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("No data rows found in file: {path}")]
    EmptyTable { path: PathBuf },

    #[error("Column '{column}' not found in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("No aggregation operation configured for columns: {}", columns.join(", "))]
    UnconfiguredColumns { columns: Vec<String> },

    #[error("Cannot represent period {year}-{month:02} as a timestamp")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AnimationError {
    /// Wrap any failure to read a file in the input-file error the CLI reports
    pub fn input_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InputFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnimationError>;
