//! PRMS animation file model.
//!
//! Reads an animation file into its header metadata, column-name row,
//! opaque format-directive row and a timestamp-indexed [`AnimationTable`].
//!
//! ```text
//! #
//! # Begin DBF
//! # timestamp,#FIELD_DATETIME,19,0
//! # nhru,#FIELD_DECIMAL,10,0
//! # recharge,#FIELD_DECIMAL,10,4
//! # End DBF
//! #
//! timestamp	nhru	recharge
//! 19d	10n	10n
//! 1981-10-01:00:00:00	         1	2.0000E-01
//! ```

use crate::constants::DATETIME_FORMAT;
use crate::error::{AnimationError, Result};
use crate::header::HeaderMetadata;
use crate::models::{AnimationTable, ColumnFormat};
use crate::sniffer::{find_header_boundary, sniff_delimiter, split_fields};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A parsed animation file
#[derive(Debug, Clone)]
pub struct AnimationFile {
    pub path: PathBuf,
    pub delimiter: char,
    pub header: HeaderMetadata,
    /// Column names as declared, timestamp first
    pub column_names: Vec<String>,
    /// Format-directive row, kept verbatim
    pub format_line: String,
    pub table: AnimationTable,
}

impl AnimationFile {
    /// Sniff, parse and load an animation file
    pub fn open(path: &Path, hru_column: &str) -> Result<Self> {
        let delimiter = sniff_delimiter(path)?;

        info!("reading {}...", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnimationError::input_file(path, e.to_string()))?;

        Self::parse_str(path, &content, delimiter, hru_column)
    }

    /// Parse already-read file content with a known delimiter
    pub fn parse_str(path: &Path, content: &str, delimiter: char, hru_column: &str) -> Result<Self> {
        let lines: Vec<&str> = content.lines().collect();

        let boundary = find_header_boundary(&lines, delimiter).ok_or_else(|| {
            AnimationError::MissingTimestampHeader {
                path: path.to_path_buf(),
            }
        })?;

        let header_lines: Vec<String> = lines[..boundary].iter().map(|s| s.to_string()).collect();
        let header = HeaderMetadata::parse(&header_lines)?;

        let column_names: Vec<String> = split_fields(lines[boundary], delimiter)
            .into_iter()
            .map(str::to_string)
            .collect();

        let format_line = lines
            .get(boundary + 1)
            .map(|s| s.trim_end().to_string())
            .ok_or_else(|| AnimationError::MissingFormatLine {
                path: path.to_path_buf(),
            })?;

        debug!(
            "Header boundary at line {} of {}: {} columns",
            boundary + 1,
            path.display(),
            column_names.len()
        );

        // Data rows start after the column-name and format rows; numbered from 1
        let first_data_line = boundary + 2;
        let table = parse_body(
            path,
            &lines[first_data_line..],
            first_data_line + 1,
            delimiter,
            &column_names,
            hru_column,
        )?;

        Ok(Self {
            path: path.to_path_buf(),
            delimiter,
            header,
            column_names,
            format_line,
            table,
        })
    }

    pub fn timestamp_column(&self) -> &str {
        &self.column_names[0]
    }

    /// Format-directive tokens, positionally aligned with `column_names`
    pub fn format_tokens(&self) -> Vec<&str> {
        let tokens = split_fields(&self.format_line, self.delimiter);
        if tokens.len() == self.column_names.len() {
            tokens
        } else {
            self.format_line.split_whitespace().collect()
        }
    }

    pub fn column_format(&self, column: &str) -> ColumnFormat {
        self.header.column_format(column, &self.table.hru_column)
    }
}

/// Parse data rows into a timestamp vector and a typed DataFrame
fn parse_body(
    path: &Path,
    rows: &[&str],
    first_line_number: usize,
    delimiter: char,
    column_names: &[String],
    hru_column: &str,
) -> Result<AnimationTable> {
    let value_columns = &column_names[1..];

    let mut timestamps = Vec::with_capacity(rows.len());
    let mut line_numbers = Vec::with_capacity(rows.len());
    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(rows.len()); value_columns.len()];

    for (offset, row) in rows.iter().enumerate() {
        let line = first_line_number + offset;
        if row.trim().is_empty() {
            continue;
        }

        let fields = split_fields(row, delimiter);
        if fields.len() < column_names.len() {
            return Err(AnimationError::RowTooShort {
                path: path.to_path_buf(),
                line,
                expected: column_names.len(),
                found: fields.len(),
            });
        }

        let timestamp = NaiveDateTime::parse_from_str(fields[0], DATETIME_FORMAT).map_err(
            |source| AnimationError::TimestampParse {
                path: path.to_path_buf(),
                line,
                value: fields[0].to_string(),
                source,
            },
        )?;
        timestamps.push(timestamp);
        line_numbers.push(line);

        for (i, name) in value_columns.iter().enumerate() {
            let value = parse_value(fields[i + 1]).ok_or_else(|| AnimationError::InvalidValue {
                path: path.to_path_buf(),
                line,
                column: name.clone(),
                value: fields[i + 1].to_string(),
            })?;
            values[i].push(value);
        }
    }

    if timestamps.is_empty() {
        return Err(AnimationError::EmptyTable {
            path: path.to_path_buf(),
        });
    }

    let mut columns = Vec::with_capacity(value_columns.len());
    for (name, column_values) in value_columns.iter().zip(values) {
        if name == hru_column {
            let ids = hru_ids(path, name, &column_values, &line_numbers)?;
            columns.push(Column::new(name.as_str().into(), ids));
        } else {
            columns.push(Column::new(name.as_str().into(), column_values));
        }
    }

    let frame = DataFrame::new(columns)?;
    debug!(
        "Loaded {} rows x {} columns from {}",
        frame.height(),
        frame.width(),
        path.display()
    );

    Ok(AnimationTable {
        source: path.to_path_buf(),
        hru_column: hru_column.to_string(),
        timestamps,
        frame,
    })
}

/// Parse a numeric cell; empty cells are missing values
fn parse_value(field: &str) -> Option<f64> {
    if field.is_empty() {
        return Some(f64::NAN);
    }
    field.parse::<f64>().ok()
}

fn hru_ids(path: &Path, name: &str, values: &[f64], line_numbers: &[usize]) -> Result<Vec<i64>> {
    values
        .iter()
        .zip(line_numbers)
        .map(|(value, &line)| {
            if value.is_finite() && value.fract() == 0.0 {
                Ok(*value as i64)
            } else {
                Err(AnimationError::InvalidValue {
                    path: path.to_path_buf(),
                    line,
                    column: name.to_string(),
                    value: value.to_string(),
                })
            }
        })
        .collect()
}
