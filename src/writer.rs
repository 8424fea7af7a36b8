//! Output writing for reduced tables
//!
//! Serialises a [`ReducedTable`] back into the animation layout of the file it
//! was computed from (header directives, column row, format row, data rows),
//! or into plain CSV.

use crate::animation::AnimationFile;
use crate::config::OutputFormat;
use crate::constants::{DATETIME_FORMAT, MISSING_VALUE_MARKER, framing};
use crate::error::{AnimationError, Result};
use crate::models::{ColumnFormat, ReducedTable, column_f64};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Writer borrowing layout and formats from a parsed source file
#[derive(Debug)]
pub struct AnimationWriter<'a> {
    source: &'a AnimationFile,
}

impl<'a> AnimationWriter<'a> {
    pub fn new(source: &'a AnimationFile) -> Self {
        Self { source }
    }

    pub fn write(&self, table: &ReducedTable, path: &Path, format: OutputFormat) -> Result<()> {
        info!("writing {}...", path.display());
        match format {
            OutputFormat::Animation => self.write_animation(table, path),
            OutputFormat::Csv => self.write_csv(table, path),
        }
    }

    /// Output column names: timestamp, the index when not already a column, then the frame
    pub fn output_columns(&self, table: &ReducedTable) -> Vec<String> {
        let frame_columns = table.column_names();
        let mut columns = vec![self.source.timestamp_column().to_string()];
        if !frame_columns.contains(&table.index_name) {
            columns.push(table.index_name.clone());
        }
        columns.extend(frame_columns);
        columns
    }

    /// Header block restricted to directives for the output columns
    fn header_lines(&self, columns: &[String]) -> Vec<String> {
        let mut lines = vec![framing::BLANK.to_string(), framing::BEGIN_DBF.to_string()];
        lines.extend(
            self.source
                .header
                .entries()
                .iter()
                .filter(|entry| columns.contains(&entry.variable))
                .map(|entry| entry.raw.clone()),
        );
        lines.push(framing::END_DBF.to_string());
        lines.push(framing::BLANK.to_string());
        lines
    }

    /// Format tokens of the source row picked by column position
    ///
    /// An inserted index column has no source token and takes `index`.
    fn format_row(&self, columns: &[String], index: Option<(&str, &str)>) -> Vec<String> {
        let tokens = self.source.format_tokens();
        columns
            .iter()
            .filter_map(|column| {
                let source_token = self
                    .source
                    .column_names
                    .iter()
                    .position(|name| name == column)
                    .and_then(|i| tokens.get(i))
                    .copied();
                source_token
                    .or_else(|| {
                        index
                            .filter(|(name, _)| *name == column.as_str())
                            .map(|(_, token)| token)
                    })
                    .map(str::to_string)
            })
            .collect()
    }

    fn write_animation(&self, table: &ReducedTable, path: &Path) -> Result<()> {
        if table.timestamps.len() != table.height() || table.index.len() != table.height() {
            return Err(AnimationError::configuration(format!(
                "Table '{}' has {} rows but {} timestamps and {} index values",
                table.label,
                table.height(),
                table.timestamps.len(),
                table.index.len()
            )));
        }

        let columns = self.output_columns(table);
        let delimiter = self.source.delimiter.to_string();
        let index_inserted = !table.column_names().contains(&table.index_name);

        let frame_columns = table.column_names();
        let mut rendered: Vec<(ColumnFormat, Vec<f64>)> = Vec::with_capacity(frame_columns.len());
        for name in &frame_columns {
            rendered.push((self.source.column_format(name), column_f64(&table.frame, name)?));
        }
        let index_format = self.index_format(&table.index_name);
        let index_cells: Vec<String> = if index_inserted {
            table
                .index
                .iter()
                .map(|&id| format_cell(id as f64, index_format))
                .collect()
        } else {
            Vec::new()
        };
        let index_token = index_inserted.then(|| index_token(&index_cells, index_format));

        let file = File::create(path)?;
        let mut out = BufWriter::new(file);

        for line in self.header_lines(&columns) {
            writeln!(out, "{}", line)?;
        }
        writeln!(out, "{}", columns.join(&delimiter))?;
        let index = index_token
            .as_deref()
            .map(|token| (table.index_name.as_str(), token));
        writeln!(out, "{}", self.format_row(&columns, index).join(&delimiter))?;

        let mut cells = Vec::with_capacity(columns.len());
        for row in 0..table.height() {
            cells.clear();
            cells.push(table.timestamps[row].format(DATETIME_FORMAT).to_string());
            if let Some(cell) = index_cells.get(row) {
                cells.push(cell.clone());
            }
            for (format, values) in &rendered {
                cells.push(format_cell(values[row], *format));
            }
            writeln!(out, "{}", cells.join(&delimiter))?;
        }

        out.flush()?;
        debug!(
            "Wrote {} rows x {} columns to {}",
            table.height(),
            columns.len(),
            path.display()
        );
        Ok(())
    }

    /// Inserted index columns are integers, padded when a directive gives a width
    fn index_format(&self, index_name: &str) -> ColumnFormat {
        match self.source.column_format(index_name) {
            ColumnFormat::Fixed { width, .. } | ColumnFormat::Scientific { width, .. } => {
                ColumnFormat::Fixed {
                    width,
                    precision: 0,
                }
            }
            ColumnFormat::Datetime => ColumnFormat::Fixed {
                width: 0,
                precision: 0,
            },
        }
    }

    fn write_csv(&self, table: &ReducedTable, path: &Path) -> Result<()> {
        let mut frame = table.frame.clone();

        let stamps: Vec<String> = table
            .timestamps
            .iter()
            .map(|ts| ts.format(DATETIME_FORMAT).to_string())
            .collect();
        frame.insert_column(
            0,
            Column::new(self.source.timestamp_column().into(), stamps),
        )?;

        if !table.column_names().contains(&table.index_name) {
            frame.insert_column(
                1,
                Column::new(table.index_name.as_str().into(), table.index.clone()),
            )?;
        }

        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut frame)?;

        debug!("Wrote {} CSV rows to {}", frame.height(), path.display());
        Ok(())
    }
}

/// Integer token (`4n`) as wide as the widest rendered index cell
fn index_token(cells: &[String], format: ColumnFormat) -> String {
    let directive_width = match format {
        ColumnFormat::Fixed { width, .. } | ColumnFormat::Scientific { width, .. } => width,
        ColumnFormat::Datetime => 0,
    };
    let width = cells
        .iter()
        .map(String::len)
        .max()
        .unwrap_or_default()
        .max(directive_width);
    format!("{}n", width)
}

/// Render one cell; non-finite values become the missing marker
pub fn format_cell(value: f64, format: ColumnFormat) -> String {
    if !value.is_finite() {
        return MISSING_VALUE_MARKER.to_string();
    }

    match format {
        ColumnFormat::Scientific { width, precision } => {
            format!("{:>width$}", format_scientific(value, precision))
        }
        ColumnFormat::Fixed { width, precision } => format!("{:>width$.precision$}", value),
        ColumnFormat::Datetime => value.to_string(),
    }
}

/// `1.2340E+00` style: upper-case exponent, explicit sign, at least two digits
pub fn format_scientific(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*E}", precision, value);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or_default();
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}
