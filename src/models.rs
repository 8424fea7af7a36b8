//! Core data structures for PRMS animation processing.
//!
//! Defines header directive entries, per-column output formats, the parsed
//! animation table, reduced (aggregated) tables and batch statistics.

use crate::constants::{DEFAULT_PRECISION, WATER_YEAR_START_MONTH};
use crate::error::{AnimationError, Result};
use chrono::{Datelike, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of field declared by a header directive line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// `FIELD_DECIMAL` with explicit width and precision
    Decimal { width: usize, precision: usize },
    /// Date/time field
    Datetime,
    /// Directive shape that is preserved verbatim but not used for formatting
    Other,
}

/// A single header line with the variable it describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub variable: String,
    pub kind: FieldKind,
    pub raw: String,
}

/// Textual rendering applied to the cells of one output column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFormat {
    /// `1.2340E+00` style, right-aligned in `width`
    Scientific { width: usize, precision: usize },
    /// Fixed-point, right-aligned in `width`
    Fixed { width: usize, precision: usize },
    /// `YYYY-MM-DD:HH:MM:SS`
    Datetime,
}

impl Default for ColumnFormat {
    fn default() -> Self {
        ColumnFormat::Scientific {
            width: 0,
            precision: DEFAULT_PRECISION,
        }
    }
}

/// Parsed body of an animation file
///
/// `frame` holds every column after the timestamp in header order; the HRU
/// column is `Int64`, all other columns are `Float64`.
#[derive(Debug, Clone)]
pub struct AnimationTable {
    pub source: PathBuf,
    pub hru_column: String,
    pub timestamps: Vec<NaiveDateTime>,
    pub frame: DataFrame,
}

impl AnimationTable {
    pub fn height(&self) -> usize {
        self.timestamps.len()
    }

    /// Column names in header order (timestamp excluded)
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// State variable columns, i.e. everything except the HRU column
    pub fn variable_columns(&self) -> Vec<String> {
        self.column_names()
            .into_iter()
            .filter(|name| name != &self.hru_column)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_names().iter().any(|c| c.as_str() == name)
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Midpoint of the covered time range, `first + (last - first) / 2`
    pub fn midpoint(&self) -> Option<NaiveDateTime> {
        let first = self.first_timestamp()?;
        let last = self.last_timestamp()?;
        Some(first + (last - first) / 2)
    }

    /// Water-year output is detected from the second row falling in October
    pub fn is_water_year(&self) -> bool {
        self.timestamps
            .get(1)
            .is_some_and(|ts| ts.month() == WATER_YEAR_START_MONTH)
    }

    /// Fail unless the HRU column is present
    pub fn require_hru_column(&self) -> Result<()> {
        if self.has_column(&self.hru_column) {
            Ok(())
        } else {
            Err(AnimationError::MissingColumn {
                column: self.hru_column.clone(),
                source_name: self.source.display().to_string(),
            })
        }
    }

    /// Copy of the table keeping only rows at or after `start`
    pub fn since(&self, start: NaiveDateTime) -> Result<AnimationTable> {
        let mask: Vec<bool> = self.timestamps.iter().map(|ts| *ts >= start).collect();
        let mask = BooleanChunked::from_slice("window".into(), &mask);
        let frame = self.frame.filter(&mask)?;
        let timestamps = self
            .timestamps
            .iter()
            .copied()
            .filter(|ts| *ts >= start)
            .collect();

        Ok(AnimationTable {
            source: self.source.clone(),
            hru_column: self.hru_column.clone(),
            timestamps,
            frame,
        })
    }
}

/// Result of an aggregation, ready for the writer
///
/// `index` is the group key that collapsed the rows (a year, or an HRU id),
/// `timestamps` carries one representative timestamp per row.
#[derive(Debug, Clone)]
pub struct ReducedTable {
    pub label: String,
    pub index_name: String,
    pub index: Vec<i64>,
    pub timestamps: Vec<NaiveDateTime>,
    pub frame: DataFrame,
}

impl ReducedTable {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Un-reduced view of a parsed table, indexed by HRU
    pub fn from_table(table: &AnimationTable, label: impl Into<String>) -> Result<Self> {
        let index = if table.has_column(&table.hru_column) {
            column_i64(&table.frame, &table.hru_column)?
        } else {
            (0..table.height() as i64).collect()
        };

        Ok(Self {
            label: label.into(),
            index_name: table.hru_column.clone(),
            index,
            timestamps: table.timestamps.clone(),
            frame: table.frame.clone(),
        })
    }
}

/// Batch processing statistics
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub outputs_written: usize,
    pub non_finite_tables: usize,
    pub output_dir: PathBuf,
    pub processing_time_ms: u128,
}

/// Values of a column as `f64`, nulls read as NaN
pub fn column_f64(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = frame.column(name)?.cast(&DataType::Float64)?;
    let values = column
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(f64::NAN))
        .collect();
    Ok(values)
}

/// Values of an integer column as `i64`
pub fn column_i64(frame: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let column = frame.column(name)?.cast(&DataType::Int64)?;
    let values = column
        .as_materialized_series()
        .i64()?
        .into_iter()
        .map(|value| value.unwrap_or_default())
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DATETIME_FORMAT;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap()
    }

    fn sample_table(stamps: &[&str]) -> AnimationTable {
        let n = stamps.len();
        let frame = DataFrame::new(vec![
            Column::new("nhru".into(), (0..n as i64).map(|i| i % 2 + 1).collect::<Vec<_>>()),
            Column::new("recharge".into(), (0..n).map(|i| i as f64).collect::<Vec<_>>()),
        ])
        .unwrap();

        AnimationTable {
            source: PathBuf::from("test.animation.nhru"),
            hru_column: "nhru".to_string(),
            timestamps: stamps.iter().map(|s| ts(s)).collect(),
            frame,
        }
    }

    #[test]
    fn test_midpoint() {
        let table = sample_table(&["1981-10-01:00:00:00", "1981-10-03:00:00:00"]);
        assert_eq!(table.midpoint(), Some(ts("1981-10-02:00:00:00")));
    }

    #[test]
    fn test_water_year_detection_uses_second_row() {
        let water = sample_table(&["1981-09-30:00:00:00", "1981-10-01:00:00:00"]);
        assert!(water.is_water_year());

        let calendar = sample_table(&["1981-01-01:00:00:00", "1981-01-02:00:00:00"]);
        assert!(!calendar.is_water_year());

        let single = sample_table(&["1981-10-01:00:00:00"]);
        assert!(!single.is_water_year());
    }

    #[test]
    fn test_since_filters_rows_and_timestamps() {
        let table = sample_table(&[
            "1996-12-31:00:00:00",
            "1997-01-01:00:00:00",
            "1998-06-01:00:00:00",
        ]);

        let windowed = table.since(ts("1997-01-01:00:00:00")).unwrap();

        assert_eq!(windowed.height(), 2);
        assert_eq!(windowed.frame.height(), 2);
        assert_eq!(column_f64(&windowed.frame, "recharge").unwrap(), vec![1.0, 2.0]);
        // Source table is untouched
        assert_eq!(table.height(), 3);
    }

    #[test]
    fn test_variable_columns_exclude_hru() {
        let table = sample_table(&["1981-10-01:00:00:00"]);
        assert_eq!(table.column_names(), vec!["nhru", "recharge"]);
        assert_eq!(table.variable_columns(), vec!["recharge"]);
        assert!(table.require_hru_column().is_ok());
    }

    #[test]
    fn test_missing_hru_column_is_reported() {
        let mut table = sample_table(&["1981-10-01:00:00:00"]);
        table.hru_column = "hru_id".to_string();

        match table.require_hru_column() {
            Err(AnimationError::MissingColumn { column, .. }) => assert_eq!(column, "hru_id"),
            other => panic!("Expected MissingColumn error, got {:?}", other),
        }
    }
}
