//! Per-HRU means and baseline-vs-period percent differences.
//!
//! Each table is optionally restricted to its last `nyears` calendar years
//! before averaging. Percent differences are aligned by HRU id, so periods
//! may cover a different set of HRUs than the baseline.

use crate::aggregate::hru_means;
use crate::constants::{HRU_MEANS_LABEL, HRU_PCT_DIFF_LABEL};
use crate::error::{AnimationError, Result};
use crate::models::{AnimationTable, ReducedTable, column_f64};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Non-finite cells found in a table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NonFiniteSummary {
    pub table: String,
    /// Count per column, every column listed
    pub counts: Vec<(String, usize)>,
    /// Index values of offending rows, affected columns only
    pub indices: Vec<(String, Vec<i64>)>,
}

impl NonFiniteSummary {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

/// Means and percent differences for one period against the baseline
#[derive(Debug, Clone)]
pub struct PeriodComparison {
    pub means: ReducedTable,
    pub pct_diff: ReducedTable,
    pub non_finite: NonFiniteSummary,
}

/// Baseline means, computed once and shared by every period comparison
#[derive(Debug, Clone)]
pub struct HruStatistics {
    nyears: Option<u32>,
    baseline: ReducedTable,
}

impl HruStatistics {
    pub fn new(baseline: &AnimationTable, nyears: Option<u32>) -> Result<Self> {
        info!("calculating baseline means...");
        let windowed = window(baseline, nyears)?;
        Ok(Self {
            nyears,
            baseline: hru_means(&windowed, HRU_MEANS_LABEL)?,
        })
    }

    pub fn baseline_means(&self) -> &ReducedTable {
        &self.baseline
    }

    pub fn compare(&self, period: &AnimationTable) -> Result<PeriodComparison> {
        info!("calculating percent differences for {}...", period.source.display());
        let windowed = window(period, self.nyears)?;
        let means = hru_means(&windowed, HRU_MEANS_LABEL)?;
        let pct_diff = percent_difference(&self.baseline, &means)?;

        let non_finite = check_finite(&pct_diff, &period.source.display().to_string())?;
        if !non_finite.is_empty() {
            warn!(
                "{} non-finite percent differences in {}",
                non_finite.total(),
                period.source.display()
            );
        }

        Ok(PeriodComparison {
            means,
            pct_diff,
            non_finite,
        })
    }

    pub fn compare_all(&self, periods: &[AnimationTable]) -> Result<Vec<PeriodComparison>> {
        periods.iter().map(|period| self.compare(period)).collect()
    }
}

/// Restrict a table to timestamps from January 1 of `last.year - nyears`
pub fn window(table: &AnimationTable, nyears: Option<u32>) -> Result<AnimationTable> {
    let (Some(n), Some(last)) = (nyears, table.last_timestamp()) else {
        return Ok(table.clone());
    };

    let year = i32::try_from(n)
        .ok()
        .and_then(|n| last.year().checked_sub(n))
        .ok_or_else(|| {
            AnimationError::configuration(format!("Averaging window of {} years is out of range", n))
        })?;
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(AnimationError::InvalidPeriod { year, month: 1 })?;

    let windowed = table.since(start)?;
    debug!(
        "Window from {} keeps {} of {} rows in {}",
        start,
        windowed.height(),
        table.height(),
        table.source.display()
    );

    if windowed.height() == 0 {
        return Err(AnimationError::EmptyTable {
            path: table.source.clone(),
        });
    }
    Ok(windowed)
}

/// `100 * (period - baseline) / baseline`, aligned by HRU id
///
/// HRUs or variables absent from the baseline yield NaN.
pub fn percent_difference(baseline: &ReducedTable, period: &ReducedTable) -> Result<ReducedTable> {
    let baseline_rows: HashMap<i64, usize> = baseline
        .index
        .iter()
        .enumerate()
        .map(|(row, &hru)| (hru, row))
        .collect();
    let baseline_columns = baseline.column_names();

    let mut columns = Vec::new();
    for name in period.column_names() {
        let current = column_f64(&period.frame, &name)?;
        let reference = if baseline_columns.contains(&name) {
            Some(column_f64(&baseline.frame, &name)?)
        } else {
            debug!("Variable '{}' missing from baseline", name);
            None
        };

        let pct: Vec<f64> = period
            .index
            .iter()
            .zip(current)
            .map(|(hru, p)| {
                match (&reference, baseline_rows.get(hru)) {
                    (Some(values), Some(&row)) => {
                        let b = values[row];
                        100.0 * (p - b) / b
                    }
                    _ => f64::NAN,
                }
            })
            .collect();
        columns.push(Column::new(name.as_str().into(), pct));
    }

    Ok(ReducedTable {
        label: HRU_PCT_DIFF_LABEL.to_string(),
        index_name: period.index_name.clone(),
        index: period.index.clone(),
        timestamps: period.timestamps.clone(),
        frame: DataFrame::new(columns)?,
    })
}

/// Count non-finite cells per column and collect the offending index values
pub fn check_finite(table: &ReducedTable, name: &str) -> Result<NonFiniteSummary> {
    let mut summary = NonFiniteSummary {
        table: name.to_string(),
        ..Default::default()
    };

    for column in table.column_names() {
        let values = column_f64(&table.frame, &column)?;
        let offending: Vec<i64> = table
            .index
            .iter()
            .zip(&values)
            .filter(|(_, value)| !value.is_finite())
            .map(|(&id, _)| id)
            .collect();

        summary.counts.push((column.clone(), offending.len()));
        if !offending.is_empty() {
            summary.indices.push((column, offending));
        }
    }

    Ok(summary)
}
