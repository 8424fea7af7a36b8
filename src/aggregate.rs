//! Aggregation engine for animation tables.
//!
//! Reduces a timestamp-indexed [`AnimationTable`] by period (year, month) and
//! HRU using a per-variable [`Operation`], or collapses it to per-HRU means.
//! Grouping runs through a polars lazy query; key columns are derived from the
//! timestamps up front so the source table is never modified.

use crate::config::{Operation, ProcessorConfig, RunConfig, UnconfiguredPolicy};
use crate::constants::{
    ANNUAL_LABEL, MONTH_LABELS, WATER_YEAR_SHIFT_MONTHS, WATER_YEAR_START_MONTH,
};
use crate::error::{AnimationError, Result};
use crate::models::{AnimationTable, ReducedTable, column_i64};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info, warn};

const YEAR_KEY: &str = "__year";
const MONTH_KEY: &str = "__month";

impl Operation {
    /// Polars aggregation expression for a column, keeping its name
    ///
    /// Missing cells (NaN) are skipped by every operation.
    pub fn expr(&self, column: &str) -> Expr {
        let expr = col(column).fill_nan(lit(NULL));
        let reduced = match self {
            Operation::Mean => expr.mean(),
            Operation::Sum => expr.sum(),
            Operation::Max => expr.max(),
        };
        reduced.alias(column)
    }
}

/// Period/HRU reducer configured with per-variable operations
#[derive(Debug, Clone)]
pub struct Aggregator {
    operations: Vec<(String, Operation)>,
    policy: UnconfiguredPolicy,
    detect_water_year: bool,
}

impl Aggregator {
    pub fn new(operations: Vec<(String, Operation)>) -> Self {
        Self {
            operations,
            policy: UnconfiguredPolicy::default(),
            detect_water_year: true,
        }
    }

    pub fn from_config(run: &RunConfig, config: &ProcessorConfig) -> Self {
        Self {
            operations: run.operations.clone(),
            policy: config.unconfigured_policy,
            detect_water_year: config.detect_water_year,
        }
    }

    pub fn with_policy(mut self, policy: UnconfiguredPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn without_water_year(mut self) -> Self {
        self.detect_water_year = false;
        self
    }

    fn operation(&self, variable: &str) -> Option<Operation> {
        self.operations
            .iter()
            .find(|(name, _)| name == variable)
            .map(|(_, op)| *op)
    }

    /// Operation for every variable column that will be reduced, in source order
    pub fn resolve_operations(&self, table: &AnimationTable) -> Result<Vec<(String, Operation)>> {
        let mut resolved = Vec::new();
        let mut unconfigured = Vec::new();

        for column in table.variable_columns() {
            match (self.operation(&column), self.policy) {
                (Some(op), _) => resolved.push((column, op)),
                (None, UnconfiguredPolicy::Mean) => resolved.push((column, Operation::Mean)),
                (None, _) => unconfigured.push(column),
            }
        }

        for (name, _) in &self.operations {
            if name != &table.hru_column && !table.has_column(name) {
                debug!(
                    "Configured variable '{}' not present in {}",
                    name,
                    table.source.display()
                );
            }
        }

        if !unconfigured.is_empty() {
            match self.policy {
                UnconfiguredPolicy::Error => {
                    return Err(AnimationError::UnconfiguredColumns {
                        columns: unconfigured,
                    });
                }
                _ => warn!(
                    "No operation configured for {} in {}; column(s) dropped from output",
                    unconfigured.join(", "),
                    table.source.display()
                ),
            }
        }

        Ok(resolved)
    }

    /// Reduce by {year, HRU}
    ///
    /// Water-year tables (second row in October) are grouped on timestamps
    /// shifted forward three months, so October-September lands in the year
    /// holding its last nine months.
    pub fn annual(&self, table: &AnimationTable) -> Result<ReducedTable> {
        info!("calculating annual statistics...");
        table.require_hru_column()?;

        let water_year = self.detect_water_year && table.is_water_year();
        if water_year {
            debug!("{} holds water years", table.source.display());
        }

        let years: Vec<i32> = table
            .timestamps
            .iter()
            .map(|ts| grouping_year(ts, water_year))
            .collect();

        let operations = self.resolve_operations(table)?;
        let reduced = reduce(table, &[(YEAR_KEY, years)], &operations)?;

        let index: Vec<i64> = column_i64(&reduced, YEAR_KEY)?;
        let end_month = if water_year {
            WATER_YEAR_START_MONTH - 1
        } else {
            12
        };
        let timestamps = index
            .iter()
            .map(|&year| period_end(year as i32, end_month))
            .collect::<Result<Vec<_>>>()?;

        Ok(ReducedTable {
            label: ANNUAL_LABEL.to_string(),
            index_name: "year".to_string(),
            index,
            timestamps,
            frame: output_columns(table, &reduced, &operations)?,
        })
    }

    /// Reduce by {month, year, HRU}, one table per calendar month present
    pub fn monthly(&self, table: &AnimationTable) -> Result<Vec<ReducedTable>> {
        info!("calculating monthly statistics...");
        table.require_hru_column()?;

        let months: Vec<i32> = table.timestamps.iter().map(|ts| ts.month() as i32).collect();
        let years: Vec<i32> = table.timestamps.iter().map(|ts| ts.year()).collect();

        let operations = self.resolve_operations(table)?;
        let reduced = reduce(
            table,
            &[(MONTH_KEY, months), (YEAR_KEY, years)],
            &operations,
        )?;

        let reduced_months = column_i64(&reduced, MONTH_KEY)?;
        let mut tables = Vec::new();

        for (month, label) in (1..=12).zip(MONTH_LABELS) {
            let mask: Vec<bool> = reduced_months.iter().map(|&m| m == month).collect();
            if !mask.contains(&true) {
                continue;
            }

            let month_frame = reduced.filter(&BooleanChunked::from_slice("month".into(), &mask))?;
            let index = column_i64(&month_frame, YEAR_KEY)?;
            let timestamps = index
                .iter()
                .map(|&year| period_end(year as i32, month as u32))
                .collect::<Result<Vec<_>>>()?;

            tables.push(ReducedTable {
                label: label.to_string(),
                index_name: "year".to_string(),
                index,
                timestamps,
                frame: output_columns(table, &month_frame, &operations)?,
            });
        }

        debug!("Monthly reduction produced {} tables", tables.len());
        Ok(tables)
    }
}

/// Mean of every variable per HRU over the whole table
///
/// The result is indexed by HRU id; every row carries the table's time midpoint.
pub fn hru_means(table: &AnimationTable, label: impl Into<String>) -> Result<ReducedTable> {
    table.require_hru_column()?;

    let operations: Vec<(String, Operation)> = table
        .variable_columns()
        .into_iter()
        .map(|column| (column, Operation::Mean))
        .collect();

    let reduced = reduce(table, &[], &operations)?;
    let index = column_i64(&reduced, &table.hru_column)?;

    let midpoint = table
        .midpoint()
        .ok_or_else(|| AnimationError::EmptyTable {
            path: table.source.clone(),
        })?;

    let names: Vec<String> = operations.iter().map(|(name, _)| name.clone()).collect();

    Ok(ReducedTable {
        label: label.into(),
        index_name: table.hru_column.clone(),
        timestamps: vec![midpoint; index.len()],
        index,
        frame: reduced.select(names)?,
    })
}

/// Group by the given keys plus the HRU column, sorted ascending by key
fn reduce(
    table: &AnimationTable,
    keys: &[(&str, Vec<i32>)],
    operations: &[(String, Operation)],
) -> Result<DataFrame> {
    let mut frame = table.frame.clone();
    for (name, values) in keys {
        frame.with_column(Column::new((*name).into(), values.clone()))?;
    }

    let mut by: Vec<Expr> = keys.iter().map(|(name, _)| col(*name)).collect();
    by.push(col(table.hru_column.as_str()));

    let aggregations: Vec<Expr> = operations
        .iter()
        .map(|(column, op)| op.expr(column))
        .collect();

    let reduced = frame
        .lazy()
        .group_by(by.clone())
        .agg(aggregations)
        .sort_by_exprs(by, SortMultipleOptions::default())
        .collect()?;

    debug!(
        "Reduced {} rows to {} groups over {} columns",
        table.height(),
        reduced.height(),
        operations.len()
    );
    Ok(reduced)
}

/// HRU column plus reduced variables, in source column order
fn output_columns(
    table: &AnimationTable,
    reduced: &DataFrame,
    operations: &[(String, Operation)],
) -> Result<DataFrame> {
    let order: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|name| {
            name == &table.hru_column || operations.iter().any(|(column, _)| column == name)
        })
        .collect();
    Ok(reduced.select(order)?)
}

/// Year a timestamp is attributed to, optionally under the water-year shift
pub fn grouping_year(ts: &NaiveDateTime, water_year: bool) -> i32 {
    if water_year {
        ts.checked_add_months(Months::new(WATER_YEAR_SHIFT_MONTHS))
            .unwrap_or(*ts)
            .year()
    } else {
        ts.year()
    }
}

/// Midnight on the last day of a month
pub fn period_end(year: i32, month: u32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .and_then(|last| last.and_hms_opt(0, 0, 0))
        .ok_or(AnimationError::InvalidPeriod { year, month })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::column_f64;
    use crate::test_utils::{monthly_table, ts};

    fn water_year_table() -> AnimationTable {
        // Oct 1981 .. Sep 1983, two HRUs
        monthly_table(
            NaiveDate::from_ymd_opt(1981, 10, 1).unwrap(),
            24,
            &[1, 2],
            &["soil_moist", "recharge", "tmaxf"],
            |c, m, hru| match c {
                0 => f64::from(m),
                1 => f64::from(m + 1) * hru as f64,
                _ => 10.0 + f64::from(m % 12),
            },
        )
    }

    fn operations() -> Vec<(String, Operation)> {
        vec![
            ("nhru".to_string(), Operation::Mean),
            ("recharge".to_string(), Operation::Sum),
            ("soil_moist".to_string(), Operation::Mean),
            ("pkwater_equiv".to_string(), Operation::Max),
        ]
    }

    #[test]
    fn test_grouping_year_shift() {
        assert_eq!(grouping_year(&ts("1981-10-01:00:00:00"), true), 1982);
        assert_eq!(grouping_year(&ts("1982-09-30:00:00:00"), true), 1982);
        assert_eq!(grouping_year(&ts("1982-10-01:00:00:00"), true), 1983);
        assert_eq!(grouping_year(&ts("1981-10-01:00:00:00"), false), 1981);
    }

    #[test]
    fn test_period_end() {
        assert_eq!(period_end(1982, 9).unwrap(), ts("1982-09-30:00:00:00"));
        assert_eq!(period_end(1984, 2).unwrap(), ts("1984-02-29:00:00:00"));
        assert_eq!(period_end(1982, 12).unwrap(), ts("1982-12-31:00:00:00"));
        assert!(period_end(1982, 13).is_err());
    }

    #[test]
    fn test_annual_sum_over_water_year() {
        let table = water_year_table();
        let annual = Aggregator::new(operations()).annual(&table).unwrap();

        assert_eq!(annual.index, vec![1982, 1982, 1983, 1983]);
        assert_eq!(column_i64(&annual.frame, "nhru").unwrap(), vec![1, 2, 1, 2]);

        // recharge = (m + 1) * hru, summed over m = 0..11 and m = 12..23
        let first_year: f64 = (1..=12).map(f64::from).sum();
        let second_year: f64 = (13..=24).map(f64::from).sum();
        assert_eq!(
            column_f64(&annual.frame, "recharge").unwrap(),
            vec![first_year, first_year * 2.0, second_year, second_year * 2.0]
        );

        assert_eq!(annual.timestamps[0], ts("1982-09-30:00:00:00"));
        assert_eq!(annual.timestamps[3], ts("1983-09-30:00:00:00"));
    }

    #[test]
    fn test_annual_mean_and_column_order() {
        let table = water_year_table();
        let annual = Aggregator::new(operations()).annual(&table).unwrap();

        // Source order is nhru, soil_moist, recharge, tmaxf; tmaxf is unconfigured
        assert_eq!(annual.column_names(), vec!["nhru", "soil_moist", "recharge"]);
        assert_eq!(
            column_f64(&annual.frame, "soil_moist").unwrap(),
            vec![5.5, 5.5, 17.5, 17.5]
        );
    }

    #[test]
    fn test_annual_leaves_source_untouched() {
        let table = water_year_table();
        let before = table.timestamps.clone();

        let aggregator = Aggregator::new(operations());
        aggregator.annual(&table).unwrap();
        let monthly = aggregator.monthly(&table).unwrap();

        assert_eq!(table.timestamps, before);
        // October rows still belong to October after the annual pass
        let october = monthly.iter().find(|t| t.label == "oct").unwrap();
        assert_eq!(october.index, vec![1981, 1981, 1982, 1982]);
    }

    #[test]
    fn test_annual_calendar_years() {
        let table = water_year_table();
        let annual = Aggregator::new(operations())
            .without_water_year()
            .annual(&table)
            .unwrap();

        assert_eq!(annual.index, vec![1981, 1981, 1982, 1982, 1983, 1983]);
        assert_eq!(annual.timestamps[0], ts("1981-12-31:00:00:00"));
    }

    #[test]
    fn test_monthly_produces_twelve_tables() {
        let table = water_year_table();
        let monthly = Aggregator::new(operations()).monthly(&table).unwrap();

        assert_eq!(monthly.len(), 12);
        let labels: Vec<&str> = monthly.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, MONTH_LABELS.to_vec());

        for month in &monthly {
            // Two years x two HRUs
            assert_eq!(month.height(), 4);
            assert_eq!(month.column_names(), vec!["nhru", "soil_moist", "recharge"]);
        }

        let january = &monthly[0];
        assert_eq!(january.index, vec![1982, 1982, 1983, 1983]);
        assert_eq!(january.timestamps[0], ts("1982-01-31:00:00:00"));
        // January 1982 is month offset 3
        assert_eq!(column_f64(&january.frame, "soil_moist").unwrap()[0], 3.0);
    }

    #[test]
    fn test_monthly_skips_absent_months() {
        let table = monthly_table(
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            3,
            &[1],
            &["recharge"],
            |_, m, _| f64::from(m),
        );
        let monthly = Aggregator::new(operations()).monthly(&table).unwrap();
        let labels: Vec<&str> = monthly.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["jan", "feb", "mar"]);
    }

    #[test]
    fn test_unconfigured_policy_mean_keeps_column() {
        let table = water_year_table();
        let annual = Aggregator::new(operations())
            .with_policy(UnconfiguredPolicy::Mean)
            .annual(&table)
            .unwrap();

        assert_eq!(
            annual.column_names(),
            vec!["nhru", "soil_moist", "recharge", "tmaxf"]
        );
        assert_eq!(column_f64(&annual.frame, "tmaxf").unwrap()[0], 15.5);
    }

    #[test]
    fn test_unconfigured_policy_error() {
        let table = water_year_table();
        let result = Aggregator::new(operations())
            .with_policy(UnconfiguredPolicy::Error)
            .annual(&table);

        match result {
            Err(AnimationError::UnconfiguredColumns { columns }) => {
                assert_eq!(columns, vec!["tmaxf"]);
            }
            other => panic!("Expected UnconfiguredColumns error, got {:?}", other),
        }
    }

    #[test]
    fn test_max_operation() {
        let table = water_year_table();
        let aggregator = Aggregator::new(vec![("tmaxf".to_string(), Operation::Max)]);
        let annual = aggregator.annual(&table).unwrap();

        assert_eq!(annual.column_names(), vec!["nhru", "tmaxf"]);
        assert_eq!(column_f64(&annual.frame, "tmaxf").unwrap(), vec![21.0; 4]);
    }

    #[test]
    fn test_hru_means() {
        let table = water_year_table();
        let means = hru_means(&table, "hru_means").unwrap();

        assert_eq!(means.index, vec![1, 2]);
        assert_eq!(means.index_name, "nhru");
        assert_eq!(means.column_names(), vec!["soil_moist", "recharge", "tmaxf"]);
        assert_eq!(column_f64(&means.frame, "soil_moist").unwrap(), vec![11.5, 11.5]);
        assert_eq!(means.timestamps, vec![table.midpoint().unwrap(); 2]);
    }

    #[test]
    fn test_missing_hru_column() {
        let mut table = water_year_table();
        table.hru_column = "hru_id".to_string();

        assert!(matches!(
            Aggregator::new(operations()).annual(&table),
            Err(AnimationError::MissingColumn { .. })
        ));
        assert!(hru_means(&table, "hru_means").is_err());
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        // One HRU, calendar 1990, recharge missing in June
        let table = monthly_table(
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            12,
            &[1],
            &["recharge"],
            |_, m, _| if m == 5 { f64::NAN } else { 1.0 },
        );

        for (op, expected) in [
            (Operation::Mean, 1.0),
            (Operation::Sum, 11.0),
            (Operation::Max, 1.0),
        ] {
            let annual = Aggregator::new(vec![("recharge".to_string(), op)])
                .annual(&table)
                .unwrap();
            assert_eq!(
                column_f64(&annual.frame, "recharge").unwrap(),
                vec![expected],
                "{} over a missing cell",
                op
            );
        }

        let means = hru_means(&table, "hru_means").unwrap();
        assert_eq!(column_f64(&means.frame, "recharge").unwrap(), vec![1.0]);
    }

    #[test]
    fn test_all_missing_month_stays_missing() {
        let table = monthly_table(
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            2,
            &[1],
            &["recharge"],
            |_, m, _| if m == 0 { f64::NAN } else { 2.0 },
        );

        let monthly = Aggregator::new(vec![("recharge".to_string(), Operation::Mean)])
            .monthly(&table)
            .unwrap();
        assert!(column_f64(&monthly[0].frame, "recharge").unwrap()[0].is_nan());
        assert_eq!(column_f64(&monthly[1].frame, "recharge").unwrap(), vec![2.0]);
    }
}
