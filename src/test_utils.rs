//! Fixtures shared by unit tests across modules

use crate::constants::DATETIME_FORMAT;
use crate::models::AnimationTable;
use chrono::{Months, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::PathBuf;

pub fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).unwrap()
}

/// Monthly table starting at `start`, one row per HRU per month
///
/// `value(column_index, month_offset, hru)` supplies each variable cell.
pub fn monthly_table(
    start: NaiveDate,
    months: u32,
    hrus: &[i64],
    variables: &[&str],
    value: impl Fn(usize, u32, i64) -> f64,
) -> AnimationTable {
    let mut timestamps = Vec::new();
    let mut ids = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); variables.len()];

    for m in 0..months {
        let date = start.checked_add_months(Months::new(m)).unwrap();
        for &hru in hrus {
            timestamps.push(date.and_hms_opt(0, 0, 0).unwrap());
            ids.push(hru);
            for (c, values) in columns.iter_mut().enumerate() {
                values.push(value(c, m, hru));
            }
        }
    }

    let mut frame_columns = vec![Column::new("nhru".into(), ids)];
    for (name, values) in variables.iter().zip(columns) {
        frame_columns.push(Column::new((*name).into(), values));
    }

    AnimationTable {
        source: PathBuf::from("fixture.animation.nhru"),
        hru_column: "nhru".to_string(),
        timestamps,
        frame: DataFrame::new(frame_columns).unwrap(),
    }
}

/// Water-year animation file text: Oct 1981 - Sep 1982, HRUs 1 and 2
pub fn water_year_file() -> String {
    let mut content = String::from(
        "#
# Begin DBF
# timestamp,#FIELD_DATETIME,19,0
# nhru,#FIELD_DECIMAL,10,0
# soil_moist,#FIELD_DECIMAL,10,4
# recharge,#FIELD_DECIMAL,10,4
# End DBF
#
timestamp\tnhru\tsoil_moist\trecharge
19d\t10n\t10n\t10n
",
    );

    let start = NaiveDate::from_ymd_opt(1981, 10, 1).unwrap();
    for m in 0..12 {
        let date = start.checked_add_months(Months::new(m)).unwrap();
        for hru in 1..=2 {
            // soil_moist stays within [1, 10); recharge is 0.5 * hru
            let soil_moist = format!("{:.4}E+00", 1.0 + f64::from(m) * 0.25);
            let recharge = if hru == 1 { "5.0000E-01" } else { "1.0000E+00" };
            content.push_str(&format!(
                "{}:00:00:00\t{:>10}\t{}\t{}\n",
                date.format("%Y-%m-%d"),
                hru,
                soil_moist,
                recharge,
            ));
        }
    }
    content
}
