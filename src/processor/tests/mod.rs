//! Integration tests for the processor module
//!
//! Runs the batch pipeline end to end on animation files written to a
//! temporary directory.


use crate::writer::format_scientific;
use chrono::{Datelike, Months, NaiveDate};
use std::fs;
use std::path::{Path, PathBuf};

/// Calendar-year animation text for HRUs 1..=hrus; `value(hru)` fills `recharge`,
/// `soil_moist` is constant 2.0
pub fn calendar_file(start_year: i32, years: u32, hrus: i64, value: impl Fn(i64) -> f64) -> String {
    let mut content = String::from(
        "#
# Begin DBF
# timestamp,#FIELD_DATETIME,19,0
# nhru,#FIELD_DECIMAL,10,0
# recharge,#FIELD_DECIMAL,10,4
# soil_moist,#FIELD_DECIMAL,10,4
# End DBF
#
timestamp\tnhru\trecharge\tsoil_moist
19d\t10n\t10n\t10n
",
    );

    let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap();
    for m in 0..years * 12 {
        let date = start.checked_add_months(Months::new(m)).unwrap();
        for hru in 1..=hrus {
            content.push_str(&format!(
                "{:04}-{:02}-01:00:00:00\t{:>10}\t{}\t{}\n",
                date.year(),
                date.month(),
                hru,
                format_scientific(value(hru), 4),
                format_scientific(2.0, 4),
            ));
        }
    }
    content
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Run file listing `files` under `base` with the given operations block
pub fn write_run_file(dir: &Path, base: &Path, files: &[&str], operations: &[&str]) -> PathBuf {
    let mut content = format!("PRMS run\nInput path\n{}\n\n", base.display());
    for file in files {
        content.push_str(file);
        content.push('\n');
    }
    content.push_str("\n# Operations------------------\n");
    for operation in operations {
        content.push_str(operation);
        content.push('\n');
    }
    write_file(dir, "run.control", &content)
}
