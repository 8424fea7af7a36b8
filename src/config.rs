//! Configuration management and validation.
//!
//! Provides processor settings (HRU column, water-year handling, policy for
//! unconfigured columns, output format, averaging window) and the parser for
//! PRMS run files listing the animation files and per-variable operations.

use crate::constants::{
    ANIMATION_EXTENSION, DEFAULT_DIAGNOSTICS_FILE, DEFAULT_HRU_COLUMN, DEFAULT_OUTPUT_DIR,
    MAX_NYEARS,
};
use crate::error::{AnimationError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Reduction applied to a variable within each group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Mean,
    Sum,
    Max,
}

impl FromStr for Operation {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Operation::Mean),
            "sum" => Ok(Operation::Sum),
            "max" => Ok(Operation::Max),
            other => Err(AnimationError::configuration(format!(
                "Unknown operation '{}' (expected mean, sum or max)",
                other
            ))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Mean => write!(f, "mean"),
            Operation::Sum => write!(f, "sum"),
            Operation::Max => write!(f, "max"),
        }
    }
}

/// What to do with a source column that has no configured operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnconfiguredPolicy {
    /// Leave the column out of reduced outputs
    #[default]
    Drop,
    /// Reduce the column with its mean
    Mean,
    /// Refuse to reduce the table
    Error,
}

/// Serialisation of reduced tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Animation file layout with header block and format row
    #[default]
    Animation,
    /// Plain comma-separated values with an index column
    Csv,
}

/// Global configuration for animation processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Name of the spatial-unit identifier column
    pub hru_column: String,
    /// Detect water-year files and attribute Oct-Sep to the following year
    pub detect_water_year: bool,
    /// Handling of columns with no configured operation
    pub unconfigured_policy: UnconfiguredPolicy,
    /// Output serialisation
    pub output_format: OutputFormat,
    /// Restrict mean computations to the last N years of each table
    pub nyears: Option<u32>,
    /// Diagnostics report file name, relative to the output directory
    pub diagnostics_file: PathBuf,
    /// Keep processing the batch after a file fails
    pub continue_on_error: bool,
    /// Output directory
    pub output_dir: PathBuf,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            hru_column: DEFAULT_HRU_COLUMN.to_string(),
            detect_water_year: true,
            unconfigured_policy: UnconfiguredPolicy::default(),
            output_format: OutputFormat::default(),
            nyears: None,
            diagnostics_file: PathBuf::from(DEFAULT_DIAGNOSTICS_FILE),
            continue_on_error: true,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl ProcessorConfig {
    pub fn with_hru_column(mut self, hru_column: impl Into<String>) -> Self {
        self.hru_column = hru_column.into();
        self
    }

    pub fn with_unconfigured_policy(mut self, policy: UnconfiguredPolicy) -> Self {
        self.unconfigured_policy = policy;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_nyears(mut self, nyears: Option<u32>) -> Self {
        self.nyears = nyears;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_diagnostics_file(mut self, diagnostics_file: impl Into<PathBuf>) -> Self {
        self.diagnostics_file = diagnostics_file.into();
        self
    }

    /// Disable water-year detection
    pub fn without_water_year(mut self) -> Self {
        self.detect_water_year = false;
        self
    }

    /// Stop the batch at the first failing file
    pub fn with_fail_fast(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    /// Diagnostics report path, resolved against the output directory
    pub fn diagnostics_path(&self) -> PathBuf {
        if self.diagnostics_file.is_absolute() {
            self.diagnostics_file.clone()
        } else {
            self.output_dir.join(&self.diagnostics_file)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hru_column.trim().is_empty() {
            return Err(AnimationError::configuration("HRU column name cannot be empty"));
        }
        if self.nyears == Some(0) {
            return Err(AnimationError::configuration(
                "Averaging window must cover at least one year",
            ));
        }
        if let Some(n) = self.nyears.filter(|&n| n > MAX_NYEARS) {
            return Err(AnimationError::configuration(format!(
                "Averaging window of {} years exceeds the maximum of {}",
                n, MAX_NYEARS
            )));
        }
        Ok(())
    }
}

/// Input files and per-variable operations read from a PRMS run file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub source: PathBuf,
    pub input_files: Vec<PathBuf>,
    /// Variable → operation, in file order
    pub operations: Vec<(String, Operation)>,
}

impl RunConfig {
    /// Read and parse a run file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnimationError::input_file(path, e.to_string()))?;
        let mut config = Self::parse(&content)?;
        config.source = path.to_path_buf();
        Ok(config)
    }

    /// Parse run file text
    ///
    /// ```text
    /// Input path
    /// /data/prms/output
    /// cccma_cgcm3_1.20c3m.1981-2000.animation.nhru
    /// # Operations-------------------
    /// nhru,mean
    /// recharge,sum
    /// ```
    pub fn parse(content: &str) -> Result<Self> {
        let input_path_marker = marker(r"(?i)input path")?;
        let operations_marker = marker(r"(?i)operations------")?;

        let mut config = RunConfig::default();
        let mut base_dir: Option<PathBuf> = None;
        let mut expecting_base_dir = false;
        let mut in_operations = false;

        for (line_number, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();

            if in_operations {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                config.operations.push(parse_operation(line, line_number + 1)?);
                continue;
            }

            if operations_marker.is_match(line) {
                in_operations = true;
                continue;
            }

            if input_path_marker.is_match(line) {
                expecting_base_dir = true;
                continue;
            }

            if expecting_base_dir {
                if line.is_empty() {
                    continue;
                }
                base_dir = Some(PathBuf::from(line));
                expecting_base_dir = false;
                continue;
            }

            if line.ends_with(ANIMATION_EXTENSION) {
                let file = match &base_dir {
                    Some(dir) => dir.join(line),
                    None => PathBuf::from(line),
                };
                config.input_files.push(file);
            }
        }

        debug!(
            "Run file lists {} input files and {} operations",
            config.input_files.len(),
            config.operations.len()
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_files.is_empty() {
            return Err(AnimationError::configuration(format!(
                "No *{} input files listed in {}",
                ANIMATION_EXTENSION,
                self.source.display()
            )));
        }
        if self.operations.is_empty() {
            return Err(AnimationError::configuration(format!(
                "No operations block found in {}",
                self.source.display()
            )));
        }
        Ok(())
    }
}

fn marker(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| AnimationError::configuration(format!("Invalid marker pattern: {}", e)))
}

fn parse_operation(line: &str, line_number: usize) -> Result<(String, Operation)> {
    let mut parts = line.split(',');
    let variable = parts.next().unwrap_or_default().trim();
    let operation = parts.next().ok_or_else(|| {
        AnimationError::configuration(format!(
            "Line {}: expected 'variable,operation', found '{}'",
            line_number, line
        ))
    })?;

    if variable.is_empty() {
        return Err(AnimationError::configuration(format!(
            "Line {}: missing variable name in '{}'",
            line_number, line
        )));
    }

    let operation = operation.parse::<Operation>().map_err(|_| {
        AnimationError::configuration(format!(
            "Line {}: unknown operation '{}' for {} (expected mean, sum or max)",
            line_number,
            operation.trim(),
            variable
        ))
    })?;

    Ok((variable.to_string(), operation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const RUN_FILE: &str = "PRMS animation post-processing
Input path
/data/prms/output

cccma_cgcm3_1.20c3m.1981-2000.animation.nhru
cccma_cgcm3_1.sresa2.2046-2065.animation.nhru

# Operations-------------------------
# variable,operation
nhru,mean
soil_moist,Mean

recharge,sum
pkwater_equiv,max
";

    #[test]
    fn test_parse_run_file() {
        let config = RunConfig::parse(RUN_FILE).unwrap();

        assert_eq!(
            config.input_files,
            vec![
                PathBuf::from("/data/prms/output/cccma_cgcm3_1.20c3m.1981-2000.animation.nhru"),
                PathBuf::from("/data/prms/output/cccma_cgcm3_1.sresa2.2046-2065.animation.nhru"),
            ]
        );
        assert_eq!(
            config.operations,
            vec![
                ("nhru".to_string(), Operation::Mean),
                ("soil_moist".to_string(), Operation::Mean),
                ("recharge".to_string(), Operation::Sum),
                ("pkwater_equiv".to_string(), Operation::Max),
            ]
        );
    }

    #[test]
    fn test_base_dir_skips_blank_lines() {
        let config = RunConfig::parse("INPUT PATH\n\n  /runs  \nbase.animation.nhru\n").unwrap();
        assert_eq!(
            config.input_files,
            vec![PathBuf::from("/runs/base.animation.nhru")]
        );
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let result = RunConfig::parse("operations------\nrecharge,median\n");
        match result {
            Err(AnimationError::Configuration { message }) => {
                assert!(message.contains("Line 2"));
                assert!(message.contains("median"));
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_operation_line_without_comma_is_rejected() {
        assert!(RunConfig::parse("operations------\nrecharge\n").is_err());
    }

    #[test]
    fn test_validate_requires_inputs_and_operations() {
        assert!(RunConfig::default().validate().is_err());

        let config = RunConfig::parse("a.animation.nhru\n").unwrap();
        assert!(config.validate().is_err());

        let config = RunConfig::parse("a.animation.nhru\noperations------\nrecharge,sum\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_run_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", RUN_FILE).unwrap();

        let config = RunConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.source, temp_file.path());
        assert_eq!(config.input_files.len(), 2);
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("MAX".parse::<Operation>().unwrap(), Operation::Max);
        assert_eq!(" sum ".parse::<Operation>().unwrap(), Operation::Sum);
        assert!("avg".parse::<Operation>().is_err());
        assert_eq!(Operation::Mean.to_string(), "mean");
    }

    #[test]
    fn test_processor_config_defaults_and_builders() {
        let config = ProcessorConfig::default();
        assert_eq!(config.hru_column, "nhru");
        assert!(config.detect_water_year);
        assert!(config.continue_on_error);
        assert_eq!(config.unconfigured_policy, UnconfiguredPolicy::Drop);
        assert!(config.validate().is_ok());

        let config = ProcessorConfig::default()
            .with_output_dir("/tmp/out")
            .with_nyears(Some(2))
            .with_fail_fast()
            .without_water_year();
        assert_eq!(
            config.diagnostics_path(),
            PathBuf::from("/tmp/out/hru_statistics_errors.txt")
        );
        assert_eq!(config.nyears, Some(2));
        assert!(!config.continue_on_error);
        assert!(!config.detect_water_year);
    }

    #[test]
    fn test_processor_config_validation() {
        assert!(ProcessorConfig::default().with_hru_column(" ").validate().is_err());
        assert!(ProcessorConfig::default().with_nyears(Some(0)).validate().is_err());
    }

    #[test]
    fn test_nyears_upper_bound() {
        let config = ProcessorConfig::default().with_nyears(Some(MAX_NYEARS));
        assert!(config.validate().is_ok());

        for nyears in [MAX_NYEARS + 1, i32::MAX as u32 + 1, u32::MAX] {
            match ProcessorConfig::default().with_nyears(Some(nyears)).validate() {
                Err(AnimationError::Configuration { message }) => {
                    assert!(message.contains(&nyears.to_string()));
                }
                other => panic!("Expected Configuration error, got {:?}", other),
            }
        }
    }
}
