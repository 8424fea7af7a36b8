//! Application constants for the PRMS animation processor
//!
//! File format tokens, default column names and output naming conventions
//! shared by the parser, aggregation engine and writer.

// =============================================================================
// Animation File Format
// =============================================================================

/// Literal first field of the column-name row; marks the end of the header block
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Timestamp representation used in the first data column
pub const DATETIME_FORMAT: &str = "%Y-%m-%d:%H:%M:%S";

/// Default name of the spatial-unit (HRU) identifier column
pub const DEFAULT_HRU_COLUMN: &str = "nhru";

/// File extension for per-HRU animation files
pub const ANIMATION_EXTENSION: &str = ".nhru";

/// Marker separating the run name from the rest of an animation file name
pub const ANIMATION_NAME_MARKER: &str = "animation";

/// Number of leading lines read when sniffing the delimiter
pub const SNIFF_LINE_LIMIT: usize = 100;

/// Delimiters considered by the sniffer, in order of preference
pub const CANDIDATE_DELIMITERS: &[char] = &['\t', ',', ';', '|'];

/// Header directive tokens
pub mod directives {
    /// Numeric field with trailing width and precision tokens
    pub const FIELD_DECIMAL: &str = "FIELD_DECIMAL";

    /// Date/time field
    pub const DATETIME: &str = "DATETIME";
}

/// Lines framing the per-column directives in a written header
pub mod framing {
    pub const BLANK: &str = "#";
    pub const BEGIN_DBF: &str = "# Begin DBF";
    pub const END_DBF: &str = "# End DBF";
}

// =============================================================================
// Cell Rendering
// =============================================================================

/// Precision used for columns without a FIELD_DECIMAL directive
pub const DEFAULT_PRECISION: usize = 6;

/// Rendering for NaN and infinite values
pub const MISSING_VALUE_MARKER: &str = "NAN";

// =============================================================================
// Aggregation and Output
// =============================================================================

/// Month abbreviations used to label monthly outputs
pub const MONTH_LABELS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// First month of the hydrological (water) year
pub const WATER_YEAR_START_MONTH: u32 = 10;

/// Months added to timestamps so a water year lands in its calendar year
pub const WATER_YEAR_SHIFT_MONTHS: u32 = 3;

/// Label and sub-directory for per-HRU mean outputs
pub const HRU_MEANS_LABEL: &str = "hru_means";

/// Label and sub-directory for per-HRU percent-difference outputs
pub const HRU_PCT_DIFF_LABEL: &str = "hru_pct_diff";

/// Label for annual summary outputs
pub const ANNUAL_LABEL: &str = "annual";

/// Default diagnostics report written next to comparison outputs
pub const DEFAULT_DIAGNOSTICS_FILE: &str = "hru_statistics_errors.txt";

/// Default output directory when none is supplied
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Longest averaging window accepted for baseline statistics, in years
pub const MAX_NYEARS: u32 = 10_000;
