//! Animation file header parsing and column format extraction.
//!
//! The header block precedes the `timestamp` column row and describes each
//! column with a comma-separated directive line such as
//! `# soil_moist,#FIELD_DECIMAL,10,4`. Directives are parsed once into a map
//! keyed by the exact variable name.

use crate::constants::{TIMESTAMP_COLUMN, directives};
use crate::error::{AnimationError, Result};
use crate::models::{ColumnFormat, FieldKind, HeaderEntry};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Header lines of an animation file with their parsed directives
#[derive(Debug, Clone, Default)]
pub struct HeaderMetadata {
    lines: Vec<String>,
    entries: Vec<HeaderEntry>,
    by_name: HashMap<String, usize>,
}

impl HeaderMetadata {
    /// Parse every header line, collecting directive entries in file order
    pub fn parse(header_lines: &[String]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();

        for line in header_lines {
            let Some(entry) = parse_directive(line)? else {
                continue;
            };

            if by_name.contains_key(&entry.variable) {
                warn!(
                    "Duplicate header directive for '{}' ignored: {}",
                    entry.variable, entry.raw
                );
                continue;
            }

            by_name.insert(entry.variable.clone(), entries.len());
            entries.push(entry);
        }

        debug!(
            "Parsed {} header directives from {} header lines",
            entries.len(),
            header_lines.len()
        );

        Ok(Self {
            lines: header_lines.to_vec(),
            entries,
            by_name,
        })
    }

    /// Raw header lines as read from the file
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Directive entries in file order
    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    pub fn entry(&self, variable: &str) -> Option<&HeaderEntry> {
        self.by_name.get(variable).map(|&i| &self.entries[i])
    }

    /// Output format for a column
    ///
    /// The HRU column is rendered fixed-point so small integer ids do not come
    /// out as exponents.
    pub fn column_format(&self, column: &str, hru_column: &str) -> ColumnFormat {
        if column == TIMESTAMP_COLUMN {
            return ColumnFormat::Datetime;
        }

        match self.entry(column).map(|e| e.kind) {
            Some(FieldKind::Decimal { width, precision }) if column == hru_column => {
                ColumnFormat::Fixed { width, precision }
            }
            Some(FieldKind::Decimal { width, precision }) => ColumnFormat::Scientific {
                width: width.saturating_sub(1),
                precision,
            },
            Some(FieldKind::Datetime) => ColumnFormat::Datetime,
            Some(FieldKind::Other) | None if column == hru_column => ColumnFormat::Fixed {
                width: 0,
                precision: 0,
            },
            Some(FieldKind::Other) | None => ColumnFormat::default(),
        }
    }
}

/// Parse a single header line into a directive entry
///
/// Returns `None` for lines that do not name a variable (comments, framing).
pub fn parse_directive(line: &str) -> Result<Option<HeaderEntry>> {
    let tokens: Vec<&str> = line.trim().split(',').collect();
    if tokens.len() < 2 {
        return Ok(None);
    }

    let variable = tokens[0].trim_matches(|c| c == '#' || c == ' ');
    if variable.is_empty() {
        return Ok(None);
    }

    let kind = if line.contains(directives::FIELD_DECIMAL) {
        let width = parse_directive_int(line, tokens[tokens.len() - 2])?;
        let precision = parse_directive_int(line, tokens[tokens.len() - 1])?;
        FieldKind::Decimal { width, precision }
    } else if line.contains(directives::DATETIME) {
        FieldKind::Datetime
    } else {
        FieldKind::Other
    };

    Ok(Some(HeaderEntry {
        variable: variable.to_string(),
        kind,
        raw: line.trim_end().to_string(),
    }))
}

fn parse_directive_int(line: &str, token: &str) -> Result<usize> {
    token
        .trim()
        .parse::<usize>()
        .map_err(|source| AnimationError::MalformedDirective {
            line: line.trim_end().to_string(),
            source,
        })
}
