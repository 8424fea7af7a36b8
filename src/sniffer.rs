//! Delimiter detection and header/data boundary location.
//!
//! Animation files carry no declaration of their field separator, so the
//! delimiter is inferred from a sampled data line near the top of the file.

use crate::constants::{CANDIDATE_DELIMITERS, SNIFF_LINE_LIMIT, TIMESTAMP_COLUMN};
use crate::error::{AnimationError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Detect the field delimiter of an animation file from its leading lines
pub fn sniff_delimiter(file_path: &Path) -> Result<char> {
    let file = File::open(file_path)
        .map_err(|e| AnimationError::input_file(file_path, e.to_string()))?;
    let reader = BufReader::new(file);

    let mut prefix = Vec::with_capacity(SNIFF_LINE_LIMIT);
    for line in reader.lines().take(SNIFF_LINE_LIMIT) {
        let line = line.map_err(|e| AnimationError::input_file(file_path, e.to_string()))?;
        prefix.push(line);
    }

    sniff_prefix(&prefix)
        .map_err(|reason| AnimationError::input_file(file_path, reason))
}

/// Pick the delimiter from the second-to-last line of a bounded prefix
pub fn sniff_prefix(prefix: &[String]) -> std::result::Result<char, String> {
    if prefix.len() < 2 {
        return Err(format!(
            "expected at least 2 lines to detect the delimiter, found {}",
            prefix.len()
        ));
    }

    let sample = &prefix[prefix.len() - 2];
    let delimiter = sniff_line(sample)?;
    debug!("Sniffed delimiter {:?} from sample line {:?}", delimiter, sample);
    Ok(delimiter)
}

/// Detect the delimiter of a single data line
///
/// Non-space candidates win over whitespace; two distinct candidates with the
/// same count make the sample ambiguous.
pub fn sniff_line(sample: &str) -> std::result::Result<char, String> {
    let sample = sample.trim();

    let mut counts: Vec<(char, usize)> = CANDIDATE_DELIMITERS
        .iter()
        .map(|&c| (c, sample.matches(c).count()))
        .filter(|&(_, count)| count > 0)
        .collect();

    // Stable sort keeps preference order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    match counts.as_slice() {
        [] if sample.split_whitespace().count() > 1 => Ok(' '),
        [] => Err(format!("could not determine delimiter from line {:?}", sample)),
        [(best, _)] => Ok(*best),
        [(best, best_count), (second, second_count), ..] => {
            if best_count == second_count {
                Err(format!(
                    "ambiguous delimiter in line {:?}: {:?} and {:?} both appear {} times",
                    sample, best, second, best_count
                ))
            } else {
                Ok(*best)
            }
        }
    }
}

/// Split a line into trimmed fields, dropping trailing empty fields
pub fn split_fields(line: &str, delimiter: char) -> Vec<&str> {
    let mut fields: Vec<&str> = if delimiter == ' ' {
        line.split_whitespace().collect()
    } else {
        line.split(delimiter).map(str::trim).collect()
    };

    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Index of the column-name row, i.e. the first line whose leading field is `timestamp`
pub fn find_header_boundary<S: AsRef<str>>(lines: &[S], delimiter: char) -> Option<usize> {
    lines.iter().position(|line| {
        split_fields(line.as_ref(), delimiter)
            .first()
            .is_some_and(|first| *first == TIMESTAMP_COLUMN)
    })
}
