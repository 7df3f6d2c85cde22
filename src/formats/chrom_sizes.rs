//! Two-column chromosome sizes files (`chrom<TAB>length`)

use crate::core::io::{open_input, LineIterator};
use crate::core::{ChromosomeError, ChromosomeSet};
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ChromSizesError {
    #[error("line {line}: expected \"chrom<TAB>length\", found \"{content}\"")]
    Malformed { line: usize, content: String },

    #[error("line {line}: invalid chromosome length \"{value}\"")]
    InvalidLength { line: usize, value: String },

    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read chromosomes in file order. Blank lines and `#` comments are skipped;
/// columns past the second are ignored.
pub fn read_chrom_sizes<R: BufRead>(reader: R) -> Result<ChromosomeSet, ChromSizesError> {
    let mut lines = LineIterator::new(reader);
    let mut records: Vec<(String, u32)> = Vec::new();
    let mut line_number = 0;
    while let Some(line) = lines.next_line() {
        let line = line?;
        line_number += 1;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(name), Some(length)) = (fields.next(), fields.next()) else {
            return Err(ChromSizesError::Malformed {
                line: line_number,
                content: line.to_string(),
            });
        };
        let length = length
            .trim()
            .parse::<u32>()
            .map_err(|_| ChromSizesError::InvalidLength {
                line: line_number,
                value: length.to_string(),
            })?;
        records.push((name.to_string(), length));
    }
    Ok(ChromosomeSet::new(records)?)
}

pub fn read_chrom_sizes_file(path: &Path) -> Result<ChromosomeSet, ChromSizesError> {
    read_chrom_sizes(open_input(path)?)
}
