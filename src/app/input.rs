use serde_json::Value;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("Line {line} is not valid JSON: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads newline-delimited JSON records. Blank lines are skipped.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<Value>, InputError> {
    let mut records = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = serde_json::from_str(line).map_err(|source| InputError::InvalidRecord {
            line: number + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Reads records from `path`, or from stdin when `path` is `-`.
pub fn read_records_from(path: &Path) -> Result<Vec<Value>, InputError> {
    if path.as_os_str() == "-" {
        read_records(io::stdin().lock())
    } else {
        read_records(BufReader::new(std::fs::File::open(path)?))
    }
}
