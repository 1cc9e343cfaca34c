//! Loaders for load-cell measurement logs.
//!
//! A log is a tab-delimited text file laid out as:
//! - Line 1: date/time header (optionally kept as the trial timestamp)
//! - Line 2: column titles (always discarded)
//! - Remaining lines: `reading<TAB>load<TAB>elapsed_time`

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

/// Number of header lines preceding the data rows.
const HEADER_LINES: usize = 2;

/// Number of tab-separated fields in every data row.
const FIELDS_PER_ROW: usize = 3;

/// Errors that can occur while loading a measurement log.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tab-delimited read error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing header line {line}")]
    MissingHeader { path: String, line: usize },

    #[error("{path}:{line}: expected 3 tab-separated fields, found {found}")]
    FieldCount {
        path: String,
        line: u64,
        found: usize,
    },

    #[error("{path}:{line}: invalid {column} value '{value}'")]
    InvalidNumber {
        path: String,
        line: u64,
        column: &'static str,
        value: String,
    },
}

impl LoaderError {
    /// True when the file was readable but its content is malformed.
    pub fn is_format_error(&self) -> bool {
        match self {
            LoaderError::Io(_) => false,
            LoaderError::Csv { source, .. } => !source.is_io_error(),
            _ => true,
        }
    }
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One row of raw instrument output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRecord {
    /// Sequential reading index.
    pub reading: i64,
    /// Signed load in ounce-force inches.
    pub load: f64,
    /// Elapsed time in seconds.
    pub elapsed_time: f64,
}

/// A single measurement log: one test run.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// File name without extension.
    pub source_name: String,
    /// Literal first header line, when captured.
    pub timestamp: Option<String>,
    /// Data rows in file order.
    pub records: Vec<MeasurementRecord>,
}

impl Trial {
    /// Returns the number of records in this trial.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the log had no data rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Derive the trial name from a log path: the file stem, or the whole file
/// name when there is no stem.
pub fn trial_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load a measurement log from disk.
///
/// # Arguments
///
/// * `path` - Path to the log file
/// * `capture_timestamp` - Keep the first header line as the trial timestamp
///
/// # Errors
///
/// Returns [`LoaderError::Io`] if the file cannot be opened, or one of the
/// format variants if its content is malformed.
pub fn load_trial(path: &Path, capture_timestamp: bool) -> Result<Trial> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(64 * 1024, file);

    parse_trial_named(reader, trial_name(path), capture_timestamp, path)
}

/// Parse a measurement log from any reader.
///
/// `source_name` becomes the trial name and is also used in error messages.
pub fn parse_trial<R: Read>(
    reader: R,
    source_name: impl Into<String>,
    capture_timestamp: bool,
) -> Result<Trial> {
    let source_name = source_name.into();
    let label = PathBuf::from(&source_name);
    parse_trial_named(reader, source_name, capture_timestamp, &label)
}

fn parse_trial_named<R: Read>(
    reader: R,
    source_name: String,
    capture_timestamp: bool,
    path: &Path,
) -> Result<Trial> {
    let path_str = path.display().to_string();

    let mut csv_reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = csv_reader.records();

    // Consume the two header lines
    let mut timestamp = None;
    for line in 1..=HEADER_LINES {
        let header = records
            .next()
            .ok_or_else(|| LoaderError::MissingHeader {
                path: path_str.clone(),
                line,
            })?
            .map_err(|e| csv_error(&path_str, e))?;

        if line == 1 && capture_timestamp {
            timestamp = Some(join_fields(&header));
        }
    }

    let mut parsed = Vec::new();
    for result in records {
        let record = result.map_err(|e| csv_error(&path_str, e))?;
        parsed.push(parse_record(&record, &path_str)?);
    }

    log::debug!("{}: parsed {} records", source_name, parsed.len());

    Ok(Trial {
        source_name,
        timestamp,
        records: parsed,
    })
}

/// Parse one data row into a [`MeasurementRecord`].
fn parse_record(record: &StringRecord, path: &str) -> Result<MeasurementRecord> {
    let line = record.position().map_or(0, |p| p.line());

    if record.len() != FIELDS_PER_ROW {
        return Err(LoaderError::FieldCount {
            path: path.to_string(),
            line,
            found: record.len(),
        });
    }

    let invalid = |column: &'static str, value: &str| LoaderError::InvalidNumber {
        path: path.to_string(),
        line,
        column,
        value: value.to_string(),
    };

    let reading = record[0]
        .parse::<i64>()
        .map_err(|_| invalid("reading", &record[0]))?;
    let load = record[1]
        .parse::<f64>()
        .map_err(|_| invalid("load", &record[1]))?;
    let elapsed_time = record[2]
        .parse::<f64>()
        .map_err(|_| invalid("time", &record[2]))?;

    Ok(MeasurementRecord {
        reading,
        load,
        elapsed_time,
    })
}

fn join_fields(record: &StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join("\t").trim().to_string()
}

fn csv_error(path: &str, source: csv::Error) -> LoaderError {
    LoaderError::Csv {
        path: path.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "10/14/2026 09:30:12\nReading\tLoad [ozFin]\tTime [sec.]\n";

    fn parse(content: &str) -> Result<Trial> {
        parse_trial(content.as_bytes(), "sample", false)
    }

    #[test]
    fn test_parse_records() -> Result<()> {
        let content = format!("{HEADER}1\t-5.0\t0.1\n2\t7.5\t0.2\n3\t0\t0.3\n");
        let trial = parse(&content)?;

        assert_eq!(trial.len(), 3);
        assert_eq!(trial.source_name, "sample");
        assert_eq!(trial.timestamp, None);
        assert_eq!(
            trial.records[0],
            MeasurementRecord {
                reading: 1,
                load: -5.0,
                elapsed_time: 0.1
            }
        );
        assert_eq!(trial.records[2].reading, 3);
        Ok(())
    }

    #[test]
    fn test_captures_timestamp() -> Result<()> {
        let content = format!("{HEADER}1\t2.0\t0.5\n");
        let trial = parse_trial(content.as_bytes(), "sample", true)?;

        assert_eq!(trial.timestamp.as_deref(), Some("10/14/2026 09:30:12"));
        assert_eq!(trial.len(), 1);
        Ok(())
    }

    #[test]
    fn test_header_only_is_empty() -> Result<()> {
        let trial = parse(HEADER)?;
        assert!(trial.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_header() {
        let err = parse("only one line\n").unwrap_err();
        assert!(matches!(err, LoaderError::MissingHeader { line: 2, .. }));
        assert!(err.is_format_error());

        let err = parse("").unwrap_err();
        assert!(matches!(err, LoaderError::MissingHeader { line: 1, .. }));
    }

    #[test]
    fn test_wrong_field_count() {
        let too_few = format!("{HEADER}1\t2.0\n");
        match parse(&too_few).unwrap_err() {
            LoaderError::FieldCount { line, found, .. } => {
                assert_eq!(line, 3);
                assert_eq!(found, 2);
            }
            e => panic!("Expected FieldCount error, got {e:?}"),
        }

        let too_many = format!("{HEADER}1\t2.0\t0.1\t9\n");
        assert!(matches!(
            parse(&too_many).unwrap_err(),
            LoaderError::FieldCount { found: 4, .. }
        ));
    }

    #[test]
    fn test_non_numeric_fields() {
        let bad_reading = format!("{HEADER}1.5\t2.0\t0.1\n");
        assert!(matches!(
            parse(&bad_reading).unwrap_err(),
            LoaderError::InvalidNumber {
                column: "reading",
                ..
            }
        ));

        let bad_load = format!("{HEADER}1\tabc\t0.1\n");
        assert!(matches!(
            parse(&bad_load).unwrap_err(),
            LoaderError::InvalidNumber { column: "load", .. }
        ));

        let bad_time = format!("{HEADER}1\t2.0\t\n");
        assert!(matches!(
            parse(&bad_time).unwrap_err(),
            LoaderError::InvalidNumber { column: "time", .. }
        ));
    }

    #[test]
    fn test_trims_whitespace_and_crlf() -> Result<()> {
        let content = "header\r\ncols\r\n 1 \t -2.5\t0.25 \r\n";
        let trial = parse(content)?;
        assert_eq!(trial.records[0].load, -2.5);
        assert_eq!(trial.records[0].elapsed_time, 0.25);
        Ok(())
    }

    #[test]
    fn test_load_trial_from_file() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("B.log");
        fs::write(&path, format!("{HEADER}1\t3.0\t0.05\n")).unwrap();

        let trial = load_trial(&path, false)?;
        assert_eq!(trial.len(), 1);
        assert_eq!(trial.source_name, "B");
        assert_eq!(trial.records[0].load, 3.0);
        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = load_trial(Path::new("/nonexistent/dir/run.log"), false).unwrap_err();
        assert!(matches!(err, LoaderError::Io(_)));
        assert!(!err.is_format_error());
    }

    #[test]
    fn test_trial_name() {
        assert_eq!(trial_name(Path::new("trials/A.log")), "A");
        assert_eq!(trial_name(Path::new("run.02.log")), "run.02");
    }
}
