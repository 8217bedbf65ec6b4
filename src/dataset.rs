//! Per-user column loading.
//!
//! Expected layout: `<root>/<user>/<file>`, where a file is picked up when its
//! name contains the configured marker and ends in the configured extension.
//! Each file is a comma-separated table with a header row.

use crate::config::RunConfig;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnavailableReason {
    #[error("no matching files")]
    NoMatchingFiles,
    #[error("file has no data rows")]
    Empty,
    #[error("column '{column}' not found")]
    MissingColumn { column: String },
    #[error("line {line}: {detail}")]
    Malformed { line: usize, detail: String },
    #[error("i/o error: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot list data root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("data unavailable: {reason}")]
    Unavailable { reason: UnavailableReason },
}

impl DataError {
    fn unavailable(reason: UnavailableReason) -> Self {
        DataError::Unavailable { reason }
    }
}

impl From<io::Error> for DataError {
    fn from(e: io::Error) -> Self {
        DataError::unavailable(UnavailableReason::Io(e.to_string()))
    }
}

/// Where the run gets its columns from. Implementations are shared across
/// worker threads.
pub trait ColumnSource: Sync {
    /// User identifiers, sorted.
    fn users(&self) -> Result<Vec<String>, DataError>;

    /// Matching files of one user, sorted. `NoMatchingFiles` when there are none.
    fn files(&self, user: &str) -> Result<Vec<String>, DataError>;

    /// The configured numeric column of one file, in row order.
    fn load_column(&self, user: &str, file: &str) -> Result<Vec<f64>, DataError>;
}

#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    root: PathBuf,
    column: String,
    file_marker: String,
    file_extension: String,
}

impl CsvDirectorySource {
    pub fn new(
        root: impl Into<PathBuf>,
        column: impl Into<String>,
        file_marker: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            column: column.into(),
            file_marker: file_marker.into(),
            file_extension: file_extension.into(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.data_root.clone(),
            config.column.clone(),
            config.file_marker.clone(),
            config.file_extension.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches(&self, name: &str) -> bool {
        name.contains(&self.file_marker)
            && name
                .rsplit_once('.')
                .is_some_and(|(_, ext)| ext == self.file_extension)
    }
}

impl ColumnSource for CsvDirectorySource {
    fn users(&self) -> Result<Vec<String>, DataError> {
        let root_error = |source| DataError::Root {
            path: self.root.clone(),
            source,
        };
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(root_error)? {
            let entry = entry.map_err(root_error)?;
            if entry.file_type().map_err(root_error)?.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    users.push(name);
                }
            }
        }
        users.sort();
        Ok(users)
    }

    fn files(&self, user: &str) -> Result<Vec<String>, DataError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.root.join(user))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if self.matches(&name) {
                    files.push(name);
                }
            }
        }
        if files.is_empty() {
            return Err(DataError::unavailable(UnavailableReason::NoMatchingFiles));
        }
        files.sort();
        Ok(files)
    }

    fn load_column(&self, user: &str, file: &str) -> Result<Vec<f64>, DataError> {
        let path = self.root.join(user).join(file);
        let text = fs::read_to_string(&path)?;
        let values = parse_column(&text, &self.column).map_err(DataError::unavailable)?;
        debug!(path = %path.display(), rows = values.len(), "loaded column");
        Ok(values)
    }
}

/// Extracts one numeric column from comma-separated text with a header row.
/// Quoted fields may hold commas. Blank lines are ignored; every data row must
/// hold a number in the column.
pub fn parse_column(text: &str, column: &str) -> Result<Vec<f64>, UnavailableReason> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(csv_error)?;
    if headers.is_empty() {
        return Err(UnavailableReason::Empty);
    }
    let index = headers
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| UnavailableReason::MissingColumn {
            column: column.to_string(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let cell = record.get(index).ok_or_else(|| UnavailableReason::Malformed {
            line,
            detail: format!("row has no field {}", index + 1),
        })?;
        let value = cell.parse::<f64>().map_err(|_| UnavailableReason::Malformed {
            line,
            detail: format!("'{cell}' is not a number"),
        })?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(UnavailableReason::Empty);
    }
    Ok(values)
}

fn csv_error(e: csv::Error) -> UnavailableReason {
    if e.is_io_error() {
        return UnavailableReason::Io(e.to_string());
    }
    UnavailableReason::Malformed {
        line: e.position().map_or(0, |p| p.line() as usize),
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn parses_named_column() {
        let text = "time,saberSpeed,x\n0,1.5,9\n1,-2.25,9\r\n\n2,3e-2,9\n";
        assert_eq!(
            parse_column(text, "saberSpeed").unwrap(),
            vec![1.5, -2.25, 0.03]
        );
    }

    #[test]
    fn quoted_header_is_accepted() {
        let text = "\"saberSpeed\",\"x\"\n\"4\",1\n";
        assert_eq!(parse_column(text, "saberSpeed").unwrap(), vec![4.0]);
    }

    #[test]
    fn quoted_commas_stay_in_their_field() {
        let text = "label,saberSpeed,x\n\"a,5,b\",9.0,1\n\"c\",\"-0.5\",2\n";
        assert_eq!(parse_column(text, "saberSpeed").unwrap(), vec![9.0, -0.5]);
        let text = "\"speed, raw\",saberSpeed\n1,2\n";
        assert_eq!(parse_column(text, "saberSpeed").unwrap(), vec![2.0]);
    }

    #[test]
    fn missing_column_is_reported() {
        assert_eq!(
            parse_column("a,b\n1,2\n", "saberSpeed").unwrap_err(),
            UnavailableReason::MissingColumn {
                column: "saberSpeed".into()
            }
        );
    }

    #[test]
    fn header_only_is_empty() {
        assert_eq!(
            parse_column("saberSpeed\n", "saberSpeed").unwrap_err(),
            UnavailableReason::Empty
        );
        assert_eq!(parse_column("", "saberSpeed").unwrap_err(), UnavailableReason::Empty);
    }

    #[test]
    fn bad_cell_is_malformed() {
        let err = parse_column("saberSpeed\n1\nfast\n", "saberSpeed").unwrap_err();
        assert!(matches!(err, UnavailableReason::Malformed { line: 3, .. }));
        let err = parse_column("a,saberSpeed\n1\n", "saberSpeed").unwrap_err();
        assert!(matches!(err, UnavailableReason::Malformed { line: 2, .. }));
    }

    #[test]
    fn lists_users_and_matching_files_sorted() {
        let dir = TempDir::new().unwrap();
        for user in ["bob", "alice"] {
            fs::create_dir(dir.path().join(user)).unwrap();
        }
        fs::write(dir.path().join("stray.csv"), "x").unwrap();
        let alice = dir.path().join("alice");
        fs::write(alice.join("b_normalized.csv"), "saberSpeed\n1\n").unwrap();
        fs::write(alice.join("a_normalized.csv"), "saberSpeed\n1\n").unwrap();
        fs::write(alice.join("raw.csv"), "saberSpeed\n1\n").unwrap();
        fs::write(alice.join("normalized.txt"), "saberSpeed\n1\n").unwrap();

        let source = CsvDirectorySource::from_config(&RunConfig {
            data_root: dir.path().to_path_buf(),
            ..RunConfig::default()
        });
        assert_eq!(source.users().unwrap(), vec!["alice", "bob"]);
        assert_eq!(
            source.files("alice").unwrap(),
            vec!["a_normalized.csv", "b_normalized.csv"]
        );
        assert!(matches!(
            source.files("bob"),
            Err(DataError::Unavailable {
                reason: UnavailableReason::NoMatchingFiles
            })
        ));
        assert_eq!(source.load_column("alice", "a_normalized.csv").unwrap(), vec![1.0]);
    }

    #[test]
    fn missing_root_is_a_root_error() {
        let dir = TempDir::new().unwrap();
        let source = CsvDirectorySource::new(dir.path().join("nope"), "c", "normalized", "csv");
        assert!(matches!(source.users(), Err(DataError::Root { .. })));
    }
}
