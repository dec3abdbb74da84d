//! Reader for `;`-separated threshold tables.
//!
//! Biological actions read piecewise-constant functions of a particle
//! property (age, length) from small text tables:
//!
//! ```text
//! age (days);depth (m)
//! 0;-5
//! 2.5;-20
//! 10;-40
//! ```
//!
//! The first line is a header. Lines with the wrong number of fields or an
//! empty field are skipped; the first column must increase strictly.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for threshold table parsing.
#[derive(Debug, Error)]
pub enum TableFileError {
    #[error("Cannot read table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Table {path} has no data row")]
    Empty { path: PathBuf },

    #[error("{path}:{line}: thresholds must increase")]
    NonMonotonic { path: PathBuf, line: usize },
}

/// Piecewise-constant table: a threshold column followed by value columns.
#[derive(Clone, Debug, PartialEq)]
pub struct ThresholdTable {
    header: Vec<String>,
    thresholds: Vec<f64>,
    values: Vec<Vec<f64>>,
}

impl ThresholdTable {
    /// Build from `(threshold, values)` rows sorted by threshold.
    pub fn from_rows(rows: Vec<(f64, Vec<f64>)>) -> Self {
        let (thresholds, values) = rows.into_iter().unzip();
        Self {
            header: Vec::new(),
            thresholds,
            values,
        }
    }

    /// Parse a table with `n_values` value columns after the threshold.
    pub fn parse(text: &str, n_values: usize, path: &Path) -> Result<Self, TableFileError> {
        let mut lines = text.lines().enumerate();
        let header = lines
            .next()
            .map(|(_, l)| l.split(';').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let mut thresholds: Vec<f64> = Vec::new();
        let mut values = Vec::new();
        for (n, line) in lines {
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            if fields.len() != n_values + 1 || fields.iter().any(|f| f.is_empty()) {
                continue;
            }
            let mut row = Vec::with_capacity(fields.len());
            for field in fields {
                let value = field.parse::<f64>().map_err(|e| TableFileError::Parse {
                    path: path.to_path_buf(),
                    line: n + 1,
                    message: format!("{field:?}: {e}"),
                })?;
                row.push(value);
            }
            let threshold = row.remove(0);
            if thresholds.last().is_some_and(|&last| threshold <= last) {
                return Err(TableFileError::NonMonotonic {
                    path: path.to_path_buf(),
                    line: n + 1,
                });
            }
            thresholds.push(threshold);
            values.push(row);
        }

        if thresholds.is_empty() {
            return Err(TableFileError::Empty {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            header,
            thresholds,
            values,
        })
    }

    pub fn load(path: impl AsRef<Path>, n_values: usize) -> Result<Self, TableFileError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TableFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, n_values, path)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Row of the last threshold `<= x`; the first row below the range.
    pub fn row_index(&self, x: f64) -> usize {
        self.thresholds.partition_point(|&t| t <= x).saturating_sub(1)
    }

    /// Value column `col` of the row selected by `x`.
    pub fn lookup(&self, x: f64, col: usize) -> f64 {
        self.values[self.row_index(x)][col]
    }
}
