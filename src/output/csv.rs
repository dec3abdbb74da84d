use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{OutputError, OutputHeader, Record, TrajectoryWriter, create_parent, finalize, part_path};

/// Long-format CSV trajectories: one row per drifter and record,
/// `time,drifter,lon,lat,depth,mortality,...`.
pub struct CsvTrajectoryWriter {
    path: PathBuf,
    integer: Vec<bool>,
    out: Option<BufWriter<File>>,
}

impl CsvTrajectoryWriter {
    pub fn create(path: &Path, header: &OutputHeader) -> Result<Self, OutputError> {
        create_parent(path)?;
        let part = part_path(path);
        let io_err = |source| OutputError::Io {
            path: part.clone(),
            source,
        };
        let mut out = BufWriter::new(File::create(&part).map_err(io_err)?);

        let mut columns = vec!["time".to_string(), "drifter".to_string()];
        columns.extend(header.trackers.iter().map(|t| t.name()));
        writeln!(out, "{}", columns.join(",")).map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            integer: header.trackers.iter().map(|t| t.is_integer()).collect(),
            out: Some(out),
        })
    }

    fn io_error(&self, source: std::io::Error) -> OutputError {
        OutputError::Io {
            path: part_path(&self.path),
            source,
        }
    }
}

fn format_value(value: f64, integer: bool) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if integer {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl TrajectoryWriter for CsvTrajectoryWriter {
    fn write_record(&mut self, record: &Record) -> Result<(), OutputError> {
        if record.values.len() != self.integer.len() {
            return Err(OutputError::ColumnMismatch {
                expected: self.integer.len(),
                got: record.values.len(),
            });
        }
        let n_drifters = record.values.first().map_or(0, Vec::len);
        let mut text = String::new();
        for drifter in 0..n_drifters {
            text.push_str(&format!("{},{drifter}", record.time));
            for (column, &integer) in record.values.iter().zip(&self.integer) {
                text.push(',');
                text.push_str(&format_value(column[drifter], integer));
            }
            text.push('\n');
        }
        let result = match self.out.as_mut() {
            Some(out) => out.write_all(text.as_bytes()),
            None => return Err(OutputError::Closed),
        };
        result.map_err(|e| self.io_error(e))
    }

    fn finish(&mut self) -> Result<PathBuf, OutputError> {
        let Some(mut out) = self.out.take() else {
            return Err(OutputError::Closed);
        };
        out.flush().map_err(|e| self.io_error(e))?;
        drop(out);
        finalize(&self.path)?;
        Ok(self.path.clone())
    }
}
