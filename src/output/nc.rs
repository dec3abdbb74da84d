//! CF trajectory file: `time` (unlimited) x `drifter`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::io::{FILL_VALUE_F32, NetCDFError};

use super::{OutputError, OutputHeader, Record, TrajectoryWriter, create_parent, finalize, part_path};

/// Fill value of integer trackers.
pub const FILL_VALUE_I32: i32 = -99;

/// NetCDF writer for particle trajectories.
pub struct NetcdfTrajectoryWriter {
    path: PathBuf,
    file: Option<netcdf::FileMut>,
    /// (name, integer)
    variables: Vec<(String, bool)>,
    time_index: usize,
}

impl NetcdfTrajectoryWriter {
    /// Create the `.part` file and define its variables.
    pub fn create(path: &Path, header: &OutputHeader) -> Result<Self, OutputError> {
        create_parent(path)?;
        let part = part_path(path);
        let mut file = netcdf::create(&part).map_err(|source| NetCDFError::Open {
            path: part.clone(),
            source,
        })?;
        Self::define(&mut file, header).map_err(OutputError::from)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            variables: header.trackers.iter().map(|t| (t.name(), t.is_integer())).collect(),
            time_index: 0,
        })
    }

    fn define(file: &mut netcdf::FileMut, header: &OutputHeader) -> Result<(), NetCDFError> {
        file.add_unlimited_dimension("time")?;
        file.add_dimension("drifter", header.n_drifters.max(1))?;

        {
            let mut time_var = file.add_variable::<f64>("time", &["time"])?;
            time_var.put_attribute("standard_name", "time")?;
            time_var.put_attribute("long_name", "time in seconds")?;
            time_var.put_attribute("units", header.time_units.as_str())?;
            time_var.put_attribute("calendar", header.calendar.as_str())?;
        }

        for tracker in &header.trackers {
            let name = tracker.name();
            if tracker.is_integer() {
                let mut var = file.add_variable::<i32>(&name, &["time", "drifter"])?;
                var.put_attribute("long_name", tracker.long_name().as_str())?;
                var.put_attribute("_FillValue", FILL_VALUE_I32)?;
            } else {
                let mut var = file.add_variable::<f32>(&name, &["time", "drifter"])?;
                var.put_attribute("long_name", tracker.long_name().as_str())?;
                var.put_attribute("units", tracker.unit())?;
                var.put_attribute("_FillValue", FILL_VALUE_F32)?;
            }
        }

        // Zone edges
        for (i, zone) in header.zones.iter().enumerate() {
            let dim = format!("zone{i}");
            file.add_dimension(&dim, zone.edge.len())?;
            let lon: Vec<f32> = zone.edge.iter().map(|&(lon, _)| lon as f32).collect();
            let lat: Vec<f32> = zone.edge.iter().map(|&(_, lat)| lat as f32).collect();
            for (suffix, values, units) in [("lon", lon, "degree_east"), ("lat", lat, "degree_north")] {
                let mut var = file.add_variable::<f32>(&format!("{dim}_{suffix}"), &[dim.as_str()])?;
                var.put_attribute("long_name", zone.key.as_str())?;
                var.put_attribute("units", units)?;
                var.put_attribute("type", zone.kind.to_string().as_str())?;
                var.put_attribute("color", zone.color.as_str())?;
                var.put_values(&values, ..)?;
            }
        }

        file.add_attribute("Conventions", "CF-1.8")?;
        file.add_attribute("featureType", "trajectory")?;
        file.add_attribute("transport_dimension", header.transport_dimension.as_str())?;
        file.add_attribute("nb_zones", header.zones.len() as i32)?;
        for (key, value) in &header.attributes {
            file.add_attribute(key, value.as_str())?;
        }
        let now = Utc::now();
        file.add_attribute(
            "history",
            format!("{}: Created by roms-drift", now.format("%Y-%m-%d %H:%M:%S UTC")).as_str(),
        )?;
        Ok(())
    }

    fn write(&mut self, record: &Record) -> Result<(), NetCDFError> {
        let t_idx = self.time_index;
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| NetCDFError::InvalidData("file closed".to_string()))?;

        {
            let mut time_var = file
                .variable_mut("time")
                .ok_or_else(|| NetCDFError::MissingVariable("time".to_string()))?;
            time_var.put_value(record.time, [t_idx])?;
        }

        for ((name, integer), column) in self.variables.iter().zip(&record.values) {
            let mut var = file
                .variable_mut(name)
                .ok_or_else(|| NetCDFError::MissingVariable(name.clone()))?;
            if *integer {
                let data: Vec<i32> = column
                    .iter()
                    .map(|&v| if v.is_nan() { FILL_VALUE_I32 } else { v as i32 })
                    .collect();
                var.put_values(&data, (t_idx, ..))?;
            } else {
                let data: Vec<f32> = column
                    .iter()
                    .map(|&v| if v.is_nan() { FILL_VALUE_F32 } else { v as f32 })
                    .collect();
                var.put_values(&data, (t_idx, ..))?;
            }
        }
        Ok(())
    }

    pub fn n_records(&self) -> usize {
        self.time_index
    }
}

impl TrajectoryWriter for NetcdfTrajectoryWriter {
    fn write_record(&mut self, record: &Record) -> Result<(), OutputError> {
        if self.file.is_none() {
            return Err(OutputError::Closed);
        }
        if record.values.len() != self.variables.len() {
            return Err(OutputError::ColumnMismatch {
                expected: self.variables.len(),
                got: record.values.len(),
            });
        }
        self.write(record)?;
        self.time_index += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<PathBuf, OutputError> {
        let Some(file) = self.file.take() else {
            return Err(OutputError::Closed);
        };
        drop(file);
        finalize(&self.path)?;
        Ok(self.path.clone())
    }
}
