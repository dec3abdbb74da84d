use std::collections::BTreeMap;

use crate::grid::RomsGrid;
use crate::vertical::SCoordinate;

use super::{DatasetError, HydroRecord};

/// Provider of ROMS time records.
///
/// Implementations read from NetCDF files or hold analytic fields in
/// memory. Record times must be strictly increasing with the rank.
pub trait RecordSource: Send + Sync {
    /// Full horizontal grid.
    fn grid(&self) -> Result<RomsGrid, DatasetError>;

    /// Vertical coordinate, `None` for depth-averaged datasets.
    fn s_coordinate(&self) -> Result<Option<SCoordinate>, DatasetError>;

    fn n_records(&self) -> usize;

    fn record_time(&self, rank: usize) -> Result<f64, DatasetError>;

    /// Read record `rank` with the listed tracers.
    fn read_record(&self, rank: usize, tracers: &[String]) -> Result<HydroRecord, DatasetError>;

    /// Human-readable origin of the records, for logs.
    fn describe(&self) -> String {
        format!("{} records", self.n_records())
    }
}

/// Records held in memory.
#[derive(Clone, Debug)]
pub struct MemorySource {
    grid: RomsGrid,
    s_coordinate: Option<SCoordinate>,
    records: Vec<HydroRecord>,
}

impl MemorySource {
    pub fn new(grid: RomsGrid, s_coordinate: Option<SCoordinate>, records: Vec<HydroRecord>) -> Self {
        Self {
            grid,
            s_coordinate,
            records,
        }
    }

    pub fn records(&self) -> &[HydroRecord] {
        &self.records
    }
}

impl RecordSource for MemorySource {
    fn grid(&self) -> Result<RomsGrid, DatasetError> {
        Ok(self.grid.clone())
    }

    fn s_coordinate(&self) -> Result<Option<SCoordinate>, DatasetError> {
        Ok(self.s_coordinate.clone())
    }

    fn n_records(&self) -> usize {
        self.records.len()
    }

    fn record_time(&self, rank: usize) -> Result<f64, DatasetError> {
        self.records
            .get(rank)
            .map(|r| r.time)
            .ok_or(DatasetError::RankOutOfRange {
                rank,
                n_records: self.records.len(),
            })
    }

    fn read_record(&self, rank: usize, tracers: &[String]) -> Result<HydroRecord, DatasetError> {
        let record = self.records.get(rank).ok_or(DatasetError::RankOutOfRange {
            rank,
            n_records: self.records.len(),
        })?;

        let mut selected = BTreeMap::new();
        for name in tracers {
            let field = record
                .tracers
                .get(name)
                .ok_or_else(|| DatasetError::MissingVariable(name.clone()))?;
            selected.insert(name.clone(), field.clone());
        }

        Ok(HydroRecord {
            time: record.time,
            zeta: record.zeta.clone(),
            u: record.u.clone(),
            v: record.v.clone(),
            tracers: selected,
        })
    }

    fn describe(&self) -> String {
        format!("in-memory source, {} records", self.records.len())
    }
}
