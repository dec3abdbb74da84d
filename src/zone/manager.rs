use std::path::Path;

use tracing::info;

use crate::dataset::Dataset;

use super::{Zone, ZoneFile, ZoneFileError, ZoneKind};

/// Release and recruitment zones of a simulation.
#[derive(Clone, Debug, Default)]
pub struct ZoneManager {
    release: Vec<Zone>,
    recruitment: Vec<Zone>,
}

impl ZoneManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, kind: ZoneKind) -> &mut Vec<Zone> {
        match kind {
            ZoneKind::Release => &mut self.release,
            ZoneKind::Recruitment => &mut self.recruitment,
        }
    }

    /// Add the enabled zones of one kind. Indices continue the ones already
    /// loaded for that kind.
    pub fn add_zones(&mut self, file: &ZoneFile, kind: ZoneKind, dataset: &dyn Dataset) -> Result<usize, ZoneFileError> {
        let mut added = 0;
        for def in file.enabled(kind) {
            let index = self.zones(kind).len();
            let zone = Zone::new(def, index, dataset)?;
            info!(
                kind = %kind,
                key = zone.key(),
                index,
                area_km2 = zone.area_km2(dataset),
                polygon_km2 = zone.polygon_area_km2(),
                "Zone loaded"
            );
            self.list_mut(kind).push(zone);
            added += 1;
        }
        Ok(added)
    }

    /// Load the zones of one kind from a zone file.
    pub fn load_file(
        &mut self,
        path: impl AsRef<Path>,
        kind: ZoneKind,
        dataset: &dyn Dataset,
    ) -> Result<usize, ZoneFileError> {
        let file = ZoneFile::load(path)?;
        self.add_zones(&file, kind, dataset)
    }

    pub fn zones(&self, kind: ZoneKind) -> &[Zone] {
        match kind {
            ZoneKind::Release => &self.release,
            ZoneKind::Recruitment => &self.recruitment,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.release.is_empty() && self.recruitment.is_empty()
    }

    /// Index of the first zone of `kind` holding the particle position.
    pub fn zone_index_of(&self, dataset: &dyn Dataset, x: f64, y: f64, depth: f64, kind: ZoneKind) -> Option<usize> {
        self.zones(kind)
            .iter()
            .find(|z| z.contains_particle(dataset, x, y, depth))
            .map(Zone::index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{AnalyticSourceBuilder, RomsDataset};
    use crate::grid::RectilinearGridBuilder;
    use crate::zone::ZoneDefinition;

    #[test]
    fn test_indices_per_kind() {
        let grid = RectilinearGridBuilder::new(0.0, 1.0, 40.0, 41.0)
            .with_resolution(11, 11)
            .build()
            .unwrap();
        let ds = RomsDataset::new(AnalyticSourceBuilder::new(grid).build()).unwrap();

        let file = ZoneFile {
            zones: vec![
                ZoneDefinition::new("a", ZoneKind::Release, &[(0.1, 40.1), (0.4, 40.1), (0.4, 40.4), (0.1, 40.4)]),
                ZoneDefinition::new("r", ZoneKind::Recruitment, &[(0.5, 40.5), (0.9, 40.5), (0.9, 40.9)]),
                ZoneDefinition::new("b", ZoneKind::Release, &[(0.5, 40.1), (0.9, 40.1), (0.9, 40.4), (0.5, 40.4)]),
            ],
        };

        let mut zm = ZoneManager::new();
        assert_eq!(zm.add_zones(&file, ZoneKind::Release, &ds).unwrap(), 2);
        assert_eq!(zm.add_zones(&file, ZoneKind::Recruitment, &ds).unwrap(), 1);

        let release = zm.zones(ZoneKind::Release);
        assert_eq!(release[1].key(), "b");
        assert_eq!(release[1].index(), 1);
        assert_eq!(zm.zones(ZoneKind::Recruitment)[0].index(), 0);

        assert_eq!(zm.zone_index_of(&ds, 7.0, 2.5, f64::NAN, ZoneKind::Release), Some(1));
        assert_eq!(zm.zone_index_of(&ds, 2.5, 2.5, f64::NAN, ZoneKind::Release), Some(0));
        assert_eq!(zm.zone_index_of(&ds, 2.5, 8.0, f64::NAN, ZoneKind::Release), None);
    }
}
