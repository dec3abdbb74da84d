use std::collections::BTreeMap;

use crate::grid::{Field2, Field3};

use super::DatasetError;

/// One time record of a ROMS output.
///
/// Velocities sit on the staggered faces: `u` is `(nx - 1) x ny x nz`,
/// `v` is `nx x (ny - 1) x nz`. Tracers are at rho points with either
/// `nz` levels or a single one (surface or depth-independent fields).
/// Land values may be NaN.
#[derive(Clone, Debug)]
pub struct HydroRecord {
    /// Seconds since the calendar origin.
    pub time: f64,
    /// Free-surface elevation (m), absent for depth-averaged datasets.
    pub zeta: Option<Field2<f32>>,
    pub u: Field3<f32>,
    pub v: Field3<f32>,
    pub tracers: BTreeMap<String, Field3<f32>>,
}

impl HydroRecord {
    pub fn new(time: f64, u: Field3<f32>, v: Field3<f32>) -> Self {
        Self {
            time,
            zeta: None,
            u,
            v,
            tracers: BTreeMap::new(),
        }
    }

    pub fn with_zeta(mut self, zeta: Field2<f32>) -> Self {
        self.zeta = Some(zeta);
        self
    }

    pub fn with_tracer(mut self, name: impl Into<String>, field: Field3<f32>) -> Self {
        self.tracers.insert(name.into(), field);
        self
    }

    /// Check the array shapes against an `nx x ny x nz` grid.
    pub fn validate(&self, nx: usize, ny: usize, nz: usize) -> Result<(), DatasetError> {
        let check = |name: &str, f: &Field3<f32>, ex: usize, ey: usize, ez: &[usize]| {
            if f.nx() != ex || f.ny() != ey || !ez.contains(&f.nz()) {
                Err(DatasetError::RecordShape {
                    name: name.to_string(),
                    expected: vec![ez[0], ey, ex],
                    got: vec![f.nz(), f.ny(), f.nx()],
                })
            } else {
                Ok(())
            }
        };
        check("u", &self.u, nx - 1, ny, &[nz])?;
        check("v", &self.v, nx, ny - 1, &[nz])?;
        if let Some(zeta) = &self.zeta {
            if zeta.nx() != nx || zeta.ny() != ny {
                return Err(DatasetError::RecordShape {
                    name: "zeta".to_string(),
                    expected: vec![ny, nx],
                    got: vec![zeta.ny(), zeta.nx()],
                });
            }
        }
        for (name, field) in &self.tracers {
            check(name, field, nx, ny, &[nz, 1])?;
        }
        Ok(())
    }

    /// Restrict the record to the rho window `[ipo, ipo + nx) x [jpo, jpo + ny)`.
    pub fn crop(&self, ipo: usize, jpo: usize, nx: usize, ny: usize) -> Result<Self, DatasetError> {
        let zeta = match &self.zeta {
            Some(z) => Some(z.crop(ipo, jpo, nx, ny)?),
            None => None,
        };
        let mut tracers = BTreeMap::new();
        for (name, field) in &self.tracers {
            tracers.insert(name.clone(), field.crop(ipo, jpo, nx, ny)?);
        }
        Ok(Self {
            time: self.time,
            zeta,
            u: self.u.crop(ipo, jpo, nx - 1, ny)?,
            v: self.v.crop(ipo, jpo, nx, ny - 1)?,
            tracers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(nx: usize, ny: usize, nz: usize) -> HydroRecord {
        HydroRecord::new(
            0.0,
            Field3::from_fn(nx - 1, ny, nz, |i, _, _| i as f32),
            Field3::from_fn(nx, ny - 1, nz, |_, j, _| j as f32),
        )
        .with_zeta(Field2::filled(nx, ny, 0.0))
    }

    #[test]
    fn test_validate_shapes() {
        let r = record(6, 5, 3).with_tracer("temp", Field3::filled(6, 5, 3, 12.0));
        assert!(r.validate(6, 5, 3).is_ok());
        assert!(r.validate(6, 5, 4).is_err());

        let surface = record(6, 5, 3).with_tracer("sst", Field3::filled(6, 5, 1, 12.0));
        assert!(surface.validate(6, 5, 3).is_ok());

        let bad = record(6, 5, 3).with_tracer("salt", Field3::filled(5, 5, 3, 35.0));
        assert!(matches!(
            bad.validate(6, 5, 3),
            Err(DatasetError::RecordShape { name, .. }) if name == "salt"
        ));
    }

    #[test]
    fn test_crop_staggered() {
        let r = record(8, 7, 2);
        let c = r.crop(2, 1, 4, 3).unwrap();
        assert!(c.validate(4, 3, 2).is_ok());
        // face east of cropped rho 0 is the face east of full rho 2
        assert_eq!(c.u.get(0, 0, 0), 2.0);
        assert_eq!(c.v.get(0, 0, 0), 1.0);
    }
}
